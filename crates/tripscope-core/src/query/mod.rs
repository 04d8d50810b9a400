//! Search query documents
//!
//! Builders in this module are pure: the same inputs always produce the same
//! [`QueryDocument`], and serializing it twice yields identical bytes (object keys
//! are emitted in sorted order).

mod aggs;
mod locations;
mod trips;

pub use aggs::{names, trip_aggregations};
pub use locations::build_location_query;
pub use trips::{
    build_driver_analytics_query, build_lookup_query, build_polyline_statistics_query,
    build_search_text_query, build_trip_query, has_polyline_clause, PolylineStatisticsScope,
    MIN_POLYLINE_LENGTH,
};

use serde::Serialize;
use serde_json::{json, Map, Value};
use serde_with::skip_serializing_none;

use crate::error::Result;

/// Creation-time field shared by every index
pub const CREATED_AT_FIELD: &str = "createdAt._seconds";

/// Encoded route geometry on trip documents
pub const POLYLINE_FIELD: &str = "distanceMatrices.polyline";

/// A complete search request body
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDocument {
    /// Hits to return
    pub size: u32,
    /// Query clause
    pub query: Value,
    /// Sort clauses, omitted when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
    /// Aggregation tree
    pub aggs: Option<Value>,
    /// Ask for an exact total count
    pub track_total_hits: Option<bool>,
}

impl QueryDocument {
    /// Body with no sort and no aggregations
    pub fn new(size: u32, query: Value) -> Self {
        Self {
            size,
            query,
            sort: Vec::new(),
            aggs: None,
            track_total_hits: None,
        }
    }

    /// Request body as JSON
    pub fn to_body(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Accumulates clauses for a `bool` query
#[derive(Debug, Clone, Default)]
pub struct BoolQuery {
    filter: Vec<Value>,
    must_not: Vec<Value>,
    should: Vec<Value>,
    minimum_should_match: Option<u32>,
}

impl BoolQuery {
    /// Empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// AND clause that does not affect scoring
    pub fn filter(mut self, clause: Value) -> Self {
        self.filter.push(clause);
        self
    }

    /// Append an optional filter clause
    pub fn filter_opt(self, clause: Option<Value>) -> Self {
        match clause {
            Some(clause) => self.filter(clause),
            None => self,
        }
    }

    /// NOT clause
    pub fn must_not(mut self, clause: Value) -> Self {
        self.must_not.push(clause);
        self
    }

    /// OR clause; see [`BoolQuery::minimum_should_match`]
    pub fn should(mut self, clause: Value) -> Self {
        self.should.push(clause);
        self
    }

    /// How many `should` clauses must match
    pub fn minimum_should_match(mut self, n: u32) -> Self {
        self.minimum_should_match = Some(n);
        self
    }

    /// Render as `{"bool": {...}}`, omitting empty clause lists
    pub fn build(self) -> Value {
        let mut body = Map::new();
        if !self.filter.is_empty() {
            body.insert("filter".into(), Value::Array(self.filter));
        }
        if !self.must_not.is_empty() {
            body.insert("must_not".into(), Value::Array(self.must_not));
        }
        if !self.should.is_empty() {
            body.insert("should".into(), Value::Array(self.should));
        }
        if let Some(n) = self.minimum_should_match {
            body.insert("minimum_should_match".into(), json!(n));
        }
        json!({ "bool": body })
    }
}

/// Exact match
pub fn term(field: &str, value: impl Into<Value>) -> Value {
    json!({ "term": { field: value.into() } })
}

/// Inclusive range; `None` when both bounds are absent
pub fn range<T: Into<Value>>(field: &str, gte: Option<T>, lte: Option<T>) -> Option<Value> {
    let mut bounds = Map::new();
    if let Some(gte) = gte {
        bounds.insert("gte".into(), gte.into());
    }
    if let Some(lte) = lte {
        bounds.insert("lte".into(), lte.into());
    }
    (!bounds.is_empty()).then(|| json!({ "range": { field: bounds } }))
}

/// Substring match anywhere in the field
pub fn contains(field: &str, text: &str) -> Value {
    json!({ "wildcard": { field: format!("*{}*", escape_wildcard(text)) } })
}

/// Whole-value regular expression match
pub fn regexp(field: &str, pattern: &str) -> Value {
    json!({ "regexp": { field: pattern } })
}

/// Field is present and non-null
pub fn exists(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

/// Escape wildcard metacharacters so `text` matches literally
pub fn escape_wildcard(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '?') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// `{"<field>": {"order": "<order>"}}`
pub fn sort_clause(field: &str, order: &str) -> Value {
    json!({ field: { "order": order } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bool_query_omits_empty_lists() {
        let query = BoolQuery::new().filter(term("a", "b")).build();
        assert_eq!(query, json!({"bool": {"filter": [{"term": {"a": "b"}}]}}));
        assert_eq!(BoolQuery::new().build(), json!({"bool": {}}));
    }

    #[test]
    fn test_range_bounds() {
        assert_eq!(range::<i64>("price", None, None), None);
        assert_eq!(
            range("price", Some(10), None),
            Some(json!({"range": {"price": {"gte": 10}}}))
        );
        assert_eq!(
            range("price", Some(10), Some(20)),
            Some(json!({"range": {"price": {"gte": 10, "lte": 20}}}))
        );
    }

    #[test]
    fn test_wildcard_escaping() {
        assert_eq!(escape_wildcard("a*b?c\\"), "a\\*b\\?c\\\\");
        assert_eq!(
            contains("rider.name.keyword", "ann*"),
            json!({"wildcard": {"rider.name.keyword": "*ann\\**"}})
        );
    }

    #[test]
    fn test_document_skips_absent_parts() {
        let doc = QueryDocument::new(0, json!({"match_all": {}}));
        assert_eq!(
            doc.to_body().unwrap(),
            json!({"size": 0, "query": {"match_all": {}}})
        );
    }
}
