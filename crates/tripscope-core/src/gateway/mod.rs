//! Search backend seam
//!
//! Services talk to the backend only through [`SearchGateway`], so tests and
//! alternative clusters can be swapped in without global state.

mod elasticsearch;
#[cfg(test)]
pub(crate) mod testing;

pub use elasticsearch::ElasticsearchGateway;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::query::QueryDocument;

/// Executes built queries against a named index.
///
/// Implementations must return hits in the order the query's sort dictates and keep
/// aggregation names as the query assigned them.
#[async_trait]
pub trait SearchGateway: Send + Sync {
    /// Run `query` against `index`, failing with [`Error::SearchTimeout`] after `timeout`
    async fn search(
        &self,
        index: &str,
        query: &QueryDocument,
        timeout: Duration,
    ) -> Result<SearchResponse>;
}

/// One raw document
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Document id
    pub id: String,
    /// Document body
    pub source: Value,
}

/// Backend answer, reduced to what the analytics need
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// Backend time in milliseconds
    pub took: u64,
    /// Whether the backend hit its own timeout
    pub timed_out: bool,
    /// Total matching documents, which may exceed `hits.len()`
    pub total: u64,
    /// Returned documents, in backend order
    pub hits: Vec<RawHit>,
    /// Aggregation tree, `Value::Null` when none were requested
    pub aggregations: Value,
}

/// Timing metadata echoed back to callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMeta {
    /// Backend time in milliseconds
    pub took: u64,
    /// Whether the backend hit its own timeout
    pub timed_out: bool,
}

impl SearchResponse {
    /// Timing metadata for callers
    pub fn meta(&self) -> QueryMeta {
        QueryMeta {
            took: self.took,
            timed_out: self.timed_out,
        }
    }

    /// Parse an Elasticsearch `_search` response body
    pub fn from_body(body: Value) -> Result<Self> {
        let raw: RawResponse = serde_json::from_value(body)
            .map_err(|e| Error::backend(format!("unreadable search response: {e}")))?;

        let hits: Vec<RawHit> = raw
            .hits
            .hits
            .into_iter()
            .map(|hit| RawHit {
                id: hit.id.unwrap_or_default(),
                source: hit.source.unwrap_or(Value::Null),
            })
            .collect();

        let total = match raw.hits.total {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::Object(map)) => map.get("value").and_then(Value::as_u64),
            _ => None,
        }
        .unwrap_or(hits.len() as u64);

        Ok(Self {
            took: raw.took.unwrap_or_default(),
            timed_out: raw.timed_out.unwrap_or_default(),
            total,
            hits,
            aggregations: raw.aggregations.unwrap_or(Value::Null),
        })
    }
}

#[derive(Deserialize)]
struct RawResponse {
    took: Option<u64>,
    timed_out: Option<bool>,
    hits: RawHits,
    aggregations: Option<Value>,
}

#[derive(Deserialize)]
struct RawHits {
    total: Option<Value>,
    #[serde(default)]
    hits: Vec<RawHitBody>,
}

#[derive(Deserialize)]
struct RawHitBody {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_source")]
    source: Option<Value>,
}
