//! Ride-location history queries

use super::aggs::distance_traveled;
use super::{range, sort_clause, term, BoolQuery, QueryDocument, CREATED_AT_FIELD};
use crate::models::SortOrder;

/// One driver's pings, newest first.
///
/// With `calculate_distance`, a scripted metric sums the great-circle distance
/// between consecutive pings on the backend.
pub fn build_location_query(
    driver_id: &str,
    size: u32,
    start_time: Option<i64>,
    end_time: Option<i64>,
    calculate_distance: bool,
) -> QueryDocument {
    let query = BoolQuery::new()
        .filter(term("driver.id.keyword", driver_id))
        .filter_opt(range(CREATED_AT_FIELD, start_time, end_time))
        .build();

    let mut doc = QueryDocument::new(size, query);
    doc.sort = vec![sort_clause(CREATED_AT_FIELD, SortOrder::Desc.as_str())];
    doc.track_total_hits = Some(true);
    if calculate_distance {
        doc.aggs = Some(distance_traveled());
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_location_query_shape() {
        let query = build_location_query("d1", 500, Some(10), None, true);
        assert_eq!(query.size, 500);
        assert_eq!(
            query.query["bool"]["filter"],
            json!([
                {"term": {"driver.id.keyword": "d1"}},
                {"range": {"createdAt._seconds": {"gte": 10}}}
            ])
        );
        assert!(query.aggs.unwrap().get("distance_traveled").is_some());

        let plain = build_location_query("d1", 5, None, None, false);
        assert!(plain.aggs.is_none());
        assert_eq!(plain.query["bool"]["filter"].as_array().map(Vec::len), Some(1));
    }
}
