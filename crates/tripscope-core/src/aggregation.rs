//! Aggregation trees to analytics summaries
//!
//! Analytics are best-effort next to the hit list: a missing or malformed
//! aggregation is logged and reduced to its empty shape instead of failing the
//! request.

use serde_json::Value;
use tracing::warn;

use crate::models::lenient::{as_number, as_string};
use crate::models::{
    percentage, AnalyticsSummary, Breakdown, CancellationAnalysis, CoverageRow, CoverageStats,
    DriverMetrics, DriverRanking, PolylineStatistics, PriceStats, RangeBucket, RouteRanking,
    TrendPoint,
};
use crate::query::names;

fn buckets<'a>(aggs: &'a Value, name: &str) -> &'a [Value] {
    match aggs.get(name) {
        None | Some(Value::Null) => &[],
        Some(agg) => match agg.get("buckets").and_then(Value::as_array) {
            Some(buckets) => buckets,
            None => {
                warn!(aggregation = name, "Aggregation has no bucket list");
                &[]
            }
        },
    }
}

fn doc_count(value: &Value) -> u64 {
    value
        .get("doc_count")
        .and_then(Value::as_u64)
        .unwrap_or_default()
}

/// Single-value metric (`avg`, `sum`, `value_count`, ...); `None` for null
fn metric(aggs: &Value, name: &str) -> Option<f64> {
    aggs.get(name)?.get("value").and_then(as_number)
}

fn bucket_key(bucket: &Value) -> Option<String> {
    bucket.get("key").and_then(as_string)
}

/// Date histogram buckets are labeled by their formatted key when present
fn bucket_label(bucket: &Value) -> Option<String> {
    bucket
        .get("key_as_string")
        .and_then(as_string)
        .or_else(|| bucket_key(bucket))
}

/// Destructure a multi-terms key positionally; `None` on arity mismatch
fn compound_key<const N: usize>(bucket: &Value) -> Option<[String; N]> {
    let parts = bucket.get("key")?.as_array()?;
    if parts.len() != N {
        return None;
    }
    let mut key: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, part) in key.iter_mut().zip(parts) {
        *slot = as_string(part)?;
    }
    Some(key)
}

/// Terms buckets as `{key: doc_count}`
pub fn breakdown(aggs: &Value, name: &str) -> Breakdown {
    let mut breakdown = Breakdown::new();
    for bucket in buckets(aggs, name) {
        if let Some(key) = bucket_key(bucket) {
            *breakdown.entry(key).or_default() += doc_count(bucket);
        }
    }
    breakdown
}

/// Status × payment breakdowns from the two-key `trip_stats` buckets
fn status_payment_breakdowns(aggs: &Value) -> (Breakdown, Breakdown) {
    let mut by_status = Breakdown::new();
    let mut by_payment = Breakdown::new();
    for bucket in buckets(aggs, names::TRIP_STATS) {
        let Some([status, payment]) = compound_key::<2>(bucket) else {
            warn!(key = %bucket["key"], "Skipping trip_stats bucket with unexpected key");
            continue;
        };
        let count = doc_count(bucket);
        *by_status.entry(status).or_default() += count;
        *by_payment.entry(payment).or_default() += count;
    }
    (by_status, by_payment)
}

fn price_stats(aggs: &Value) -> PriceStats {
    let Some(stats) = aggs.get(names::PRICE_STATS) else {
        return PriceStats::default();
    };
    let field = |name: &str| stats.get(name).and_then(as_number);
    PriceStats {
        min: field("min"),
        max: field("max"),
        avg: field("avg"),
        sum: field("sum").unwrap_or_default(),
        count: stats
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or_default(),
    }
}

/// `"{from}-{to}"`, `"{from}+"` or `"<{to}"`
pub fn range_label(from: Option<f64>, to: Option<f64>) -> String {
    match (from, to) {
        (Some(from), Some(to)) => format!("{from}-{to}"),
        (Some(from), None) => format!("{from}+"),
        (None, Some(to)) => format!("<{to}"),
        (None, None) => "*".to_string(),
    }
}

fn price_ranges(aggs: &Value) -> Vec<RangeBucket> {
    buckets(aggs, names::PRICE_RANGES)
        .iter()
        .map(|bucket| {
            let from = bucket.get("from").and_then(as_number);
            let to = bucket.get("to").and_then(as_number);
            RangeBucket {
                label: range_label(from, to),
                from,
                to,
                count: doc_count(bucket),
            }
        })
        .collect()
}

fn trend(aggs: &Value, name: &str) -> Vec<TrendPoint> {
    buckets(aggs, name)
        .iter()
        .filter_map(|bucket| {
            Some(TrendPoint {
                label: bucket_label(bucket)?,
                count: doc_count(bucket),
            })
        })
        .collect()
}

fn top_drivers(aggs: &Value) -> Vec<DriverRanking> {
    buckets(aggs, names::TOP_DRIVERS)
        .iter()
        .filter_map(|bucket| {
            Some(DriverRanking {
                driver_id: bucket_key(bucket)?,
                trip_count: doc_count(bucket),
                avg_rating: metric(bucket, names::AVG_RATING),
                total_revenue: metric(bucket, names::TOTAL_REVENUE).unwrap_or_default(),
                status_breakdown: breakdown(bucket, names::STATUS_BREAKDOWN),
            })
        })
        .collect()
}

fn top_routes(aggs: &Value) -> Vec<RouteRanking> {
    buckets(aggs, names::TOP_ROUTES)
        .iter()
        .filter_map(|bucket| {
            let [from, to] = compound_key::<2>(bucket)?;
            Some(RouteRanking {
                from,
                to,
                trip_count: doc_count(bucket),
                avg_price: metric(bucket, names::AVG_PRICE),
            })
        })
        .collect()
}

fn cancellation(aggs: &Value, total: u64) -> CancellationAnalysis {
    let Some(filtered) = aggs.get(names::CANCELLATION_ANALYSIS) else {
        return CancellationAnalysis::default();
    };
    let total_cancelled = doc_count(filtered);
    CancellationAnalysis {
        total_cancelled,
        cancellation_rate: percentage(total_cancelled, total),
        by_reason: breakdown(filtered, names::BY_REASON),
        by_actor: breakdown(filtered, names::BY_ACTOR),
    }
}

/// Reduce the trip-search aggregation tree.
///
/// `total` is the backend's total hit count and is the denominator of every rate.
pub fn reduce_trip_analytics(aggs: &Value, total: u64) -> AnalyticsSummary {
    let (status_breakdown, payment_breakdown) = status_payment_breakdowns(aggs);
    let completed = status_breakdown.get("completed").copied().unwrap_or_default();

    let with_polyline = aggs
        .get(names::POLYLINE_COVERAGE)
        .map(doc_count)
        .unwrap_or_default();

    AnalyticsSummary {
        total_trips: total,
        completion_rate: percentage(completed, total),
        status_breakdown,
        payment_breakdown,
        ride_type_breakdown: breakdown(aggs, names::RIDE_TYPE_BREAKDOWN),
        price_stats: price_stats(aggs),
        price_ranges: price_ranges(aggs),
        daily_trends: trend(aggs, names::DAILY_TRIPS),
        hourly_trends: trend(aggs, names::HOURLY_TRIPS),
        top_drivers: top_drivers(aggs),
        top_routes: top_routes(aggs),
        cancellation: cancellation(aggs, total),
        polyline_coverage: CoverageStats::new(total, with_polyline),
    }
}

/// Reduce the per-driver aggregation tree
pub fn reduce_driver_metrics(aggs: &Value) -> DriverMetrics {
    let total_trips = metric(aggs, names::TOTAL_TRIPS).unwrap_or_default() as u64;
    let completed_trips = aggs
        .get(names::COMPLETED_TRIPS)
        .map(doc_count)
        .unwrap_or_default();
    let cancelled_trips = aggs
        .get(names::CANCELLED_TRIPS)
        .map(doc_count)
        .unwrap_or_default();

    DriverMetrics {
        total_trips,
        completed_trips,
        cancelled_trips,
        completion_rate: percentage(completed_trips, total_trips),
        cancellation_rate: percentage(cancelled_trips, total_trips),
        total_revenue: metric(aggs, names::TOTAL_REVENUE).unwrap_or_default(),
        avg_rating: metric(aggs, names::AVG_RATING),
        status_breakdown: breakdown(aggs, names::STATUS_BREAKDOWN),
    }
}

fn coverage_rows(aggs: &Value, name: &str, label: fn(&Value) -> Option<String>) -> Vec<CoverageRow> {
    buckets(aggs, name)
        .iter()
        .filter_map(|bucket| {
            let with_polyline = bucket
                .get(names::WITH_POLYLINE)
                .map(doc_count)
                .unwrap_or_default();
            Some(CoverageRow::new(label(bucket)?, doc_count(bucket), with_polyline))
        })
        .collect()
}

/// Reduce the coverage aggregation tree
pub fn reduce_polyline_statistics(aggs: &Value, total: u64) -> PolylineStatistics {
    let with_polyline = aggs
        .get(names::WITH_POLYLINE)
        .map(doc_count)
        .unwrap_or_default();

    PolylineStatistics {
        overview: CoverageStats::new(total, with_polyline),
        coverage_by_status: coverage_rows(aggs, names::BY_STATUS, bucket_key),
        coverage_by_ride_type: coverage_rows(aggs, names::BY_RIDE_TYPE, bucket_key),
        daily_coverage: coverage_rows(aggs, names::DAILY, bucket_label),
    }
}

/// Backend-computed travel distance, when the scripted metric ran
pub fn distance_traveled_km(aggs: &Value) -> Option<f64> {
    metric(aggs, names::DISTANCE_TRAVELED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn sample_aggs() -> Value {
        json!({
            "trip_stats": {"buckets": [
                {"key": ["completed", "paid"], "key_as_string": "completed|paid", "doc_count": 6},
                {"key": ["cancelled", "pending"], "doc_count": 2},
                {"key": ["completed", "pending"], "doc_count": 2}
            ]},
            "price_stats": {"count": 10, "min": 50.0, "max": 900.0, "avg": 300.0, "sum": 3000.0},
            "price_ranges": {"buckets": [
                {"key": "*-100.0", "to": 100.0, "doc_count": 1},
                {"key": "100.0-250.0", "from": 100.0, "to": 250.0, "doc_count": 4},
                {"key": "1000.0-*", "from": 1000.0, "doc_count": 0}
            ]},
            "ride_type_breakdown": {"buckets": [
                {"key": "shared", "doc_count": 7},
                {"key": "private", "doc_count": 3}
            ]},
            "daily_trips": {"buckets": [
                {"key_as_string": "2024-06-14", "key": 1718323200000_u64, "doc_count": 4},
                {"key_as_string": "2024-06-15", "key": 1718409600000_u64, "doc_count": 6}
            ]},
            "top_drivers": {"buckets": [{
                "key": "d1",
                "doc_count": 5,
                "avg_rating": {"value": 4.5},
                "total_revenue": {"value": 1500.0},
                "status_breakdown": {"buckets": [{"key": "completed", "doc_count": 5}]}
            }]},
            "top_routes": {"buckets": [{
                "key": ["Airport", "Station"],
                "doc_count": 3,
                "avg_price": {"value": null}
            }]},
            "cancellation_analysis": {
                "doc_count": 2,
                "by_reason": {"buckets": [{"key": "driver late", "doc_count": 2}]},
                "by_actor": {"buckets": [{"key": "rider", "doc_count": 2}]}
            },
            "polyline_coverage": {"doc_count": 8}
        })
    }

    #[test]
    fn test_reduce_full_tree() {
        let summary = reduce_trip_analytics(&sample_aggs(), 10);

        assert_eq!(summary.status_breakdown["completed"], 8);
        assert_eq!(summary.status_breakdown["cancelled"], 2);
        assert_eq!(summary.payment_breakdown["pending"], 4);
        assert_eq!(summary.ride_type_breakdown["shared"], 7);
        assert_eq!(summary.price_stats.count, 10);
        assert_eq!(summary.price_stats.min, Some(50.0));
        assert_eq!(
            summary
                .price_ranges
                .iter()
                .map(|r| r.label.as_str())
                .collect::<Vec<_>>(),
            vec!["<100", "100-250", "1000+"]
        );
        assert_eq!(
            summary.daily_trends,
            vec![
                TrendPoint { label: "2024-06-14".into(), count: 4 },
                TrendPoint { label: "2024-06-15".into(), count: 6 },
            ]
        );
        assert_eq!(summary.top_drivers[0].avg_rating, Some(4.5));
        assert_eq!(summary.top_drivers[0].status_breakdown["completed"], 5);
        assert_eq!(summary.top_routes[0].from, "Airport");
        assert_eq!(summary.top_routes[0].avg_price, None);
        assert_eq!(summary.cancellation.total_cancelled, 2);
        assert_eq!(summary.cancellation.cancellation_rate, 20.0);
        assert_eq!(summary.polyline_coverage.coverage_percentage, 80.0);
        assert_eq!(summary.completion_rate, 80.0);
    }

    #[test]
    fn test_missing_aggregations_give_empty_shape() {
        let summary = reduce_trip_analytics(&Value::Null, 0);
        assert!(summary.status_breakdown.is_empty());
        assert!(summary.daily_trends.is_empty());
        assert_eq!(summary.cancellation, CancellationAnalysis::default());
        assert_eq!(summary.completion_rate, 0.0);
        assert_eq!(summary.polyline_coverage.coverage_percentage, 0.0);

        let serialized = serde_json::to_value(&summary).unwrap();
        assert_eq!(serialized["cancellation"]["totalCancelled"], json!(0));
        assert!(serialized["cancellation"].is_object());
    }

    #[test]
    fn test_malformed_buckets_are_skipped() {
        let aggs = json!({
            "trip_stats": {"buckets": [
                {"key": ["completed"], "doc_count": 3},
                {"key": ["completed", "paid"], "doc_count": 1}
            ]},
            "ride_type_breakdown": {"buckets": "nope"}
        });
        let summary = reduce_trip_analytics(&aggs, 4);
        assert_eq!(summary.status_breakdown["completed"], 1);
        assert!(summary.ride_type_breakdown.is_empty());
    }

    #[rstest]
    #[case(Some(100.0), Some(250.0), "100-250")]
    #[case(Some(1000.0), None, "1000+")]
    #[case(None, Some(100.0), "<100")]
    #[case(Some(99.5), Some(100.0), "99.5-100")]
    fn test_range_label(#[case] from: Option<f64>, #[case] to: Option<f64>, #[case] expected: &str) {
        assert_eq!(range_label(from, to), expected);
    }

    #[test]
    fn test_driver_metrics() {
        let metrics = reduce_driver_metrics(&json!({
            "total_trips": {"value": 4},
            "completed_trips": {"doc_count": 3},
            "cancelled_trips": {"doc_count": 1},
            "total_revenue": {"value": 820.0},
            "avg_rating": {"value": null},
            "status_breakdown": {"buckets": [
                {"key": "completed", "doc_count": 3},
                {"key": "cancelled", "doc_count": 1}
            ]}
        }));
        assert_eq!(metrics.completion_rate, 75.0);
        assert_eq!(metrics.cancellation_rate, 25.0);
        assert_eq!(metrics.avg_rating, None);

        let empty = reduce_driver_metrics(&json!({}));
        assert_eq!(empty.completion_rate, 0.0);
        assert_eq!(empty.cancellation_rate, 0.0);
    }

    #[test]
    fn test_polyline_statistics() {
        let stats = reduce_polyline_statistics(
            &json!({
                "with_polyline": {"doc_count": 3},
                "by_status": {"buckets": [
                    {"key": "completed", "doc_count": 3, "with_polyline": {"doc_count": 3}},
                    {"key": "cancelled", "doc_count": 1, "with_polyline": {"doc_count": 0}}
                ]},
                "daily": {"buckets": [
                    {"key_as_string": "2024-06-15", "key": 1, "doc_count": 0, "with_polyline": {"doc_count": 0}}
                ]}
            }),
            4,
        );
        assert_eq!(stats.overview.coverage_percentage, 75.0);
        assert_eq!(stats.overview.without_polyline, 1);
        assert_eq!(stats.coverage_by_status[0].coverage_percentage, 100.0);
        assert_eq!(stats.daily_coverage[0].key, "2024-06-15");
        assert_eq!(stats.daily_coverage[0].coverage_percentage, 0.0);
        assert!(stats.coverage_by_ride_type.is_empty());
    }

    proptest! {
        #[test]
        fn prop_breakdowns_sum_to_total(counts in proptest::collection::vec(0u64..1000, 1..8)) {
            let statuses = ["pending", "accepted", "started", "ongoing", "completed", "cancelled", "x", "y"];
            let buckets: Vec<Value> = counts
                .iter()
                .zip(statuses)
                .map(|(count, status)| json!({"key": [status, "paid"], "doc_count": count}))
                .collect();
            let total: u64 = counts.iter().sum();

            let summary = reduce_trip_analytics(&json!({"trip_stats": {"buckets": buckets}}), total);
            prop_assert_eq!(summary.status_breakdown.values().sum::<u64>(), total);
            prop_assert_eq!(summary.payment_breakdown.values().sum::<u64>(), total);
        }
    }
}
