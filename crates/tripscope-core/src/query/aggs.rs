//! Aggregation tree attached to trip searches

use serde_json::{json, Map, Value};

use super::{has_polyline_clause, term, CREATED_AT_FIELD};

/// Aggregation names shared by the query builders and the reducer
pub mod names {
    /// Lifecycle-state terms
    pub const TRIP_STATS: &str = "trip_stats";
    /// Fare stats
    pub const PRICE_STATS: &str = "price_stats";
    /// Fare histogram
    pub const PRICE_RANGES: &str = "price_ranges";
    /// Product terms
    pub const RIDE_TYPE_BREAKDOWN: &str = "ride_type_breakdown";
    /// Per-day histogram
    pub const DAILY_TRIPS: &str = "daily_trips";
    /// Per-hour histogram
    pub const HOURLY_TRIPS: &str = "hourly_trips";
    /// Driver ranking
    pub const TOP_DRIVERS: &str = "top_drivers";
    /// Route ranking
    pub const TOP_ROUTES: &str = "top_routes";
    /// Cancelled-trip filter
    pub const CANCELLATION_ANALYSIS: &str = "cancellation_analysis";
    /// Geometry coverage filter
    pub const POLYLINE_COVERAGE: &str = "polyline_coverage";

    /// Mean rating metric
    pub const AVG_RATING: &str = "avg_rating";
    /// Fare sum metric
    pub const TOTAL_REVENUE: &str = "total_revenue";
    /// Nested lifecycle-state terms
    pub const STATUS_BREAKDOWN: &str = "status_breakdown";
    /// Mean fare metric
    pub const AVG_PRICE: &str = "avg_price";
    /// Cancellation reasons
    pub const BY_REASON: &str = "by_reason";
    /// Cancelling actors
    pub const BY_ACTOR: &str = "by_actor";

    /// Driver trip count
    pub const TOTAL_TRIPS: &str = "total_trips";
    /// Driver completed-trip filter
    pub const COMPLETED_TRIPS: &str = "completed_trips";
    /// Driver cancelled-trip filter
    pub const CANCELLED_TRIPS: &str = "cancelled_trips";

    /// Trips with geometry
    pub const WITH_POLYLINE: &str = "with_polyline";
    /// Coverage per lifecycle state
    pub const BY_STATUS: &str = "by_status";
    /// Coverage per product
    pub const BY_RIDE_TYPE: &str = "by_ride_type";
    /// Coverage per day
    pub const DAILY: &str = "daily";

    /// Location-history distance metric
    pub const DISTANCE_TRAVELED: &str = "distance_traveled";
}

/// Price histogram bucket edges: `<100`, `100-250`, `250-500`, `500-1000`, `1000+`
pub const PRICE_RANGE_EDGES: [f64; 4] = [100.0, 250.0, 500.0, 1000.0];

/// Enough buckets that status × payment combinations are never truncated
const BREAKDOWN_SIZE: u32 = 100;
const TOP_N: u32 = 10;

fn price_ranges() -> Value {
    let mut ranges = Vec::with_capacity(PRICE_RANGE_EDGES.len() + 1);
    let mut from: Option<f64> = None;
    for edge in PRICE_RANGE_EDGES {
        ranges.push(match from {
            Some(from) => json!({ "from": from, "to": edge }),
            None => json!({ "to": edge }),
        });
        from = Some(edge);
    }
    if let Some(from) = from {
        ranges.push(json!({ "from": from }));
    }
    json!({ "range": { "field": "price", "ranges": ranges } })
}

fn histogram(interval: &str, format: &str) -> Value {
    json!({
        "date_histogram": {
            "field": CREATED_AT_FIELD,
            "calendar_interval": interval,
            "format": format,
            "min_doc_count": 0
        }
    })
}

/// Full analytics tree for a trip search
pub fn trip_aggregations() -> Value {
    let mut aggs = Map::new();
    aggs.insert(
        names::TRIP_STATS.into(),
        json!({
            "multi_terms": {
                "terms": [
                    { "field": "tripStatus.keyword" },
                    { "field": "paymentStatus.keyword" }
                ],
                "size": BREAKDOWN_SIZE
            }
        }),
    );
    aggs.insert(
        names::PRICE_STATS.into(),
        json!({ "stats": { "field": "price" } }),
    );
    aggs.insert(names::PRICE_RANGES.into(), price_ranges());
    aggs.insert(
        names::RIDE_TYPE_BREAKDOWN.into(),
        json!({ "terms": { "field": "rideType.keyword", "size": BREAKDOWN_SIZE } }),
    );
    aggs.insert(names::DAILY_TRIPS.into(), histogram("1d", "yyyy-MM-dd"));
    aggs.insert(names::HOURLY_TRIPS.into(), histogram("1h", "yyyy-MM-dd HH:00"));
    aggs.insert(
        names::TOP_DRIVERS.into(),
        json!({
            "terms": { "field": "driver.id.keyword", "size": TOP_N },
            "aggs": {
                (names::AVG_RATING): { "avg": { "field": "driver.rating" } },
                (names::TOTAL_REVENUE): { "sum": { "field": "price" } },
                (names::STATUS_BREAKDOWN): { "terms": { "field": "tripStatus.keyword" } }
            }
        }),
    );
    aggs.insert(
        names::TOP_ROUTES.into(),
        json!({
            "multi_terms": {
                "terms": [
                    { "field": "from.name.keyword" },
                    { "field": "to.name.keyword" }
                ],
                "size": TOP_N
            },
            "aggs": {
                (names::AVG_PRICE): { "avg": { "field": "price" } }
            }
        }),
    );
    aggs.insert(
        names::CANCELLATION_ANALYSIS.into(),
        json!({
            "filter": term("tripStatus.keyword", "cancelled"),
            "aggs": {
                (names::BY_REASON): { "terms": { "field": "cancelReason.keyword", "size": 20 } },
                (names::BY_ACTOR): { "terms": { "field": "canceledBy.keyword", "size": TOP_N } }
            }
        }),
    );
    aggs.insert(
        names::POLYLINE_COVERAGE.into(),
        json!({ "filter": has_polyline_clause(false) }),
    );
    Value::Object(aggs)
}

/// Aggregations for the per-driver performance summary
pub(crate) fn driver_aggregations() -> Value {
    json!({
        (names::TOTAL_TRIPS): { "value_count": { "field": "tripId.keyword" } },
        (names::COMPLETED_TRIPS): { "filter": term("tripStatus.keyword", "completed") },
        (names::CANCELLED_TRIPS): { "filter": term("tripStatus.keyword", "cancelled") },
        (names::TOTAL_REVENUE): { "sum": { "field": "price" } },
        (names::AVG_RATING): { "avg": { "field": "driver.rating" } },
        (names::STATUS_BREAKDOWN): {
            "terms": { "field": "tripStatus.keyword", "size": BREAKDOWN_SIZE }
        }
    })
}

/// Coverage aggregations: overall plus per status, ride type and day
pub(crate) fn polyline_statistics_aggregations() -> Value {
    let with_polyline = || {
        json!({
            (names::WITH_POLYLINE): { "filter": has_polyline_clause(false) }
        })
    };
    json!({
        (names::WITH_POLYLINE): { "filter": has_polyline_clause(false) },
        (names::BY_STATUS): {
            "terms": { "field": "tripStatus.keyword", "size": BREAKDOWN_SIZE },
            "aggs": with_polyline()
        },
        (names::BY_RIDE_TYPE): {
            "terms": { "field": "rideType.keyword", "size": BREAKDOWN_SIZE },
            "aggs": with_polyline()
        },
        (names::DAILY): {
            "date_histogram": {
                "field": CREATED_AT_FIELD,
                "calendar_interval": "1d",
                "format": "yyyy-MM-dd"
            },
            "aggs": with_polyline()
        }
    })
}

/// Server-side Haversine over every ping, ordered by time
pub(crate) fn distance_traveled() -> Value {
    const REDUCE: &str = r"
        def points = [];
        for (s in states) { points.addAll(s); }
        points.sort((a, b) -> a.ts.compareTo(b.ts));
        def total = 0.0;
        def R = 6371.0;
        for (int i = 1; i < points.size(); i++) {
            def p1 = points[i - 1];
            def p2 = points[i];
            def dLat = Math.toRadians(p2.lat - p1.lat);
            def dLon = Math.toRadians(p2.lng - p1.lng);
            def a = Math.sin(dLat / 2) * Math.sin(dLat / 2) +
                    Math.sin(dLon / 2) * Math.sin(dLon / 2) *
                    Math.cos(Math.toRadians(p1.lat)) * Math.cos(Math.toRadians(p2.lat));
            total += R * 2 * Math.atan2(Math.sqrt(a), Math.sqrt(1 - a));
        }
        return total;";

    json!({
        (names::DISTANCE_TRAVELED): {
            "scripted_metric": {
                "init_script": "state.points = [];",
                "map_script": "if (doc.containsKey('currentLocation.lat') && doc.containsKey('currentLocation.lng') && !doc['currentLocation.lat'].empty && !doc['currentLocation.lng'].empty) { state.points.add(['lat': doc['currentLocation.lat'].value, 'lng': doc['currentLocation.lng'].value, 'ts': doc['createdAt._seconds'].value]); }",
                "combine_script": "return state.points;",
                "reduce_script": REDUCE.trim()
            }
        }
    })
}
