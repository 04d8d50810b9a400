//! Trip index queries

use serde_json::{json, Value};

use super::aggs::{driver_aggregations, polyline_statistics_aggregations, trip_aggregations};
use super::{
    contains, exists, range, regexp, sort_clause, term, BoolQuery, QueryDocument,
    CREATED_AT_FIELD, POLYLINE_FIELD,
};
use crate::models::{FilterOptions, RideType, SortField, SortOrder, TripStatus};
use crate::time_window::TimeWindow;

/// Fields a rider's phone number may appear in
pub const PHONE_FIELDS: [&str; 3] = [
    "rider.phone.keyword",
    "pickUpPhoneNumber.keyword",
    "dropOffPhoneNumber.keyword",
];

/// Fields scanned by free-text search
pub const SEARCH_TEXT_FIELDS: [&str; 6] = [
    "rider.name.keyword",
    "driver.name.keyword",
    "from.name.keyword",
    "to.name.keyword",
    "tripId.keyword",
    "rideId.keyword",
];

/// Encoded polylines shorter than this are structurally invalid
pub const MIN_POLYLINE_LENGTH: usize = 11;

const NON_EMPTY_PATTERN: &str = ".+";

fn polyline_keyword() -> String {
    format!("{POLYLINE_FIELD}.keyword")
}

/// Some route leg carries a non-empty polyline; with `validate`, one at least
/// [`MIN_POLYLINE_LENGTH`] characters long.
///
/// The keyword field is multi-valued, so these clauses match when *any* leg
/// qualifies. Empty legs next to a real one do not disqualify the trip.
pub fn has_polyline_clause(validate: bool) -> Value {
    let pattern = if validate {
        format!(".{{{MIN_POLYLINE_LENGTH},}}")
    } else {
        NON_EMPTY_PATTERN.to_string()
    };
    BoolQuery::new()
        .filter(exists(POLYLINE_FIELD))
        .filter(regexp(&polyline_keyword(), &pattern))
        .build()
}

/// No route leg carries a non-empty polyline
fn missing_polyline_clause() -> Value {
    let keyword = polyline_keyword();
    BoolQuery::new()
        .should(BoolQuery::new().must_not(exists(POLYLINE_FIELD)).build())
        .should(
            BoolQuery::new()
                .must_not(regexp(&keyword, NON_EMPTY_PATTERN))
                .build(),
        )
        .minimum_should_match(1)
        .build()
}

/// Any of several phone fields contains `phone`
fn phone_clause(phone: &str) -> Value {
    PHONE_FIELDS
        .iter()
        .fold(BoolQuery::new(), |q, field| q.should(contains(field, phone)))
        .minimum_should_match(1)
        .build()
}

fn sort_clauses(field: SortField, order: SortOrder) -> Vec<Value> {
    let mut sort = vec![sort_clause(field.index_field(), order.as_str())];
    if field != SortField::CreatedAt {
        sort.push(sort_clause(CREATED_AT_FIELD, order.as_str()));
    }
    sort
}

/// Translate filter options into a trip search.
///
/// `options` are expected to be normalized and validated, with any symbolic time
/// range already resolved into `start_time`/`end_time`.
pub fn build_trip_query(options: &FilterOptions, default_size: u32) -> QueryDocument {
    let mut bool_query = BoolQuery::new();

    let terms = [
        ("tripId.keyword", options.trip_id.as_deref()),
        ("rideId.keyword", options.ride_id.as_deref()),
        ("driver.id.keyword", options.driver_id.as_deref()),
        ("rider.id.keyword", options.rider_id.as_deref()),
    ];
    for (field, value) in terms {
        if let Some(value) = value {
            bool_query = bool_query.filter(term(field, value));
        }
    }

    if let Some(phone) = options.rider_phone.as_deref() {
        bool_query = bool_query.filter(phone_clause(phone));
    }

    let categories = [
        ("tripStatus.keyword", options.trip_status.map(|s| s.as_str())),
        (
            "paymentStatus.keyword",
            options.payment_status.map(|s| s.as_str()),
        ),
        ("rideType.keyword", options.ride_type.map(|t| t.as_str())),
    ];
    for (field, value) in categories {
        if let Some(value) = value {
            bool_query = bool_query.filter(term(field, value));
        }
    }

    bool_query = bool_query
        .filter_opt(range(CREATED_AT_FIELD, options.start_time, options.end_time))
        .filter_opt(range("price", options.min_price, options.max_price));

    match options.polyline_required {
        Some(true) => {
            bool_query = bool_query.filter(has_polyline_clause(
                options.validate_polyline.unwrap_or(false),
            ));
        }
        Some(false) => bool_query = bool_query.filter(missing_polyline_clause()),
        None => {}
    }

    let mut doc = QueryDocument::new(options.size_or(default_size), bool_query.build());
    doc.sort = sort_clauses(options.sort_field(), options.sort_direction());
    doc.track_total_hits = Some(true);
    if options.wants_analytics() {
        doc.aggs = Some(trip_aggregations());
    }
    doc
}

/// Single trip by id
pub fn build_lookup_query(trip_id: &str) -> QueryDocument {
    QueryDocument::new(1, BoolQuery::new().filter(term("tripId.keyword", trip_id)).build())
}

/// Free-text match across names and ids, newest first
pub fn build_search_text_query(text: &str, size: u32) -> QueryDocument {
    let query = SEARCH_TEXT_FIELDS
        .iter()
        .fold(BoolQuery::new(), |q, field| q.should(contains(field, text)))
        .minimum_should_match(1)
        .build();

    let mut doc = QueryDocument::new(size, query);
    doc.sort = vec![sort_clause(CREATED_AT_FIELD, SortOrder::Desc.as_str())];
    doc.track_total_hits = Some(true);
    doc
}

/// Stats-only query over one driver's trips
pub fn build_driver_analytics_query(driver_id: &str, window: Option<TimeWindow>) -> QueryDocument {
    let query = BoolQuery::new()
        .filter(term("driver.id.keyword", driver_id))
        .filter_opt(window.and_then(|w| range(CREATED_AT_FIELD, Some(w.start), Some(w.end))))
        .build();

    let mut doc = QueryDocument::new(0, query);
    doc.aggs = Some(driver_aggregations());
    doc
}

/// Filters accepted by the polyline statistics report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolylineStatisticsScope {
    /// Restrict to one driver
    pub driver_id: Option<String>,
    /// Restrict to one lifecycle state
    pub trip_status: Option<TripStatus>,
    /// Restrict to one product
    pub ride_type: Option<RideType>,
    /// Creation-time window
    pub window: Option<TimeWindow>,
}

/// Stats-only coverage query
pub fn build_polyline_statistics_query(scope: &PolylineStatisticsScope) -> QueryDocument {
    let query = BoolQuery::new()
        .filter_opt(
            scope
                .driver_id
                .as_deref()
                .map(|id| term("driver.id.keyword", id)),
        )
        .filter_opt(
            scope
                .trip_status
                .map(|s| term("tripStatus.keyword", s.as_str())),
        )
        .filter_opt(scope.ride_type.map(|t| term("rideType.keyword", t.as_str())))
        .filter_opt(
            scope
                .window
                .and_then(|w| range(CREATED_AT_FIELD, Some(w.start), Some(w.end))),
        )
        .build();

    let mut doc = QueryDocument::new(0, query);
    doc.track_total_hits = Some(true);
    doc.aggs = Some(polyline_statistics_aggregations());
    doc
}
