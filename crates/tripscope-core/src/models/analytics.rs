//! Analytics output shapes

use std::collections::BTreeMap;

use serde::Serialize;
use serde_with::skip_serializing_none;

/// Category label to document count
pub type Breakdown = BTreeMap<String, u64>;

/// `part / whole` as a percentage rounded to two decimals; `0` when `whole` is `0`
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

/// Price statistics as reported by the backend.
///
/// `min`, `max` and `avg` are absent when no document carries a price.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceStats {
    /// Lowest fare
    pub min: Option<f64>,
    /// Highest fare
    pub max: Option<f64>,
    /// Mean fare
    pub avg: Option<f64>,
    /// Total fares
    pub sum: f64,
    /// Trips carrying a fare
    pub count: u64,
}

/// One labeled bucket of the price histogram
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeBucket {
    /// Bucket label
    pub label: String,
    /// Inclusive lower bound
    pub from: Option<f64>,
    /// Exclusive upper bound
    pub to: Option<f64>,
    /// Trips in the bucket
    pub count: u64,
}

/// One point of a time series
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// Day or hour label
    pub label: String,
    /// Trips in the bucket
    pub count: u64,
}

/// A driver ranked by trip count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverRanking {
    /// Driver identifier
    pub driver_id: String,
    /// Trips matched
    pub trip_count: u64,
    /// Mean rating
    pub avg_rating: Option<f64>,
    /// Sum of fares
    pub total_revenue: f64,
    /// Trips per lifecycle state
    pub status_breakdown: Breakdown,
}

/// An origin/destination pair ranked by trip count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRanking {
    /// Pickup place name
    pub from: String,
    /// Drop-off place name
    pub to: String,
    /// Trips on the route
    pub trip_count: u64,
    /// Mean fare on the route
    pub avg_price: Option<f64>,
}

/// Cancelled trips broken down by reason and by who cancelled
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationAnalysis {
    /// Cancelled trips
    pub total_cancelled: u64,
    /// Cancelled share of all trips, in percent
    pub cancellation_rate: f64,
    /// Cancellations per reason
    pub by_reason: Breakdown,
    /// Cancellations per actor
    pub by_actor: Breakdown,
}

/// Share of trips carrying route geometry
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    /// Trips considered
    pub total_trips: u64,
    /// Trips with route geometry
    pub with_polyline: u64,
    /// Trips without route geometry
    pub without_polyline: u64,
    /// `with_polyline` share of `total_trips`
    pub coverage_percentage: f64,
}

impl CoverageStats {
    /// Coverage from raw counts; `with_polyline` is clamped to `total_trips`
    pub fn new(total_trips: u64, with_polyline: u64) -> Self {
        let with_polyline = with_polyline.min(total_trips);
        Self {
            total_trips,
            with_polyline,
            without_polyline: total_trips - with_polyline,
            coverage_percentage: percentage(with_polyline, total_trips),
        }
    }
}

/// Aggregate view over the trips matched by one search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    /// Trips matched
    pub total_trips: u64,
    /// Trips per lifecycle state
    pub status_breakdown: Breakdown,
    /// Trips per settlement state
    pub payment_breakdown: Breakdown,
    /// Trips per product
    pub ride_type_breakdown: Breakdown,
    /// Fare statistics
    pub price_stats: PriceStats,
    /// Fare histogram
    pub price_ranges: Vec<RangeBucket>,
    /// Trips per day
    pub daily_trends: Vec<TrendPoint>,
    /// Trips per hour
    pub hourly_trends: Vec<TrendPoint>,
    /// Busiest drivers
    pub top_drivers: Vec<DriverRanking>,
    /// Busiest routes
    pub top_routes: Vec<RouteRanking>,
    /// Cancellation breakdown
    pub cancellation: CancellationAnalysis,
    /// Route geometry coverage
    pub polyline_coverage: CoverageStats,
    /// Completed share of all trips, in percent
    pub completion_rate: f64,
}

/// Per-driver performance figures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverMetrics {
    /// Trips in the window
    pub total_trips: u64,
    /// Completed trips
    pub completed_trips: u64,
    /// Cancelled trips
    pub cancelled_trips: u64,
    /// Completed share, in percent
    pub completion_rate: f64,
    /// Cancelled share, in percent
    pub cancellation_rate: f64,
    /// Sum of fares
    pub total_revenue: f64,
    /// Mean rating
    pub avg_rating: Option<f64>,
    /// Trips per lifecycle state
    pub status_breakdown: Breakdown,
}

/// Performance summary for one driver
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverAnalytics {
    /// Driver identifier
    pub driver_id: String,
    /// Figures for the requested window
    pub analytics: DriverMetrics,
}

/// Coverage for one category or day
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRow {
    /// Category or day label
    pub key: String,
    /// Trips in the category
    pub total: u64,
    /// Trips with route geometry
    pub with_polyline: u64,
    /// Coverage in percent
    pub coverage_percentage: f64,
}

impl CoverageRow {
    /// Row from raw counts; `with_polyline` is clamped to `total`
    pub fn new(key: impl Into<String>, total: u64, with_polyline: u64) -> Self {
        let with_polyline = with_polyline.min(total);
        Self {
            key: key.into(),
            total,
            with_polyline,
            coverage_percentage: percentage(with_polyline, total),
        }
    }
}

/// Route-geometry coverage across a set of trips
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineStatistics {
    /// Coverage across all matched trips
    pub overview: CoverageStats,
    /// Coverage per lifecycle state
    pub coverage_by_status: Vec<CoverageRow>,
    /// Coverage per product
    pub coverage_by_ride_type: Vec<CoverageRow>,
    /// Coverage per day
    pub daily_coverage: Vec<CoverageRow>,
}

/// Structural check of one trip's route geometry
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineValidation {
    /// Trip checked
    pub trip_id: String,
    /// Whether the trip carries route geometry
    pub has_polyline: bool,
    /// Encoded length in characters
    pub polyline_length: usize,
    /// Approximate coordinate count
    pub estimated_points: usize,
    /// `true` when `issues` is empty and geometry is present
    pub is_valid: bool,
    /// Named structural problems
    pub issues: Vec<String>,
    /// Non-blocking observations; these never affect `is_valid`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Set when the trip could not be checked at all
    pub error: Option<String>,
}

impl PolylineValidation {
    /// Slot for an id whose lookup failed
    pub fn failed(trip_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            trip_id: trip_id.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Counts over a bulk validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidationSummary {
    /// Ids checked
    pub total_checked: usize,
    /// Trips with route geometry
    pub with_polyline: usize,
    /// Trips whose geometry passed
    pub valid: usize,
    /// Trips whose geometry failed
    pub invalid: usize,
    /// Trips without route geometry
    pub missing: usize,
    /// Ids that could not be looked up
    pub errors: usize,
}

impl BulkValidationSummary {
    /// Tally a list of validation records
    pub fn tally(validations: &[PolylineValidation]) -> Self {
        validations
            .iter()
            .fold(Self::default(), |mut summary, validation| {
                summary.total_checked += 1;
                if validation.error.is_some() {
                    summary.errors += 1;
                } else if !validation.has_polyline {
                    summary.missing += 1;
                } else {
                    summary.with_polyline += 1;
                    if validation.is_valid {
                        summary.valid += 1;
                    } else {
                        summary.invalid += 1;
                    }
                }
                summary
            })
    }
}

/// Summary plus per-id records, in request order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkValidationReport {
    /// Counts
    pub summary: BulkValidationSummary,
    /// One record per requested id
    pub validations: Vec<PolylineValidation>,
}
