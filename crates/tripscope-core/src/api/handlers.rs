//! Entry-point handlers
//!
//! One function per entry point. Request structs deserialize from the camelCase
//! JSON the dashboard sends.

use std::sync::Arc;

use serde::Deserialize;

use super::ApiResponse;
use crate::clock::Clock;
use crate::config::Config;
use crate::gateway::SearchGateway;
use crate::models::{
    BulkValidationReport, DriverAnalytics, FilterOptions, NormalizedTrip, PolylineStatistics,
    PolylineValidation,
};
use crate::service::{
    LocationHistory, LocationOptions, RangeSelection, RecentUnit, RideLocationService,
    TripAnalyticsService, TripSearchResult,
};

/// Services shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Trip analytics
    pub trips: TripAnalyticsService,
    /// Ride-location history
    pub locations: RideLocationService,
}

impl AppState {
    /// Build both services over one gateway and clock
    pub fn new(gateway: Arc<dyn SearchGateway>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            trips: TripAnalyticsService::new(gateway.clone(), clock.clone(), config),
            locations: RideLocationService::new(gateway, clock, config),
        }
    }
}

/// Trip search between two dates
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRangeRequest {
    /// ISO-8601 start
    pub start_date: String,
    /// ISO-8601 end
    pub end_date: String,
    /// Remaining filters
    #[serde(flatten)]
    pub options: FilterOptions,
}

/// Trip search over a trailing window
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTripsRequest {
    /// Lookback length in `unit`s
    pub value: i64,
    /// `hours`, `days` or `weeks`; anything else means hours
    pub unit: Option<String>,
    /// Remaining filters
    #[serde(flatten)]
    pub options: FilterOptions,
}

/// Free-text trip search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    /// Text to look for
    pub text: String,
    /// Maximum trips to return
    pub size: Option<u32>,
}

/// Ids for bulk polyline validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkValidateRequest {
    /// Trips to check, in output order
    pub trip_ids: Vec<String>,
}

/// Location history between two dates
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRangeRequest {
    /// ISO-8601 start
    pub start_date: String,
    /// ISO-8601 end
    pub end_date: String,
    /// Remaining options
    #[serde(flatten)]
    pub options: LocationOptions,
}

/// Dashboard location lookup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSearchRequest {
    /// Range token
    pub time_range: Option<String>,
    /// Start of a `custom` range
    pub custom_start: Option<String>,
    /// End of a `custom` range
    pub custom_end: Option<String>,
    /// Maximum pings
    pub limit: Option<u32>,
}

/// Filtered trip search with analytics
pub async fn fetch_trips(state: &AppState, options: FilterOptions) -> ApiResponse<TripSearchResult> {
    ApiResponse::from_result("fetch_trips", state.trips.fetch_trips(options).await)
}

/// Trip search between two ISO-8601 dates
pub async fn get_trips_by_date_range(
    state: &AppState,
    req: DateRangeRequest,
) -> ApiResponse<TripSearchResult> {
    let result = state
        .trips
        .get_trips_by_date_range(&req.start_date, &req.end_date, req.options)
        .await;
    ApiResponse::from_result("get_trips_by_date_range", result)
}

/// Trip search over a trailing window
pub async fn get_recent_trips(
    state: &AppState,
    req: RecentTripsRequest,
) -> ApiResponse<TripSearchResult> {
    let unit = req
        .unit
        .as_deref()
        .map(RecentUnit::parse_lenient)
        .unwrap_or_default();
    let result = state
        .trips
        .get_recent_trips(req.value, unit, req.options)
        .await;
    ApiResponse::from_result("get_recent_trips", result)
}

/// Free-text trip search
pub async fn search_trips(state: &AppState, req: SearchRequest) -> ApiResponse<TripSearchResult> {
    ApiResponse::from_result(
        "search_trips",
        state.trips.search_trips(&req.text, req.size).await,
    )
}

/// One trip by id; a miss is reported with status 404
pub async fn get_trip_by_id(state: &AppState, trip_id: &str) -> ApiResponse<NormalizedTrip> {
    ApiResponse::from_result("get_trip_by_id", state.trips.get_trip_by_id(trip_id).await)
}

/// Performance summary for one driver
pub async fn get_driver_analytics(
    state: &AppState,
    driver_id: &str,
    range: RangeSelection,
) -> ApiResponse<DriverAnalytics> {
    ApiResponse::from_result(
        "get_driver_analytics",
        state.trips.get_driver_analytics(driver_id, &range).await,
    )
}

/// Route-geometry coverage
pub async fn get_polyline_statistics(
    state: &AppState,
    options: FilterOptions,
) -> ApiResponse<PolylineStatistics> {
    ApiResponse::from_result(
        "get_polyline_statistics",
        state.trips.get_polyline_statistics(&options).await,
    )
}

/// Check one trip's route geometry
pub async fn validate_trip_polyline(
    state: &AppState,
    trip_id: &str,
) -> ApiResponse<PolylineValidation> {
    ApiResponse::from_result(
        "validate_trip_polyline",
        state.trips.validate_trip_polyline(trip_id).await,
    )
}

/// Check route geometry for many trips
pub async fn bulk_validate_polylines(
    state: &AppState,
    req: BulkValidateRequest,
) -> ApiResponse<BulkValidationReport> {
    ApiResponse::from_result(
        "bulk_validate_polylines",
        state.trips.bulk_validate_polylines(&req.trip_ids).await,
    )
}

/// Location history with explicit options
pub async fn fetch_ride_location_history(
    state: &AppState,
    driver_id: &str,
    options: LocationOptions,
) -> ApiResponse<LocationHistory> {
    ApiResponse::from_result(
        "fetch_ride_location_history",
        state
            .locations
            .fetch_ride_location_history(driver_id, options)
            .await,
    )
}

/// Location history between two ISO-8601 dates
pub async fn get_ride_location_history_by_time_range(
    state: &AppState,
    driver_id: &str,
    req: LocationRangeRequest,
) -> ApiResponse<LocationHistory> {
    let result = state
        .locations
        .get_ride_location_history_by_time_range(
            driver_id,
            &req.start_date,
            &req.end_date,
            req.options,
        )
        .await;
    ApiResponse::from_result("get_ride_location_history_by_time_range", result)
}

/// Location history over the trailing `hours_back` hours
pub async fn get_recent_ride_location_history(
    state: &AppState,
    driver_id: &str,
    hours_back: Option<i64>,
    options: LocationOptions,
) -> ApiResponse<LocationHistory> {
    let result = state
        .locations
        .get_recent_ride_location_history(driver_id, hours_back, options)
        .await;
    ApiResponse::from_result("get_recent_ride_location_history", result)
}

/// Dashboard location lookup; a missing token means the last 24 hours
pub async fn search_ride_locations(
    state: &AppState,
    driver_id: &str,
    req: LocationSearchRequest,
) -> ApiResponse<LocationHistory> {
    let result = state
        .locations
        .search_ride_locations(
            driver_id,
            req.time_range.as_deref().unwrap_or_default(),
            req.custom_start.as_deref(),
            req.custom_end.as_deref(),
            req.limit,
        )
        .await;
    ApiResponse::from_result("search_ride_locations", result)
}
