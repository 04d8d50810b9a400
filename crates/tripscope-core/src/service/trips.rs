//! Trip search and analytics

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_with::skip_serializing_none;
use tracing::{debug, info, warn};

use super::RangeSelection;
use crate::aggregation;
use crate::cache::QueryCache;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{QueryMeta, SearchGateway};
use crate::models::{
    AnalyticsSummary, BulkValidationReport, BulkValidationSummary, DriverAnalytics,
    FilterOptions, NormalizedTrip, PolylineStatistics, PolylineValidation, TripDocument,
    MAX_PAGE_SIZE,
};
use crate::polyline;
use crate::projector;
use crate::query::{self, PolylineStatisticsScope};
use crate::time_window::{parse_instant, TimeWindowResolver};

/// Default page size for free-text search
pub const SEARCH_DEFAULT_SIZE: u32 = 50;

/// Result of a trip search
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSearchResult {
    /// Total matches, which may exceed `trips_returned`
    pub total_trips: u64,
    /// Trips in this page
    pub trips_returned: usize,
    /// Normalized trips
    pub trips: Vec<NormalizedTrip>,
    /// Present unless analytics were disabled
    pub analytics: Option<AnalyticsSummary>,
    /// Backend timing
    pub query: QueryMeta,
}

/// Unit for "recent trips" lookbacks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecentUnit {
    /// One hour
    #[default]
    Hours,
    /// One day
    Days,
    /// Seven days
    Weeks,
}

impl RecentUnit {
    fn seconds(self) -> i64 {
        match self {
            Self::Hours => 3_600,
            Self::Days => 86_400,
            Self::Weeks => 604_800,
        }
    }

    /// Parse a unit name, falling back to hours for anything unrecognized
    pub fn parse_lenient(unit: &str) -> Self {
        unit.parse().unwrap_or_default()
    }
}

impl FromStr for RecentUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" | "hours" | "h" => Ok(Self::Hours),
            "day" | "days" | "d" => Ok(Self::Days),
            "week" | "weeks" | "w" => Ok(Self::Weeks),
            other => Err(Error::validation(format!("unknown time unit '{other}'"))),
        }
    }
}

/// Trip search, lookup, driver analytics and polyline checks
#[derive(Clone)]
pub struct TripAnalyticsService {
    gateway: Arc<dyn SearchGateway>,
    /// Caps custom windows on the search path
    search_resolver: TimeWindowResolver,
    resolver: TimeWindowResolver,
    cache: Option<QueryCache<TripSearchResult>>,
    cache_ttl: Duration,
    index: String,
    default_size: u32,
    default_timeout: Duration,
    analytics_timeout: Duration,
    bulk_concurrency: usize,
    max_bulk_ids: usize,
}

impl TripAnalyticsService {
    /// Build the service from configuration
    pub fn new(gateway: Arc<dyn SearchGateway>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let resolver = TimeWindowResolver::new(clock.clone());
        Self {
            gateway,
            search_resolver: resolver
                .clone()
                .with_max_custom_days(config.query.max_custom_range_days),
            resolver,
            cache: config
                .cache
                .enabled
                .then(|| QueryCache::new("trip_search", clock)),
            cache_ttl: config.cache.ttl,
            index: config.indices.trips.clone(),
            default_size: config.query.default_size,
            default_timeout: config.query.default_timeout,
            analytics_timeout: config.query.analytics_timeout,
            bulk_concurrency: config.query.bulk_validation_concurrency.max(1),
            max_bulk_ids: config.query.max_bulk_ids,
        }
    }

    /// Filtered trip search with analytics.
    ///
    /// Results are cached per canonical options for the configured TTL.
    pub async fn fetch_trips(&self, options: FilterOptions) -> Result<TripSearchResult> {
        let options = options.normalized();
        options.validate()?;

        let mut resolved = options.clone();
        if let Some(token) = options.time_range {
            let window = self.search_resolver.resolve(
                token,
                options.custom_start.as_deref(),
                options.custom_end.as_deref(),
            )?;
            resolved.start_time = Some(window.start);
            resolved.end_time = Some(window.end);
        }

        match &self.cache {
            Some(cache) => {
                let key = options.cache_key()?;
                cache
                    .get_or_compute(&key, self.cache_ttl, || self.execute_search(&resolved))
                    .await
            }
            None => self.execute_search(&resolved).await,
        }
    }

    async fn execute_search(&self, options: &FilterOptions) -> Result<TripSearchResult> {
        let query = query::build_trip_query(options, self.default_size);
        debug!(index = %self.index, size = query.size, "Executing trip search");

        let response = self
            .gateway
            .search(&self.index, &query, self.default_timeout)
            .await?;

        let trips: Vec<NormalizedTrip> = response.hits.iter().map(projector::project_trip).collect();
        let analytics = options
            .wants_analytics()
            .then(|| aggregation::reduce_trip_analytics(&response.aggregations, response.total));

        info!(
            total = response.total,
            returned = trips.len(),
            took_ms = response.took,
            "Trip search completed"
        );

        Ok(TripSearchResult {
            total_trips: response.total,
            trips_returned: trips.len(),
            trips,
            analytics,
            query: response.meta(),
        })
    }

    /// Trips created between two ISO-8601 instants
    pub async fn get_trips_by_date_range(
        &self,
        start: &str,
        end: &str,
        options: FilterOptions,
    ) -> Result<TripSearchResult> {
        let options = FilterOptions {
            start_time: Some(parse_instant(start)?),
            end_time: Some(parse_instant(end)?),
            time_range: None,
            custom_start: None,
            custom_end: None,
            ..options
        };
        self.fetch_trips(options).await
    }

    /// Trips created in the last `value` units
    pub async fn get_recent_trips(
        &self,
        value: i64,
        unit: RecentUnit,
        options: FilterOptions,
    ) -> Result<TripSearchResult> {
        if value < 0 {
            return Err(Error::validation("lookback must not be negative"));
        }
        let end = self.resolver.now().timestamp();
        let start = end.saturating_sub(value.saturating_mul(unit.seconds()));

        let options = FilterOptions {
            start_time: Some(start),
            end_time: Some(end),
            time_range: None,
            custom_start: None,
            custom_end: None,
            ..options
        };
        self.fetch_trips(options).await
    }

    /// Free-text search over names and ids, newest first
    pub async fn search_trips(&self, text: &str, size: Option<u32>) -> Result<TripSearchResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation("search text must not be blank"));
        }
        let size = size.unwrap_or(SEARCH_DEFAULT_SIZE);
        if size > MAX_PAGE_SIZE {
            return Err(Error::validation(format!(
                "size must be between 0 and {MAX_PAGE_SIZE}, got {size}"
            )));
        }

        let query = query::build_search_text_query(text, size);
        let response = self
            .gateway
            .search(&self.index, &query, self.default_timeout)
            .await?;

        let trips: Vec<NormalizedTrip> = response.hits.iter().map(projector::project_trip).collect();
        info!(text, total = response.total, returned = trips.len(), "Trip text search completed");

        Ok(TripSearchResult {
            total_trips: response.total,
            trips_returned: trips.len(),
            trips,
            analytics: None,
            query: response.meta(),
        })
    }

    async fn fetch_trip_document(&self, trip_id: &str) -> Result<TripDocument> {
        let trip_id = trip_id.trim();
        if trip_id.is_empty() {
            return Err(Error::validation("trip id must not be blank"));
        }

        let query = query::build_lookup_query(trip_id);
        let response = self
            .gateway
            .search(&self.index, &query, self.default_timeout)
            .await?;

        response
            .hits
            .first()
            .map(projector::trip_document)
            .ok_or_else(|| Error::not_found("trip", trip_id))
    }

    /// One trip by id
    pub async fn get_trip_by_id(&self, trip_id: &str) -> Result<NormalizedTrip> {
        let doc = self.fetch_trip_document(trip_id).await?;
        Ok(projector::normalize_trip(doc))
    }

    /// Performance summary for one driver, optionally limited to a window
    pub async fn get_driver_analytics(
        &self,
        driver_id: &str,
        range: &RangeSelection,
    ) -> Result<DriverAnalytics> {
        let driver_id = driver_id.trim();
        if driver_id.is_empty() {
            return Err(Error::validation("driver id must not be blank"));
        }
        let window = range.resolve(&self.resolver)?;

        let query = query::build_driver_analytics_query(driver_id, window);
        let response = self
            .gateway
            .search(&self.index, &query, self.analytics_timeout)
            .await?;

        let analytics = aggregation::reduce_driver_metrics(&response.aggregations);
        info!(driver_id, total = analytics.total_trips, "Driver analytics computed");

        Ok(DriverAnalytics {
            driver_id: driver_id.to_string(),
            analytics,
        })
    }

    /// Route-geometry coverage over the trips selected by `options`.
    ///
    /// Only the time range, driver, status and ride type filters apply.
    pub async fn get_polyline_statistics(
        &self,
        options: &FilterOptions,
    ) -> Result<PolylineStatistics> {
        let options = options.normalized();
        let window = RangeSelection {
            time_range: options.time_range,
            custom_start: options.custom_start.clone(),
            custom_end: options.custom_end.clone(),
            start_time: options.start_time,
            end_time: options.end_time,
        }
        .resolve(&self.resolver)?;

        let scope = PolylineStatisticsScope {
            driver_id: options.driver_id.clone(),
            trip_status: options.trip_status,
            ride_type: options.ride_type,
            window,
        };
        let query = query::build_polyline_statistics_query(&scope);
        let response = self
            .gateway
            .search(&self.index, &query, self.analytics_timeout)
            .await?;

        let statistics =
            aggregation::reduce_polyline_statistics(&response.aggregations, response.total);
        info!(
            total = statistics.overview.total_trips,
            coverage = statistics.overview.coverage_percentage,
            "Polyline statistics computed"
        );
        Ok(statistics)
    }

    /// Structural check of one trip's route geometry
    pub async fn validate_trip_polyline(&self, trip_id: &str) -> Result<PolylineValidation> {
        let doc = self.fetch_trip_document(trip_id).await?;
        Ok(polyline::validate_trip(trip_id.trim(), &doc))
    }

    /// Validate many trips; results keep input order and a failed lookup only
    /// affects its own slot
    pub async fn bulk_validate_polylines(&self, trip_ids: &[String]) -> Result<BulkValidationReport> {
        if trip_ids.is_empty() || trip_ids.len() > self.max_bulk_ids {
            return Err(Error::validation(format!(
                "between 1 and {} trip ids are required, got {}",
                self.max_bulk_ids,
                trip_ids.len()
            )));
        }

        let validations: Vec<PolylineValidation> = stream::iter(trip_ids)
            .map(|trip_id| async move {
                match self.validate_trip_polyline(trip_id).await {
                    Ok(validation) => validation,
                    Err(e) => {
                        warn!(trip_id = %trip_id, error = %e, "Polyline validation failed");
                        PolylineValidation::failed(trip_id.as_str(), e.to_string())
                    }
                }
            })
            .buffered(self.bulk_concurrency)
            .collect()
            .await;

        let summary = BulkValidationSummary::tally(&validations);
        info!(
            checked = summary.total_checked,
            valid = summary.valid,
            invalid = summary.invalid,
            missing = summary.missing,
            errors = summary.errors,
            "Bulk polyline validation completed"
        );

        Ok(BulkValidationReport {
            summary,
            validations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::testing::StubGateway;
    use crate::gateway::SearchResponse;
    use crate::models::TripStatus;
    use crate::time_window::TimeRangeToken;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(),
        ))
    }

    fn service(gateway: Arc<StubGateway>, clock: Arc<ManualClock>) -> TripAnalyticsService {
        TripAnalyticsService::new(gateway, clock, &Config::default())
    }

    fn trips_body(total: u64, sources: &[Value]) -> Value {
        let hits: Vec<Value> = sources
            .iter()
            .enumerate()
            .map(|(i, source)| json!({"_id": format!("doc-{i}"), "_source": source}))
            .collect();
        json!({
            "took": 4,
            "timed_out": false,
            "hits": {"total": {"value": total}, "hits": hits},
            "aggregations": {
                "trip_stats": {"buckets": [{"key": ["completed", "paid"], "doc_count": total}]},
                "polyline_coverage": {"doc_count": 0}
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_trips_resolves_today() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(trips_body(1, &[json!({"tripId": "t1"})]));
        let service = service(gateway.clone(), clock());

        let result = service
            .fetch_trips(FilterOptions {
                time_range: Some(TimeRangeToken::Today),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.total_trips, 1);
        assert_eq!(result.trips[0].trip_id.as_deref(), Some("t1"));
        assert_eq!(result.analytics.unwrap().completion_rate, 100.0);

        let calls = gateway.calls();
        assert_eq!(calls[0].index, "prod_trips");
        assert_eq!(calls[0].timeout, Duration::from_secs(30));
        assert_eq!(
            calls[0].body["query"]["bool"]["filter"][0],
            json!({"range": {"createdAt._seconds": {"gte": 1_718_409_600_i64, "lte": 1_718_495_999_i64}}})
        );
    }

    #[tokio::test]
    async fn test_invalid_options_fail_before_backend() {
        let gateway = Arc::new(StubGateway::new());
        let service = service(gateway.clone(), clock());

        let err = service
            .fetch_trips(FilterOptions {
                min_price: Some(500.0),
                max_price: Some(10.0),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service
            .fetch_trips(FilterOptions {
                time_range: Some(TimeRangeToken::Custom),
                custom_start: Some("2023-01-01".into()),
                custom_end: Some("2024-06-01".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RangeTooLarge { max_days: 365, .. }));

        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_and_expiry() {
        let gateway = Arc::new(StubGateway::with_responder(|_, _| {
            SearchResponse::from_body(trips_body(0, &[]))
        }));
        let clock = clock();
        let service = service(gateway.clone(), clock.clone());
        let options = FilterOptions {
            driver_id: Some("d1".into()),
            ..Default::default()
        };

        service.fetch_trips(options.clone()).await.unwrap();
        service.fetch_trips(options.clone()).await.unwrap();
        assert_eq!(gateway.call_count(), 1);

        clock.advance(chrono::Duration::milliseconds(300_000));
        service.fetch_trips(options).await.unwrap();
        assert_eq!(gateway.call_count(), 2);
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_error(Error::SearchTimeout { timeout_ms: 30_000 });
        let service = service(gateway, clock());

        let err = service.fetch_trips(FilterOptions::default()).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_get_trip_by_id_not_found() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(trips_body(0, &[]));
        let service = service(gateway, clock());

        let err = service.get_trip_by_id("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id, .. } if id == "missing"));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_recent_trips_window() {
        let gateway = Arc::new(StubGateway::with_responder(|_, _| {
            SearchResponse::from_body(trips_body(0, &[]))
        }));
        let service = service(gateway.clone(), clock());

        service
            .get_recent_trips(2, RecentUnit::parse_lenient("fortnights"), FilterOptions::default())
            .await
            .unwrap();
        service
            .get_recent_trips(1, RecentUnit::Weeks, FilterOptions::default())
            .await
            .unwrap();

        let calls = gateway.calls();
        let range = |i: usize| calls[i].body["query"]["bool"]["filter"][0]["range"]["createdAt._seconds"].clone();
        assert_eq!(range(0), json!({"gte": 1_718_438_400_i64, "lte": 1_718_445_600_i64}));
        assert_eq!(range(1), json!({"gte": 1_717_840_800_i64, "lte": 1_718_445_600_i64}));
    }

    #[tokio::test]
    async fn test_search_trips_rejects_blank_text() {
        let gateway = Arc::new(StubGateway::new());
        let service = service(gateway.clone(), clock());
        assert!(matches!(
            service.search_trips("  ", None).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_driver_analytics_uses_analytics_timeout() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(json!({
            "hits": {"total": {"value": 2}, "hits": []},
            "aggregations": {
                "total_trips": {"value": 2},
                "completed_trips": {"doc_count": 1},
                "cancelled_trips": {"doc_count": 1}
            }
        }));
        let service = service(gateway.clone(), clock());

        let result = service
            .get_driver_analytics("d1", &RangeSelection::default())
            .await
            .unwrap();
        assert_eq!(result.driver_id, "d1");
        assert_eq!(result.analytics.completion_rate, 50.0);
        assert_eq!(gateway.calls()[0].timeout, Duration::from_secs(60));
        assert_eq!(gateway.calls()[0].body["size"], json!(0));
    }

    #[tokio::test]
    async fn test_polyline_statistics_has_no_range_cap() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(json!({
            "hits": {"total": {"value": 0}, "hits": []},
            "aggregations": {"with_polyline": {"doc_count": 0}}
        }));
        let service = service(gateway.clone(), clock());

        let stats = service
            .get_polyline_statistics(&FilterOptions {
                time_range: Some(TimeRangeToken::Custom),
                custom_start: Some("2022-01-01".into()),
                custom_end: Some("2024-06-01".into()),
                trip_status: Some(TripStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(stats.overview.coverage_percentage, 0.0);
        assert_eq!(gateway.call_count(), 1);
    }

    #[tokio::test]
    async fn test_bulk_validation_keeps_order_and_isolates_failures() {
        let valid = "_p~iF~ps|U_ulLnnqC_mqNvxq`@_p~iF~ps|U";
        let gateway = Arc::new(StubGateway::with_responder(move |_, body| {
            let id = body["query"]["bool"]["filter"][0]["term"]["tripId.keyword"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            match id.as_str() {
                "t1" => SearchResponse::from_body(trips_body(
                    1,
                    &[json!({"tripId": "t1", "distanceMatrices": [{"polyline": valid}]})],
                )),
                "t2" => SearchResponse::from_body(trips_body(1, &[json!({"tripId": "t2"})])),
                "t3" => Err(Error::backend("shard failure")),
                _ => SearchResponse::from_body(trips_body(0, &[])),
            }
        }));
        let service = service(gateway, clock());

        let ids: Vec<String> = ["t1", "t2", "t3", "t4"].iter().map(|s| s.to_string()).collect();
        let report = service.bulk_validate_polylines(&ids).await.unwrap();

        assert_eq!(
            report
                .validations
                .iter()
                .map(|v| v.trip_id.as_str())
                .collect::<Vec<_>>(),
            vec!["t1", "t2", "t3", "t4"]
        );
        assert_eq!(
            report.summary,
            BulkValidationSummary {
                total_checked: 4,
                with_polyline: 1,
                valid: 1,
                invalid: 0,
                missing: 1,
                errors: 2,
            }
        );
        assert!(report.validations[0].is_valid);
        assert!(report.validations[2].error.as_deref().unwrap().contains("shard failure"));
    }

    #[tokio::test]
    async fn test_bulk_validation_two_ids() {
        let gateway = Arc::new(StubGateway::with_responder(|_, body| {
            match body["query"]["bool"]["filter"][0]["term"]["tripId.keyword"].as_str() {
                Some("t1") => SearchResponse::from_body(trips_body(
                    1,
                    &[json!({
                        "tripId": "t1",
                        "distanceMatrices": [{"polyline": "_p~iF~ps|U_ulLnnqC_mqNvxq`@_p~iF~ps|U"}]
                    })],
                )),
                _ => SearchResponse::from_body(trips_body(1, &[json!({"tripId": "t2"})])),
            }
        }));
        let service = service(gateway, clock());

        let report = service
            .bulk_validate_polylines(&["t1".to_string(), "t2".to_string()])
            .await
            .unwrap();
        assert_eq!(report.summary.total_checked, 2);
        assert_eq!(report.summary.with_polyline, 1);
        assert_eq!(report.summary.valid, 1);
        assert_eq!(report.summary.missing, 1);
        assert_eq!(report.validations[0].trip_id, "t1");
        assert_eq!(report.validations[1].trip_id, "t2");
    }

    #[tokio::test]
    async fn test_bulk_validation_bounds() {
        let service = service(Arc::new(StubGateway::new()), clock());
        assert!(service.bulk_validate_polylines(&[]).await.is_err());
        let too_many: Vec<String> = (0..101).map(|i| format!("t{i}")).collect();
        assert!(service.bulk_validate_polylines(&too_many).await.is_err());
    }
}
