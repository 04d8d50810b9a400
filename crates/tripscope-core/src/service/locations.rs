//! Ride-location history

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{debug, info};

use crate::aggregation;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{QueryMeta, SearchGateway};
use crate::models::{LocationRecord, LocationSample, MAX_PAGE_SIZE};
use crate::polyline::{self, DEFAULT_ACCURACY_THRESHOLD};
use crate::projector;
use crate::query;
use crate::time_window::{parse_instant, TimeRangeToken, TimeWindow, TimeWindowResolver};

const DEFAULT_HOURS_BACK: i64 = 24;

/// Options for a location-history fetch
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationOptions {
    /// Pings to return
    pub size: Option<u32>,
    /// Lower bound (epoch seconds)
    pub start_time: Option<i64>,
    /// Upper bound (epoch seconds)
    pub end_time: Option<i64>,
    /// Defaults to `true`
    pub calculate_distance: Option<bool>,
}

impl LocationOptions {
    fn with_window(self, window: TimeWindow) -> Self {
        Self {
            start_time: Some(window.start),
            end_time: Some(window.end),
            ..self
        }
    }
}

/// A driver's pings plus the route derived from them
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationHistory {
    /// Driver queried
    pub driver_id: String,
    /// Total matching pings
    pub total_records: u64,
    /// Pings in this page
    pub records_returned: usize,
    /// Projected pings, newest first
    pub locations: Vec<LocationRecord>,
    /// Backend-computed distance over every ping
    pub total_distance_km: Option<f64>,
    /// Pings within the accuracy threshold
    pub high_accuracy_count: usize,
    /// Pings dropped as noise
    pub low_accuracy_count: usize,
    /// Great-circle distance over high-accuracy pings
    pub high_accuracy_distance_km: f64,
    /// Encoded track of high-accuracy pings
    pub high_accuracy_polyline: String,
    /// Every ping with usable coordinates, in time order
    pub polyline: String,
    /// Backend timing
    pub query: QueryMeta,
}

/// Location-history lookups for drivers
#[derive(Clone)]
pub struct RideLocationService {
    gateway: Arc<dyn SearchGateway>,
    resolver: TimeWindowResolver,
    index: String,
    default_size: u32,
    timeout: Duration,
    accuracy_threshold: f64,
}

impl RideLocationService {
    /// Build the service from configuration
    pub fn new(gateway: Arc<dyn SearchGateway>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self {
            gateway,
            resolver: TimeWindowResolver::new(clock),
            index: config.indices.ride_locations.clone(),
            default_size: config.query.location_default_size,
            timeout: config.query.default_timeout,
            accuracy_threshold: DEFAULT_ACCURACY_THRESHOLD,
        }
    }

    /// Pings for one driver, newest first, with the derived route
    pub async fn fetch_ride_location_history(
        &self,
        driver_id: &str,
        options: LocationOptions,
    ) -> Result<LocationHistory> {
        let driver_id = driver_id.trim();
        if driver_id.is_empty() {
            return Err(Error::validation("driver id must not be blank"));
        }
        let size = options.size.unwrap_or(self.default_size);
        if size > MAX_PAGE_SIZE {
            return Err(Error::validation(format!(
                "size must be between 0 and {MAX_PAGE_SIZE}, got {size}"
            )));
        }
        if let (Some(start), Some(end)) = (options.start_time, options.end_time) {
            TimeWindow::new(start, end)?;
        }
        let calculate_distance = options.calculate_distance.unwrap_or(true);

        let query = query::build_location_query(
            driver_id,
            size,
            options.start_time,
            options.end_time,
            calculate_distance,
        );
        debug!(index = %self.index, driver_id, size, "Fetching ride location history");

        let response = self
            .gateway
            .search(&self.index, &query, self.timeout)
            .await?;

        let locations: Vec<LocationRecord> =
            response.hits.iter().map(projector::project_location).collect();
        let samples: Vec<LocationSample> =
            locations.iter().filter_map(LocationSample::from_record).collect();
        let route = polyline::generate(&samples, self.accuracy_threshold);
        let total_distance_km = if calculate_distance {
            aggregation::distance_traveled_km(&response.aggregations)
        } else {
            None
        };

        info!(
            driver_id,
            total = response.total,
            returned = locations.len(),
            skipped = locations.len() - samples.len(),
            high_accuracy = route.high_accuracy_count,
            "Ride location history fetched"
        );

        Ok(LocationHistory {
            driver_id: driver_id.to_string(),
            total_records: response.total,
            records_returned: locations.len(),
            locations,
            total_distance_km,
            high_accuracy_count: route.high_accuracy_count,
            low_accuracy_count: route.low_accuracy_count,
            high_accuracy_distance_km: route.distance_km,
            high_accuracy_polyline: route.polyline,
            polyline: polyline::encode_track(&samples),
            query: response.meta(),
        })
    }

    /// Pings between two ISO-8601 instants
    pub async fn get_ride_location_history_by_time_range(
        &self,
        driver_id: &str,
        start: &str,
        end: &str,
        options: LocationOptions,
    ) -> Result<LocationHistory> {
        let window = TimeWindow::new(parse_instant(start)?, parse_instant(end)?)?;
        self.fetch_ride_location_history(driver_id, options.with_window(window))
            .await
    }

    /// Pings from the last `hours_back` hours (24 when omitted)
    pub async fn get_recent_ride_location_history(
        &self,
        driver_id: &str,
        hours_back: Option<i64>,
        options: LocationOptions,
    ) -> Result<LocationHistory> {
        let window = self
            .resolver
            .trailing_hours(hours_back.unwrap_or(DEFAULT_HOURS_BACK))?;
        self.fetch_ride_location_history(driver_id, options.with_window(window))
            .await
    }

    /// Dashboard lookup by range token.
    ///
    /// Only `last1h`, `last24h`, `last7d`, `last30d` and `custom` are offered here;
    /// anything else falls back to the last 24 hours. Custom windows are not capped.
    pub async fn search_ride_locations(
        &self,
        driver_id: &str,
        time_range: &str,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
        limit: Option<u32>,
    ) -> Result<LocationHistory> {
        let token = match time_range.parse::<TimeRangeToken>() {
            Ok(
                token @ (TimeRangeToken::Last1h
                | TimeRangeToken::Last24h
                | TimeRangeToken::Last7d
                | TimeRangeToken::Last30d
                | TimeRangeToken::Custom),
            ) => token,
            _ => TimeRangeToken::Last24h,
        };
        let window = self.resolver.resolve(token, custom_start, custom_end)?;

        let options = LocationOptions {
            size: limit,
            ..Default::default()
        };
        self.fetch_ride_location_history(driver_id, options.with_window(window))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gateway::testing::StubGateway;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    const NOW: i64 = 1_718_445_600;

    fn service(gateway: Arc<StubGateway>) -> RideLocationService {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(),
        ));
        RideLocationService::new(gateway, clock, &Config::default())
    }

    fn ping(id: &str, lat: Value, lng: Value, accuracy: Option<f64>, seconds: i64) -> Value {
        json!({
            "_id": id,
            "_source": {
                "rideId": "r1",
                "driver": {"id": "d1"},
                "currentLocation": {"lat": lat, "lng": lng, "accuracy": accuracy},
                "createdAt": {"_seconds": seconds, "_nanoseconds": 0}
            }
        })
    }

    fn body(total: u64, hits: Vec<Value>, distance: Option<f64>) -> Value {
        let mut body = json!({
            "took": 4,
            "timed_out": false,
            "hits": {"total": {"value": total, "relation": "eq"}, "hits": hits}
        });
        if let Some(distance) = distance {
            body["aggregations"] = json!({"distance_traveled": {"value": distance}});
        }
        body
    }

    fn range(calls: &[crate::gateway::testing::RecordedSearch]) -> Value {
        calls[0].body["query"]["bool"]["filter"][1]["range"]["createdAt._seconds"].clone()
    }

    #[tokio::test]
    async fn test_history_with_route() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(body(
            4,
            vec![
                ping("h3", json!(12.99), json!(77.5), Some(10.0), NOW - 60),
                ping("h2", json!(12.98), json!(77.5), Some(900.0), NOW - 120),
                ping("h1", json!(12.97), json!(77.5), Some(20.0), NOW - 180),
                ping("h0", json!("bad"), json!(77.5), Some(5.0), NOW - 240),
            ],
            Some(2.5),
        ));
        let service = service(gateway.clone());

        let history = service
            .fetch_ride_location_history("d1", LocationOptions::default())
            .await
            .unwrap();

        assert_eq!(history.total_records, 4);
        assert_eq!(history.records_returned, 4);
        assert_eq!(history.locations[0].id, "h3");
        assert_eq!(history.total_distance_km, Some(2.5));
        assert_eq!(history.high_accuracy_count, 2);
        assert_eq!(history.low_accuracy_count, 1);
        assert!((history.high_accuracy_distance_km - 2.2239).abs() < 0.01);
        assert_eq!(
            polyline::decode(&history.polyline).unwrap().len(),
            3,
            "malformed ping is skipped"
        );
        assert_eq!(polyline::decode(&history.high_accuracy_polyline).unwrap().len(), 2);

        let calls = gateway.calls();
        assert_eq!(calls[0].index, "prod_ride_location_history");
        assert_eq!(calls[0].body["size"], 500);
        assert!(calls[0].body["aggs"]["distance_traveled"].is_object());
    }

    #[tokio::test]
    async fn test_distance_can_be_disabled() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(body(0, vec![], None));
        let service = service(gateway.clone());

        let history = service
            .fetch_ride_location_history(
                "d1",
                LocationOptions {
                    calculate_distance: Some(false),
                    size: Some(20),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(history.total_distance_km, None);
        assert_eq!(history.polyline, "");
        let calls = gateway.calls();
        assert_eq!(calls[0].body["size"], 20);
        assert!(calls[0].body.get("aggs").is_none());
    }

    #[tokio::test]
    async fn test_input_checked_before_backend() {
        let gateway = Arc::new(StubGateway::new());
        let service = service(gateway.clone());

        let blank = service
            .fetch_ride_location_history("  ", LocationOptions::default())
            .await;
        assert!(matches!(blank, Err(Error::Validation(_))));

        let inverted = service
            .fetch_ride_location_history(
                "d1",
                LocationOptions {
                    start_time: Some(20),
                    end_time: Some(10),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(inverted, Err(Error::InvalidRange(_))));

        let oversized = service
            .fetch_ride_location_history(
                "d1",
                LocationOptions {
                    size: Some(MAX_PAGE_SIZE + 1),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(oversized, Err(Error::Validation(_))));

        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_recent_defaults_to_24_hours() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(body(0, vec![], None));
        let service = service(gateway.clone());

        service
            .get_recent_ride_location_history("d1", None, LocationOptions::default())
            .await
            .unwrap();
        assert_eq!(
            range(&gateway.calls()),
            json!({"gte": NOW - 86_400, "lte": NOW})
        );
    }

    #[tokio::test]
    async fn test_recent_rejects_unrepresentable_lookback() {
        let gateway = Arc::new(StubGateway::new());
        let service = service(gateway.clone());

        let result = service
            .get_recent_ride_location_history(
                "d1",
                Some(10_000_000_000_000),
                LocationOptions::default(),
            )
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_by_time_range() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(body(0, vec![], None));
        let service = service(gateway.clone());

        service
            .get_ride_location_history_by_time_range(
                "d1",
                "2024-06-01T00:00:00Z",
                "2024-06-02T00:00:00Z",
                LocationOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            range(&gateway.calls()),
            json!({"gte": 1_717_200_000, "lte": 1_717_286_400})
        );
    }

    #[tokio::test]
    async fn test_search_unknown_token_falls_back_to_last24h() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(body(0, vec![], None));
        gateway.push_body(body(0, vec![], None));
        let service = service(gateway.clone());

        service
            .search_ride_locations("d1", "fortnight", None, None, Some(10))
            .await
            .unwrap();
        service
            .search_ride_locations("d1", "yesterday", None, None, None)
            .await
            .unwrap();

        let calls = gateway.calls();
        for call in &calls {
            assert_eq!(
                call.body["query"]["bool"]["filter"][1]["range"]["createdAt._seconds"],
                json!({"gte": NOW - 86_400, "lte": NOW})
            );
        }
        assert_eq!(calls[0].body["size"], 10);
    }

    #[tokio::test]
    async fn test_search_custom_range_is_not_capped() {
        let gateway = Arc::new(StubGateway::new());
        gateway.push_body(body(0, vec![], None));
        let service = service(gateway.clone());

        service
            .search_ride_locations(
                "d1",
                "custom",
                Some("2022-01-01"),
                Some("2024-06-01"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(gateway.call_count(), 1);

        let missing_end = service
            .search_ride_locations("d1", "custom", Some("2022-01-01"), None, None)
            .await;
        assert!(matches!(missing_end, Err(Error::InvalidRange(_))));
    }
}
