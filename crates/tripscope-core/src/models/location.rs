//! Ride-location history documents

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::lenient;

/// One location ping as stored in the ride-location index
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideLocationDocument {
    /// Ride the trip belongs to
    #[serde(default, deserialize_with = "lenient::string")]
    pub ride_id: Option<String>,
    /// Reported position
    #[serde(default, deserialize_with = "lenient::value")]
    pub current_location: Option<Value>,
    /// Ping timestamp
    #[serde(default, deserialize_with = "lenient::value")]
    pub created_at: Option<Value>,
    /// Driver snapshot
    #[serde(default, deserialize_with = "lenient::value")]
    pub driver: Option<Value>,
    /// Driver online flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub online: Option<Value>,
    /// Seats booked
    #[serde(default, deserialize_with = "lenient::value")]
    pub booked_seats: Option<Value>,
    /// Delivery-in-progress flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub out_for_delivery: Option<Value>,
    /// Driver check-in flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub checked_in: Option<Value>,
    /// Auto-routing flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub auto_routing: Option<Value>,
    /// Route assigned to the driver
    #[serde(default, deserialize_with = "lenient::value")]
    pub assigned_route_id: Option<Value>,
    /// Redirect-route flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub redirect_route_started: Option<Value>,
}

/// Projected location ping returned to callers
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// Document id
    pub id: String,
    /// Ride the trip belongs to
    pub ride_id: Option<String>,
    /// Reported position
    pub current_location: Option<Value>,
    /// Ping timestamp
    pub created_at: Option<Value>,
    /// Driver snapshot
    pub driver: Option<Value>,
    /// Driver online flag
    pub online: Option<Value>,
    /// Seats booked
    pub booked_seats: Option<Value>,
    /// Delivery-in-progress flag
    pub out_for_delivery: Option<Value>,
    /// Driver check-in flag
    pub checked_in: Option<Value>,
    /// Auto-routing flag
    pub auto_routing: Option<Value>,
    /// Route assigned to the driver
    pub assigned_route_id: Option<Value>,
    /// Redirect-route flag
    pub redirect_route_started: Option<Value>,
}

/// A coordinate sample ready for polyline generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lng: f64,
    /// Reported accuracy radius; `None` when the device did not report one
    pub accuracy: Option<f64>,
    /// Epoch seconds
    pub timestamp: i64,
}

impl LocationSample {
    /// Extract a sample from a projected record.
    ///
    /// Returns `None` when latitude or longitude is missing, non-numeric or out of range.
    pub fn from_record(record: &LocationRecord) -> Option<Self> {
        let location = record.current_location.as_ref()?;
        let coordinate = |short: &str, long: &str| {
            location
                .get(short)
                .or_else(|| location.get(long))
                .and_then(lenient::as_number)
        };
        let lat = coordinate("lat", "latitude")?;
        let lng = coordinate("lng", "longitude")?;

        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }

        Some(Self {
            lat,
            lng,
            accuracy: location.get("accuracy").and_then(lenient::as_number),
            timestamp: record
                .created_at
                .as_ref()
                .and_then(lenient::epoch_seconds)
                .unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(location: Value) -> LocationRecord {
        LocationRecord {
            id: "h1".to_string(),
            current_location: Some(location),
            created_at: Some(json!({"_seconds": 1_718_445_600})),
            ..Default::default()
        }
    }

    #[test]
    fn test_sample_from_record() {
        let sample = LocationSample::from_record(&record(
            json!({"lat": 12.97, "lng": "77.59", "accuracy": 12}),
        ))
        .unwrap();
        assert_eq!(sample.lat, 12.97);
        assert_eq!(sample.lng, 77.59);
        assert_eq!(sample.accuracy, Some(12.0));
        assert_eq!(sample.timestamp, 1_718_445_600);
    }

    #[test]
    fn test_malformed_coordinates_skipped() {
        assert!(LocationSample::from_record(&record(json!({"lat": "north", "lng": 77.5}))).is_none());
        assert!(
            LocationSample::from_record(&record(json!({"latitude": 91, "longitude": 0})))
                .is_none()
        );
        assert!(LocationSample::from_record(&LocationRecord::default()).is_none());
    }
}
