//! Trip document schema and its normalized projection

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use super::lenient;

/// Driver sub-document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverDocument {
    /// Identifier
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    /// Phone number
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: Option<String>,
    /// Average rating
    #[serde(default, deserialize_with = "lenient::number")]
    pub rating: Option<f64>,
    /// Vehicle details
    #[serde(default, deserialize_with = "lenient::optional")]
    pub vehicle: Option<VehicleDocument>,
    /// Vehicle category
    #[serde(default, deserialize_with = "lenient::string")]
    pub vehicle_type: Option<String>,
    /// Last known position
    #[serde(default, deserialize_with = "lenient::value")]
    pub current_location: Option<Value>,
}

/// Vehicle sub-document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleDocument {
    /// Registration number
    #[serde(default, deserialize_with = "lenient::string")]
    pub number: Option<String>,
}

/// Rider sub-document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderDocument {
    /// Identifier
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    /// Phone number
    #[serde(default, deserialize_with = "lenient::string")]
    pub phone: Option<String>,
    /// Rider category, stored as `type`
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub rider_type: Option<String>,
    /// Account holder for dependent riders
    #[serde(default, deserialize_with = "lenient::value")]
    pub parent_rider: Option<Value>,
}

/// Origin or destination sub-document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceDocument {
    /// Display name
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: Option<String>,
    /// Point coordinate
    #[serde(default, deserialize_with = "lenient::value")]
    pub coordinate: Option<Value>,
    /// Alternate coordinate field
    #[serde(default, deserialize_with = "lenient::value")]
    pub coordinates: Option<Value>,
    /// Abbreviated name
    #[serde(default, deserialize_with = "lenient::string")]
    pub short_name: Option<String>,
}

/// One routing leg; `polyline` carries the encoded route geometry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistanceMatrix {
    /// Encoded route geometry
    #[serde(default, deserialize_with = "lenient::string")]
    pub polyline: Option<String>,
    /// Leg distance as stored
    #[serde(default, deserialize_with = "lenient::value")]
    pub distance: Option<Value>,
    /// Leg duration as stored
    #[serde(default, deserialize_with = "lenient::value")]
    pub duration: Option<Value>,
}

/// A trip as stored in the trips index.
///
/// Fields the analytics never compute on are kept as raw JSON and passed through.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripDocument {
    /// Trip identifier
    #[serde(default, deserialize_with = "lenient::string")]
    pub trip_id: Option<String>,
    /// Ride the trip belongs to
    #[serde(default, deserialize_with = "lenient::string")]
    pub ride_id: Option<String>,
    /// Booking reference
    #[serde(default, deserialize_with = "lenient::string")]
    pub booking_id: Option<String>,

    /// Assigned driver
    #[serde(default, deserialize_with = "lenient::optional")]
    pub driver: Option<DriverDocument>,
    /// Driver phone number as denormalized on the trip
    #[serde(default, deserialize_with = "lenient::string")]
    pub driver_phone: Option<String>,
    /// Booking rider
    #[serde(default, deserialize_with = "lenient::optional")]
    pub rider: Option<RiderDocument>,
    /// Rider identifier
    #[serde(default, deserialize_with = "lenient::string")]
    pub rider_id: Option<String>,

    /// Pickup place
    #[serde(default, deserialize_with = "lenient::optional")]
    pub from: Option<PlaceDocument>,
    /// Drop-off place
    #[serde(default, deserialize_with = "lenient::optional")]
    pub to: Option<PlaceDocument>,
    /// Raw pickup point
    #[serde(default, deserialize_with = "lenient::value")]
    pub pick_up_point: Option<Value>,
    /// Raw drop-off point
    #[serde(default, deserialize_with = "lenient::value")]
    pub drop_off_point: Option<Value>,

    /// Lifecycle state
    #[serde(default, deserialize_with = "lenient::string")]
    pub trip_status: Option<String>,
    /// Dispatch task state
    #[serde(default, deserialize_with = "lenient::string")]
    pub task_status: Option<String>,
    /// Booking state
    #[serde(default, deserialize_with = "lenient::string")]
    pub booking_status: Option<String>,
    /// Product the trip was booked under
    #[serde(default, deserialize_with = "lenient::string")]
    pub ride_type: Option<String>,
    /// Trip type, stored as `type`
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub trip_type: Option<String>,
    /// Product sub-type
    #[serde(default, deserialize_with = "lenient::string")]
    pub sub_type: Option<String>,

    /// Fare charged
    #[serde(default, deserialize_with = "lenient::number")]
    pub price: Option<f64>,
    /// Fare computed at booking
    #[serde(default, deserialize_with = "lenient::number")]
    pub calculated_price: Option<f64>,
    /// Fare components
    #[serde(default, deserialize_with = "lenient::value")]
    pub price_break_up: Option<Value>,
    /// Settlement state
    #[serde(default, deserialize_with = "lenient::string")]
    pub payment_status: Option<String>,
    /// Payment method
    #[serde(default, deserialize_with = "lenient::string")]
    pub payment_type: Option<String>,

    /// Creation timestamp
    #[serde(default, deserialize_with = "lenient::value")]
    pub created_at: Option<Value>,
    /// When the trip started
    #[serde(default, deserialize_with = "lenient::value")]
    pub start_time: Option<Value>,
    /// When the trip ended
    #[serde(default, deserialize_with = "lenient::value")]
    pub end_time: Option<Value>,
    /// When the trip was scheduled
    #[serde(default, deserialize_with = "lenient::value")]
    pub scheduled_at: Option<Value>,
    /// Time the trip is scheduled for
    #[serde(default, deserialize_with = "lenient::value")]
    pub scheduled_time: Option<Value>,
    /// Pickup time
    #[serde(default, deserialize_with = "lenient::value")]
    pub pick_up_time: Option<Value>,

    /// Driver arrival flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub driver_arrived: Option<Value>,
    /// When the driver arrived
    #[serde(default, deserialize_with = "lenient::value")]
    pub driver_arrived_time: Option<Value>,
    /// Driver reached-destination flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub driver_reached: Option<Value>,
    /// When the driver reached the destination
    #[serde(default, deserialize_with = "lenient::value")]
    pub driver_reached_time: Option<Value>,

    /// Seats booked
    #[serde(default, deserialize_with = "lenient::value")]
    pub booked_seats: Option<Value>,
    /// Alternate spelling of `booked_seats`
    #[serde(default, deserialize_with = "lenient::value")]
    pub seats_booked: Option<Value>,
    /// Passengers on board
    #[serde(default, deserialize_with = "lenient::value")]
    pub passenger_count: Option<Value>,
    /// Trip distance as stored
    #[serde(default, deserialize_with = "lenient::value")]
    pub distance: Option<Value>,
    /// Distance computed by the routing service
    #[serde(default, deserialize_with = "lenient::value")]
    pub calculated_distance_in_km: Option<Value>,
    /// Pickup code
    #[serde(default, deserialize_with = "lenient::value")]
    pub otp: Option<Value>,

    /// Upstream spelling of the cancellation flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub cancled: Option<Value>,
    /// Cancellation flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub cancelled: Option<Value>,
    /// Why the trip was cancelled
    #[serde(default, deserialize_with = "lenient::string")]
    pub cancel_reason: Option<String>,
    /// Who cancelled
    #[serde(default, deserialize_with = "lenient::value")]
    pub canceled_by: Option<Value>,
    /// When the trip was cancelled
    #[serde(default, deserialize_with = "lenient::value")]
    pub canceled_time: Option<Value>,

    /// Last contact attempt
    #[serde(default, deserialize_with = "lenient::value")]
    pub last_contacted: Option<Value>,
    /// Who made the last contact
    #[serde(default, deserialize_with = "lenient::value")]
    pub last_contacted_by: Option<Value>,
    /// Display name of the last contact
    #[serde(default, deserialize_with = "lenient::value")]
    pub last_contacted_by_name: Option<Value>,

    /// Admin handling the trip
    #[serde(default, deserialize_with = "lenient::value")]
    pub assigned_admin: Option<Value>,
    /// Admin who completed the trip
    #[serde(default, deserialize_with = "lenient::value")]
    pub completed_by_admin: Option<Value>,
    /// Admin who cancelled the trip
    #[serde(default, deserialize_with = "lenient::value")]
    pub canceled_by_admin: Option<Value>,

    /// Recurring-trip flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub is_recurring_trip: Option<Value>,
    /// Booked by QR code
    #[serde(default, deserialize_with = "lenient::value")]
    pub is_qr_ride: Option<Value>,
    /// Booked on behalf of another rider
    #[serde(default, deserialize_with = "lenient::value")]
    pub booked_for_someone_else: Option<Value>,
    /// Surge pricing flag
    #[serde(default, deserialize_with = "lenient::value")]
    pub is_dynamic_pricing_applied: Option<Value>,

    /// Location metadata
    #[serde(default, deserialize_with = "lenient::value")]
    pub location_details: Option<Value>,
    /// Last known position
    #[serde(default, deserialize_with = "lenient::value")]
    pub current_location: Option<Value>,

    /// Routing legs
    #[serde(default, deserialize_with = "lenient::optional")]
    pub distance_matrices: Option<Vec<DistanceMatrix>>,
}

impl TripDocument {
    /// The trip's route geometry: the first non-empty encoded polyline.
    ///
    /// Empty legs are skipped, matching the any-leg semantics of the polyline
    /// query clauses.
    pub fn route_polyline(&self) -> Option<&str> {
        self.distance_matrices
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|m| m.polyline.as_deref())
            .find(|p| !p.is_empty())
    }
}

/// Driver block of a normalized trip
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    /// Identifier
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Average rating
    pub rating: Option<f64>,
    /// Vehicle block
    pub vehicle: VehicleSummary,
    /// Last known position
    pub current_location: Option<Value>,
}

/// Vehicle block of a normalized trip
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VehicleSummary {
    /// Registration number
    pub number: Option<String>,
    /// Vehicle category, serialized as `type`
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
}

/// Rider block of a normalized trip
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderSummary {
    /// Identifier
    pub id: Option<String>,
    /// Display name
    pub name: Option<String>,
    /// Phone number
    pub phone: Option<String>,
    /// Rider category, serialized as `type`
    #[serde(rename = "type")]
    pub rider_type: Option<String>,
    /// Account holder for dependent riders
    pub parent_rider: Option<Value>,
}

/// Origin or destination block of a normalized trip
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceSummary {
    /// Display name
    pub name: Option<String>,
    /// Point coordinate
    pub coordinate: Option<Value>,
    /// Abbreviated name
    pub short_name: Option<String>,
}

/// Route geometry facts attached to every normalized trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    /// Whether route geometry is present
    pub has_polyline: bool,
    /// Encoded length in characters
    pub polyline_length: usize,
    /// Approximate coordinate count
    pub estimated_points: usize,
}

/// Flat, fixed-shape view of a trip handed to callers
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrip {
    /// Trip identifier
    pub trip_id: Option<String>,
    /// Ride the trip belongs to
    pub ride_id: Option<String>,
    /// Booking reference
    pub booking_id: Option<String>,

    /// Driver block
    pub driver: DriverSummary,
    /// Rider block
    pub rider: RiderSummary,

    /// Pickup block
    pub from: PlaceSummary,
    /// Drop-off block
    pub to: PlaceSummary,
    /// Raw pickup point
    pub pick_up_point: Option<Value>,
    /// Raw drop-off point
    pub drop_off_point: Option<Value>,

    /// Lifecycle state
    pub trip_status: Option<String>,
    /// Dispatch task state
    pub task_status: Option<String>,
    /// Booking state
    pub booking_status: Option<String>,
    /// Product the trip was booked under
    pub ride_type: Option<String>,
    /// Trip type, serialized as `type`
    #[serde(rename = "type")]
    pub trip_type: Option<String>,
    /// Product sub-type
    pub sub_type: Option<String>,

    /// Fare charged
    pub price: Option<f64>,
    /// Fare computed at booking
    pub calculated_price: Option<f64>,
    /// Fare components
    pub price_break_up: Option<Value>,
    /// Settlement state
    pub payment_status: Option<String>,
    /// Payment method
    pub payment_type: Option<String>,

    /// Creation timestamp
    pub created_at: Option<Value>,
    /// When the trip started
    pub start_time: Option<Value>,
    /// When the trip ended
    pub end_time: Option<Value>,
    /// When the trip was scheduled
    pub scheduled_at: Option<Value>,
    /// Time the trip is scheduled for
    pub scheduled_time: Option<Value>,
    /// Pickup time
    pub pick_up_time: Option<Value>,

    /// Driver arrival flag
    pub driver_arrived: Option<Value>,
    /// When the driver arrived
    pub driver_arrived_time: Option<Value>,
    /// Driver reached-destination flag
    pub driver_reached: Option<Value>,
    /// When the driver reached the destination
    pub driver_reached_time: Option<Value>,

    /// Seats booked
    pub booked_seats: Option<Value>,
    /// Passengers on board
    pub passenger_count: Option<Value>,
    /// Trip distance as stored
    pub distance: Option<Value>,
    /// Distance computed by the routing service
    pub calculated_distance_in_km: Option<Value>,
    /// Pickup code
    pub otp: Option<Value>,

    /// Cancellation flag
    pub cancelled: Option<Value>,
    /// Why the trip was cancelled
    pub cancel_reason: Option<String>,
    /// Who cancelled
    pub canceled_by: Option<Value>,
    /// When the trip was cancelled
    pub canceled_time: Option<Value>,

    /// Last contact attempt
    pub last_contacted: Option<Value>,
    /// Who made the last contact
    pub last_contacted_by: Option<Value>,
    /// Display name of the last contact
    pub last_contacted_by_name: Option<Value>,

    /// Admin handling the trip
    pub assigned_admin: Option<Value>,
    /// Admin who completed the trip
    pub completed_by_admin: Option<Value>,
    /// Admin who cancelled the trip
    pub canceled_by_admin: Option<Value>,

    /// Recurring-trip flag
    pub is_recurring_trip: Option<Value>,
    /// Booked by QR code
    pub is_qr_ride: Option<Value>,
    /// Booked on behalf of another rider
    pub booked_for_someone_else: Option<Value>,
    /// Surge pricing flag
    pub is_dynamic_pricing_applied: Option<Value>,

    /// Location metadata
    pub location_details: Option<Value>,
    /// Last known position
    pub current_location: Option<Value>,

    /// Route geometry facts
    pub route: RouteSummary,
}
