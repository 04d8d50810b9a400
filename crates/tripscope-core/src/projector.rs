//! Raw hits to normalized records
//!
//! All defaulting and field fallbacks happen here, so downstream code never has
//! to guess at document shape.

use serde_json::Value;
use tracing::warn;

use crate::gateway::RawHit;
use crate::models::{
    DriverSummary, LocationRecord, NormalizedTrip, PlaceDocument, PlaceSummary,
    RideLocationDocument, RiderSummary, TripDocument, VehicleSummary,
};
use crate::polyline;

/// Decode a hit's source as a trip document.
///
/// A source that is not an object yields an empty document rather than an error.
pub fn trip_document(hit: &RawHit) -> TripDocument {
    serde_json::from_value(hit.source.clone()).unwrap_or_else(|e| {
        warn!(id = %hit.id, error = %e, "Unreadable trip document");
        TripDocument::default()
    })
}

fn place(place: Option<PlaceDocument>) -> PlaceSummary {
    let place = place.unwrap_or_default();
    PlaceSummary {
        name: place.name,
        coordinate: place.coordinate.or(place.coordinates),
        short_name: place.short_name,
    }
}

/// Flatten a trip document into its normalized record
pub fn normalize_trip(doc: TripDocument) -> NormalizedTrip {
    let route = polyline::route_summary(&doc);

    let driver = doc.driver.unwrap_or_default();
    let vehicle = driver.vehicle.unwrap_or_default();
    let rider = doc.rider.unwrap_or_default();

    NormalizedTrip {
        trip_id: doc.trip_id,
        ride_id: doc.ride_id,
        booking_id: doc.booking_id,

        driver: DriverSummary {
            id: driver.id,
            name: driver.name,
            phone: driver.phone.or(doc.driver_phone),
            rating: driver.rating,
            vehicle: VehicleSummary {
                number: vehicle.number,
                vehicle_type: driver.vehicle_type,
            },
            current_location: driver.current_location,
        },
        rider: RiderSummary {
            id: rider.id.or(doc.rider_id),
            name: rider.name,
            phone: rider.phone,
            rider_type: rider.rider_type,
            parent_rider: rider.parent_rider,
        },

        from: place(doc.from),
        to: place(doc.to),
        pick_up_point: doc.pick_up_point,
        drop_off_point: doc.drop_off_point,

        trip_status: doc.trip_status,
        task_status: doc.task_status,
        booking_status: doc.booking_status,
        ride_type: doc.ride_type,
        trip_type: doc.trip_type,
        sub_type: doc.sub_type,

        price: doc.price,
        calculated_price: doc.calculated_price,
        price_break_up: doc.price_break_up,
        payment_status: doc.payment_status,
        payment_type: doc.payment_type,

        created_at: doc.created_at,
        start_time: doc.start_time,
        end_time: doc.end_time,
        scheduled_at: doc.scheduled_at,
        scheduled_time: doc.scheduled_time,
        pick_up_time: doc.pick_up_time,

        driver_arrived: doc.driver_arrived,
        driver_arrived_time: doc.driver_arrived_time,
        driver_reached: doc.driver_reached,
        driver_reached_time: doc.driver_reached_time,

        booked_seats: doc.booked_seats.or(doc.seats_booked),
        passenger_count: doc.passenger_count,
        distance: doc.distance,
        calculated_distance_in_km: doc.calculated_distance_in_km,
        otp: doc.otp,

        // upstream writes the flag as `cancled`; the correct spelling is a fallback
        cancelled: doc.cancled.or(doc.cancelled),
        cancel_reason: doc.cancel_reason,
        canceled_by: doc.canceled_by,
        canceled_time: doc.canceled_time,

        last_contacted: doc.last_contacted,
        last_contacted_by: doc.last_contacted_by,
        last_contacted_by_name: doc.last_contacted_by_name,

        assigned_admin: doc.assigned_admin,
        completed_by_admin: doc.completed_by_admin,
        canceled_by_admin: doc.canceled_by_admin,

        is_recurring_trip: doc.is_recurring_trip,
        is_qr_ride: doc.is_qr_ride,
        booked_for_someone_else: doc.booked_for_someone_else,
        is_dynamic_pricing_applied: doc.is_dynamic_pricing_applied,

        location_details: doc.location_details,
        current_location: doc.current_location,

        route,
    }
}

/// Project a trip hit
pub fn project_trip(hit: &RawHit) -> NormalizedTrip {
    normalize_trip(trip_document(hit))
}

/// Project a ride-location hit
pub fn project_location(hit: &RawHit) -> LocationRecord {
    let doc: RideLocationDocument = match &hit.source {
        Value::Object(_) => serde_json::from_value(hit.source.clone()).unwrap_or_default(),
        _ => RideLocationDocument::default(),
    };

    LocationRecord {
        id: hit.id.clone(),
        ride_id: doc.ride_id,
        current_location: doc.current_location,
        created_at: doc.created_at,
        driver: doc.driver,
        online: doc.online,
        booked_seats: doc.booked_seats,
        out_for_delivery: doc.out_for_delivery,
        checked_in: doc.checked_in,
        auto_routing: doc.auto_routing,
        assigned_route_id: doc.assigned_route_id,
        redirect_route_started: doc.redirect_route_started,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn hit(source: Value) -> RawHit {
        RawHit {
            id: "doc-1".to_string(),
            source,
        }
    }

    #[test]
    fn test_fallback_fields() {
        let trip = project_trip(&hit(json!({
            "tripId": "t1",
            "driverPhone": "+911234567890",
            "riderId": "r9",
            "from": {"name": "Airport", "coordinates": [77.1, 12.9]},
            "seatsBooked": 2,
            "cancled": true,
            "cancelled": false
        })));

        assert_eq!(trip.driver.phone.as_deref(), Some("+911234567890"));
        assert_eq!(trip.rider.id.as_deref(), Some("r9"));
        assert_eq!(trip.from.coordinate, Some(json!([77.1, 12.9])));
        assert_eq!(trip.booked_seats, Some(json!(2)));
        assert_eq!(trip.cancelled, Some(json!(true)));
    }

    #[test]
    fn test_correct_spelling_used_when_misspelled_absent() {
        let trip = project_trip(&hit(json!({"cancelled": true})));
        assert_eq!(trip.cancelled, Some(json!(true)));
    }

    #[test]
    fn test_missing_nested_objects_never_panic() {
        let trip = project_trip(&hit(json!({"tripId": "t1"})));
        assert_eq!(trip.driver, DriverSummary::default());
        assert_eq!(trip.from, PlaceSummary::default());
        assert!(!trip.route.has_polyline);

        let serialized = serde_json::to_value(&trip).unwrap();
        assert_eq!(serialized["driver"], json!({"vehicle": {}}));
        assert_eq!(serialized["route"]["hasPolyline"], json!(false));
    }

    #[test]
    fn test_non_object_source() {
        let trip = project_trip(&hit(json!("garbage")));
        assert_eq!(trip.trip_id, None);
        assert_eq!(project_location(&hit(Value::Null)).id, "doc-1");
    }

    #[test]
    fn test_route_summary_attached() {
        let trip = project_trip(&hit(json!({
            "distanceMatrices": [{"polyline": "_p~iF~ps|U_ulLnnqC_mqNvxq`@"}]
        })));
        assert!(trip.route.has_polyline);
        assert_eq!(trip.route.polyline_length, 27);
        assert_eq!(trip.route.estimated_points, 3);
    }

    #[test]
    fn test_location_projection() {
        let record = project_location(&hit(json!({
            "rideId": "ride-1",
            "currentLocation": {"lat": 12.9, "lng": 77.6, "accuracy": 8},
            "online": true
        })));
        assert_eq!(record.id, "doc-1");
        assert_eq!(record.ride_id.as_deref(), Some("ride-1"));
        assert_eq!(record.online, Some(json!(true)));
    }
}
