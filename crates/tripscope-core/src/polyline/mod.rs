//! Route geometry: encoded polylines and great-circle distance

mod analyzer;
mod codec;
mod geo;

pub use analyzer::{
    decode_warning, encode_track, estimated_points, generate, route_summary, validate,
    validate_trip, GeneratedRoute, PolylineIssue, DEFAULT_ACCURACY_THRESHOLD,
};
pub use codec::{decode, encode, PRECISION};
pub use geo::{haversine_km, EARTH_RADIUS_KM};
