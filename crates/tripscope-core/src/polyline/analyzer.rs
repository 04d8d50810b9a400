//! Polyline validation, coverage and generation

use std::fmt;

use super::codec::{decode, encode};
use super::geo::haversine_km;
use crate::models::{LocationSample, PolylineValidation, RouteSummary, TripDocument};
use crate::query::MIN_POLYLINE_LENGTH;

/// Samples with a coarser accuracy radius than this are treated as noise
pub const DEFAULT_ACCURACY_THRESHOLD: f64 = 500.0;

const ALPHABET: std::ops::RangeInclusive<u8> = 63..=126;

/// A structural problem with an encoded polyline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolylineIssue {
    /// Fewer characters than the minimum
    TooShort { length: usize },
    /// First character outside the encoding alphabet
    InvalidFirstCharacter(char),
    /// Characters outside the encoding alphabet
    InvalidCharacters { count: usize },
}

impl fmt::Display for PolylineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { length } => write!(
                f,
                "polyline too short: {length} characters, expected at least {MIN_POLYLINE_LENGTH}"
            ),
            Self::InvalidFirstCharacter(c) => {
                write!(f, "polyline starts with invalid character {c:?}")
            }
            Self::InvalidCharacters { count } => {
                write!(f, "polyline contains {count} characters outside the encoding alphabet")
            }
        }
    }
}

/// Check an encoded polyline; an empty list means it is valid
pub fn validate(polyline: &str) -> Vec<PolylineIssue> {
    let mut issues = Vec::new();

    let length = polyline.chars().count();
    if length < MIN_POLYLINE_LENGTH {
        issues.push(PolylineIssue::TooShort { length });
    }

    if let Some(first) = polyline.chars().next() {
        if !u8::try_from(first).is_ok_and(|b| ALPHABET.contains(&b)) {
            issues.push(PolylineIssue::InvalidFirstCharacter(first));
        }
    }

    let invalid = polyline
        .chars()
        .filter(|&c| !u8::try_from(c).is_ok_and(|b| ALPHABET.contains(&b)))
        .count();
    if invalid > 0 {
        issues.push(PolylineIssue::InvalidCharacters { count: invalid });
    }

    issues
}

/// Reason a structurally valid polyline still fails to decode, if any
pub fn decode_warning(polyline: &str) -> Option<String> {
    if polyline.is_empty() || !validate(polyline).is_empty() {
        return None;
    }
    decode(polyline)
        .err()
        .map(|e| format!("polyline cannot be decoded: {e}"))
}

/// Approximate coordinate count: every point ends two encoded values
pub fn estimated_points(polyline: &str) -> usize {
    polyline
        .bytes()
        .filter(|b| ALPHABET.contains(b) && b - 63 < 0x20)
        .count()
        / 2
}

/// Route facts attached to a normalized trip
pub fn route_summary(trip: &TripDocument) -> RouteSummary {
    match trip.route_polyline() {
        Some(polyline) => RouteSummary {
            has_polyline: true,
            polyline_length: polyline.len(),
            estimated_points: estimated_points(polyline),
        },
        None => RouteSummary::default(),
    }
}

/// Validation record for one trip
pub fn validate_trip(trip_id: &str, trip: &TripDocument) -> PolylineValidation {
    let Some(polyline) = trip.route_polyline() else {
        return PolylineValidation {
            trip_id: trip_id.to_string(),
            issues: vec!["no route polyline".to_string()],
            ..Default::default()
        };
    };

    let issues: Vec<String> = validate(polyline).iter().map(ToString::to_string).collect();
    PolylineValidation {
        trip_id: trip_id.to_string(),
        has_polyline: true,
        polyline_length: polyline.len(),
        estimated_points: estimated_points(polyline),
        is_valid: issues.is_empty(),
        issues,
        warnings: decode_warning(polyline).into_iter().collect(),
        error: None,
    }
}

/// Polyline and distance built from a driver's location pings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedRoute {
    /// Encoded track of the high-accuracy samples, in time order
    pub polyline: String,
    /// Sum of great-circle hops between consecutive high-accuracy samples
    pub distance_km: f64,
    /// Samples kept
    pub high_accuracy_count: usize,
    /// Samples dropped as noise
    pub low_accuracy_count: usize,
}

fn is_high_accuracy(sample: &LocationSample, threshold: f64) -> bool {
    sample.accuracy.is_some_and(|a| a <= threshold)
}

/// Build a route from samples whose accuracy is within `threshold`.
///
/// Samples without a reported accuracy count as low accuracy.
pub fn generate(samples: &[LocationSample], threshold: f64) -> GeneratedRoute {
    let (mut kept, dropped): (Vec<LocationSample>, Vec<LocationSample>) = samples
        .iter()
        .copied()
        .partition(|sample| is_high_accuracy(sample, threshold));
    kept.sort_by_key(|sample| sample.timestamp);

    let distance_km = kept
        .windows(2)
        .map(|pair| haversine_km(pair[0].lat, pair[0].lng, pair[1].lat, pair[1].lng))
        .sum();

    GeneratedRoute {
        polyline: encode_track(&kept),
        distance_km,
        high_accuracy_count: kept.len(),
        low_accuracy_count: dropped.len(),
    }
}

/// Encode every sample in time order, regardless of accuracy
pub fn encode_track(samples: &[LocationSample]) -> String {
    let mut ordered = samples.to_vec();
    ordered.sort_by_key(|sample| sample.timestamp);
    let points: Vec<(f64, f64)> = ordered.iter().map(|s| (s.lat, s.lng)).collect();
    encode(&points)
}
