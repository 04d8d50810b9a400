//! Encoded polyline algorithm format

use crate::error::{Error, Result};

/// Decimal places kept by the encoding
pub const PRECISION: u32 = 5;

const FACTOR: f64 = 100_000.0;

fn encode_value(mut value: i64, out: &mut String) {
    value = if value < 0 { !(value << 1) } else { value << 1 };
    while value >= 0x20 {
        out.push(char::from((((value & 0x1f) | 0x20) + 63) as u8));
        value >>= 5;
    }
    out.push(char::from((value + 63) as u8));
}

/// Encode `(lat, lng)` pairs at precision 5
pub fn encode(points: &[(f64, f64)]) -> String {
    let mut out = String::with_capacity(points.len() * 8);
    let (mut prev_lat, mut prev_lng) = (0_i64, 0_i64);

    for &(lat, lng) in points {
        let lat = (lat * FACTOR).round() as i64;
        let lng = (lng * FACTOR).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }
    out
}

fn decode_value(bytes: &mut impl Iterator<Item = (usize, u8)>) -> Result<Option<i64>> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let Some((index, byte)) = bytes.next() else {
            return if shift == 0 {
                Ok(None)
            } else {
                Err(Error::validation("polyline ends mid-value"))
            };
        };
        if !(63..=126).contains(&byte) {
            return Err(Error::validation(format!(
                "invalid polyline character at offset {index}"
            )));
        }
        if shift > 60 {
            return Err(Error::validation("polyline value overflows"));
        }
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Ok(Some(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    }))
}

/// Decode a precision-5 polyline into `(lat, lng)` pairs
pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>> {
    let mut bytes = encoded.bytes().enumerate();
    let mut points = Vec::new();
    let (mut lat, mut lng) = (0_i64, 0_i64);

    while let Some(dlat) = decode_value(&mut bytes)? {
        let dlng = decode_value(&mut bytes)?
            .ok_or_else(|| Error::validation("polyline has a latitude without a longitude"))?;
        lat += dlat;
        lng += dlng;
        points.push((lat as f64 / FACTOR, lng as f64 / FACTOR));
    }
    Ok(points)
}
