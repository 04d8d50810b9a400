//! Filter options accepted by the trip search entry points

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::error::{Error, Result};
use crate::time_window::TimeRangeToken;

/// Largest page a single search may request
pub const MAX_PAGE_SIZE: u32 = 10_000;

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{3,15}$").expect("static phone pattern"));

/// Lifecycle state of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    /// Awaiting a driver
    Pending,
    /// Driver assigned
    Accepted,
    /// Driver en route
    Started,
    /// Rider on board
    Ongoing,
    /// Finished
    Completed,
    /// Cancelled before completion
    Cancelled,
}

impl TripStatus {
    /// Value as stored in the index
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Started => "started",
            Self::Ongoing => "ongoing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Settlement state of a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Not yet settled
    Pending,
    /// Settled
    Paid,
    /// Charge failed
    Failed,
    /// Returned to the rider
    Refunded,
}

impl PaymentStatus {
    /// Value as stored in the index
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

/// Product the trip was booked under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideType {
    /// Pooled ride
    Shared,
    /// Exclusive ride
    Private,
    /// Booked ahead
    Scheduled,
    /// Hourly rental
    Rental,
}

impl RideType {
    /// Value as stored in the index
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Private => "private",
            Self::Scheduled => "scheduled",
            Self::Rental => "rental",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )*};
}

display_as_str!(TripStatus, PaymentStatus, RideType);

/// Sortable trip fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    /// Creation time
    #[default]
    CreatedAt,
    /// Trip start
    StartTime,
    /// Trip end
    EndTime,
    /// Scheduled pickup
    ScheduledTime,
    /// Fare
    Price,
    /// Trip identifier
    TripId,
    /// Lifecycle state
    TripStatus,
}

impl SortField {
    /// Index field the key sorts on
    pub fn index_field(self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt._seconds",
            Self::StartTime => "startTime._seconds",
            Self::EndTime => "endTime._seconds",
            Self::ScheduledTime => "scheduledTime._seconds",
            Self::Price => "price",
            Self::TripId => "tripId.keyword",
            Self::TripStatus => "tripStatus.keyword",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first
    Asc,
    /// Largest first
    #[default]
    Desc,
}

impl SortOrder {
    /// Value as sent to the backend
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Trip search filters.
///
/// Every field is optional; an absent field means "no filter". Absent fields are
/// skipped on serialization so the JSON form doubles as a canonical cache key.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Exact trip id
    pub trip_id: Option<String>,
    /// Exact ride id
    pub ride_id: Option<String>,
    /// Exact driver id
    pub driver_id: Option<String>,
    /// Exact rider id
    pub rider_id: Option<String>,
    /// Partial phone number, matched anywhere in any phone-bearing field
    pub rider_phone: Option<String>,

    /// Lifecycle state
    pub trip_status: Option<TripStatus>,
    /// Settlement state
    pub payment_status: Option<PaymentStatus>,
    /// Product
    pub ride_type: Option<RideType>,

    /// Inclusive lower bound on creation time (epoch seconds)
    pub start_time: Option<i64>,
    /// Inclusive upper bound on creation time (epoch seconds)
    pub end_time: Option<i64>,
    /// Symbolic range; when set it replaces `start_time`/`end_time`
    pub time_range: Option<TimeRangeToken>,
    /// Start of a `custom` range (ISO-8601)
    pub custom_start: Option<String>,
    /// End of a `custom` range (ISO-8601)
    pub custom_end: Option<String>,

    /// Inclusive fare floor
    pub min_price: Option<f64>,
    /// Inclusive fare ceiling
    pub max_price: Option<f64>,

    /// Hits to return; `0` asks for aggregations only
    pub size: Option<u32>,
    /// Sort key; creation time when absent
    pub sort_by: Option<SortField>,
    /// Sort direction; descending when absent
    pub sort_order: Option<SortOrder>,

    /// Attach the analytics aggregations; on when absent
    pub include_analytics: Option<bool>,
    /// `Some(true)`: only trips with route geometry; `Some(false)`: only trips without
    pub polyline_required: Option<bool>,
    /// Also require geometry to pass the structural length check
    pub validate_polyline: Option<bool>,
}

impl FilterOptions {
    /// Drop blank strings and strip phone punctuation so equivalent inputs compare equal
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Self {
            trip_id: clean(&self.trip_id),
            ride_id: clean(&self.ride_id),
            driver_id: clean(&self.driver_id),
            rider_id: clean(&self.rider_id),
            rider_phone: clean(&self.rider_phone).map(|phone| {
                phone
                    .chars()
                    .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
                    .collect()
            }),
            custom_start: clean(&self.custom_start),
            custom_end: clean(&self.custom_end),
            ..self.clone()
        }
    }

    /// Reject inputs that can never produce a meaningful query
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.size {
            if size > MAX_PAGE_SIZE {
                return Err(Error::validation(format!(
                    "size must be between 0 and {MAX_PAGE_SIZE}, got {size}"
                )));
            }
        }

        for (name, price) in [("minPrice", self.min_price), ("maxPrice", self.max_price)] {
            if let Some(price) = price {
                if !price.is_finite() || price < 0.0 {
                    return Err(Error::validation(format!(
                        "{name} must be a non-negative number"
                    )));
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(Error::validation(format!(
                    "minPrice ({min}) must not exceed maxPrice ({max})"
                )));
            }
        }

        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                return Err(Error::invalid_range(format!(
                    "startTime ({start}) is after endTime ({end})"
                )));
            }
        }

        if let Some(phone) = self.rider_phone.as_deref() {
            if !PHONE_PATTERN.is_match(phone) {
                return Err(Error::validation(format!(
                    "riderPhone '{phone}' must be 3 to 15 digits with an optional leading '+'"
                )));
            }
        }

        if self.time_range != Some(TimeRangeToken::Custom)
            && (self.custom_start.is_some() || self.custom_end.is_some())
        {
            return Err(Error::validation(
                "customStart/customEnd are only valid with timeRange 'custom'",
            ));
        }

        Ok(())
    }

    /// Canonical serialization used as the cache key
    pub fn cache_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Requested page size, falling back to `default`
    pub fn size_or(&self, default: u32) -> u32 {
        self.size.unwrap_or(default)
    }

    /// Effective sort key
    pub fn sort_field(&self) -> SortField {
        self.sort_by.unwrap_or_default()
    }

    /// Effective sort direction
    pub fn sort_direction(&self) -> SortOrder {
        self.sort_order.unwrap_or_default()
    }

    /// Aggregations are attached unless explicitly disabled
    pub fn wants_analytics(&self) -> bool {
        self.include_analytics.unwrap_or(true)
    }
}
