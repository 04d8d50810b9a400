//! Symbolic time-range resolution
//!
//! Turns dashboard tokens such as `today` or `last7d` into an inclusive
//! `[start, end]` pair of epoch seconds relative to an injected clock.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{Error, Result};

const SECONDS_PER_DAY: i64 = 86_400;

/// Symbolic time range selectable from the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRangeToken {
    /// Current calendar day (UTC)
    #[serde(rename = "today")]
    Today,
    /// Previous calendar day (UTC)
    #[serde(rename = "yesterday")]
    Yesterday,
    /// Last hour
    #[serde(rename = "last1h")]
    Last1h,
    /// Last 24 hours
    #[serde(rename = "last24h")]
    Last24h,
    /// Last 7 days
    #[serde(rename = "last7d")]
    Last7d,
    /// Last 30 days
    #[serde(rename = "last30d")]
    Last30d,
    /// Last 90 days
    #[serde(rename = "last90d")]
    Last90d,
    /// Caller-supplied bounds
    #[serde(rename = "custom")]
    Custom,
}

impl TimeRangeToken {
    /// Wire name of the token
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Yesterday => "yesterday",
            Self::Last1h => "last1h",
            Self::Last24h => "last24h",
            Self::Last7d => "last7d",
            Self::Last30d => "last30d",
            Self::Last90d => "last90d",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TimeRangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeRangeToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "today" => Ok(Self::Today),
            "yesterday" => Ok(Self::Yesterday),
            "last1h" => Ok(Self::Last1h),
            "last24h" => Ok(Self::Last24h),
            "last7d" => Ok(Self::Last7d),
            "last30d" => Ok(Self::Last30d),
            "last90d" => Ok(Self::Last90d),
            "custom" => Ok(Self::Custom),
            other => Err(Error::invalid_range(format!("unknown time range '{other}'"))),
        }
    }
}

/// Inclusive window in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive lower bound
    pub start: i64,
    /// Inclusive upper bound
    pub end: i64,
}

impl TimeWindow {
    /// Build a window, rejecting inverted bounds
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start > end {
            return Err(Error::invalid_range(format!(
                "start ({start}) is after end ({end})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Width of the window in seconds
    pub fn span_seconds(&self) -> i64 {
        self.end - self.start
    }
}

/// Resolve a token against `now`.
///
/// `max_custom_days` caps the width of `custom` windows; `None` disables the cap.
pub fn resolve_at(
    token: TimeRangeToken,
    custom_start: Option<&str>,
    custom_end: Option<&str>,
    now: DateTime<Utc>,
    max_custom_days: Option<i64>,
) -> Result<TimeWindow> {
    let trailing = |width: Duration| TimeWindow::new((now - width).timestamp(), now.timestamp());

    match token {
        TimeRangeToken::Last1h => trailing(Duration::hours(1)),
        TimeRangeToken::Last24h => trailing(Duration::hours(24)),
        TimeRangeToken::Last7d => trailing(Duration::days(7)),
        TimeRangeToken::Last30d => trailing(Duration::days(30)),
        TimeRangeToken::Last90d => trailing(Duration::days(90)),
        TimeRangeToken::Today => Ok(day_bounds(now.date_naive())),
        TimeRangeToken::Yesterday => {
            let yesterday = now.date_naive() - Duration::days(1);
            Ok(day_bounds(yesterday))
        }
        TimeRangeToken::Custom => {
            let (Some(start), Some(end)) = (
                custom_start.filter(|s| !s.trim().is_empty()),
                custom_end.filter(|s| !s.trim().is_empty()),
            ) else {
                return Err(Error::invalid_range(
                    "custom date range requires both start and end dates",
                ));
            };

            let window = TimeWindow::new(parse_instant(start)?, parse_instant(end)?)?;

            if let Some(max_days) = max_custom_days {
                if window.span_seconds() > max_days * SECONDS_PER_DAY {
                    let days = (window.span_seconds() + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
                    return Err(Error::RangeTooLarge { days, max_days });
                }
            }

            Ok(window)
        }
    }
}

fn day_bounds(day: NaiveDate) -> TimeWindow {
    let start = day.and_time(NaiveTime::MIN).and_utc().timestamp();
    TimeWindow {
        start,
        end: start + SECONDS_PER_DAY - 1,
    }
}

/// Parse an ISO-8601 instant into epoch seconds.
///
/// Accepts RFC 3339, a zone-less `YYYY-MM-DDTHH:MM[:SS]` (taken as UTC) and a bare date
/// (midnight UTC).
pub fn parse_instant(value: &str) -> Result<i64> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc().timestamp())
        .map_err(|_| Error::invalid_range(format!("'{value}' is not an ISO-8601 date")))
}

/// Resolves time-range tokens against an injected clock
#[derive(Clone)]
pub struct TimeWindowResolver {
    clock: Arc<dyn Clock>,
    max_custom_days: Option<i64>,
}

impl TimeWindowResolver {
    /// Resolver without a cap on custom windows
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            max_custom_days: None,
        }
    }

    /// Cap custom windows at `days`
    pub fn with_max_custom_days(mut self, days: i64) -> Self {
        self.max_custom_days = Some(days);
        self
    }

    /// Resolve a token relative to the clock's current time
    pub fn resolve(
        &self,
        token: TimeRangeToken,
        custom_start: Option<&str>,
        custom_end: Option<&str>,
    ) -> Result<TimeWindow> {
        resolve_at(
            token,
            custom_start,
            custom_end,
            self.clock.now(),
            self.max_custom_days,
        )
    }

    /// `[now - hours, now]`
    pub fn trailing_hours(&self, hours: i64) -> Result<TimeWindow> {
        if hours < 0 {
            return Err(Error::validation("hours back must not be negative"));
        }
        let now = self.clock.now();
        let start = Duration::try_hours(hours)
            .and_then(|back| now.checked_sub_signed(back))
            .ok_or_else(|| Error::validation(format!("hours back out of range: {hours}")))?;
        TimeWindow::new(start.timestamp(), now.timestamp())
    }

    /// Current clock reading
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
