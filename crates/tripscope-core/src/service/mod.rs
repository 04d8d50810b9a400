//! Analytics entry points
//!
//! Each service validates its input before any backend call, runs exactly one
//! search per request (bulk validation: one per id) and shapes the result.

mod locations;
mod trips;

pub use locations::{LocationHistory, LocationOptions, RideLocationService};
pub use trips::{RecentUnit, TripAnalyticsService, TripSearchResult};

use serde::Deserialize;

use crate::error::Result;
use crate::time_window::{TimeRangeToken, TimeWindow, TimeWindowResolver};

/// A time window given either symbolically or as explicit epoch-second bounds
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSelection {
    /// Symbolic range
    pub time_range: Option<TimeRangeToken>,
    /// Start of a `custom` range
    pub custom_start: Option<String>,
    /// End of a `custom` range
    pub custom_end: Option<String>,
    /// Explicit lower bound (epoch seconds)
    pub start_time: Option<i64>,
    /// Explicit upper bound (epoch seconds)
    pub end_time: Option<i64>,
}

impl RangeSelection {
    /// Resolve to a concrete window; `None` when no bound was given.
    ///
    /// A token takes precedence over explicit bounds. A single explicit bound is
    /// completed with the epoch or the resolver's current time.
    pub fn resolve(&self, resolver: &TimeWindowResolver) -> Result<Option<TimeWindow>> {
        if let Some(token) = self.time_range {
            return resolver
                .resolve(
                    token,
                    self.custom_start.as_deref(),
                    self.custom_end.as_deref(),
                )
                .map(Some);
        }

        match (self.start_time, self.end_time) {
            (None, None) => Ok(None),
            (start, end) => TimeWindow::new(
                start.unwrap_or(0),
                end.unwrap_or_else(|| resolver.now().timestamp()),
            )
            .map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::Error;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn resolver() -> TimeWindowResolver {
        TimeWindowResolver::new(Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(),
        )))
    }

    #[test]
    fn test_token_wins_over_bounds() {
        let selection = RangeSelection {
            time_range: Some(TimeRangeToken::Last1h),
            start_time: Some(1),
            ..Default::default()
        };
        let window = selection.resolve(&resolver()).unwrap().unwrap();
        assert_eq!(window.span_seconds(), 3600);
    }

    #[test]
    fn test_open_ended_bounds() {
        let selection = RangeSelection {
            start_time: Some(1_718_400_000),
            ..Default::default()
        };
        let window = selection.resolve(&resolver()).unwrap().unwrap();
        assert_eq!(window.end, 1_718_445_600);
        assert_eq!(RangeSelection::default().resolve(&resolver()).unwrap(), None);
    }

    #[test]
    fn test_inverted_bounds() {
        let selection = RangeSelection {
            start_time: Some(10),
            end_time: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            selection.resolve(&resolver()),
            Err(Error::InvalidRange(_))
        ));
    }
}
