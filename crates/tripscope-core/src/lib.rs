//! # TripScope
//!
//! Trip and ride telemetry analytics over Elasticsearch.
//!
//! TripScope turns dashboard-level filter options into search queries, runs them
//! against the trip and ride-location indices and reduces the hits and aggregation
//! buckets into normalized analytics.
//!
//! ## Architecture
//!
//! - **Time windows**: symbolic ranges (`today`, `last7d`, `custom`, ...) resolved against an injected clock
//! - **Query building**: filter options to bool queries plus the analytics aggregation tree
//! - **Gateway**: the search backend seam, with an Elasticsearch HTTP implementation
//! - **Reduction**: hit projection, aggregation reduction and polyline analysis
//! - **Services**: the analytics entry points, with a TTL cache in front of trip search
//! - **API**: a discriminated `{success, data | error}` envelope for every entry point
//!
//! ## Quick Start
//!
//! ```bash
//! # Completed trips from the last week, with analytics
//! tripscope trips --status completed --range last7d
//!
//! # A driver's pings over the last six hours
//! tripscope locations driver-42 --last 6h
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregation;
pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod polyline;
pub mod projector;
pub mod query;
pub mod service;
pub mod telemetry;
pub mod time_window;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::api::{ApiResponse, AppState};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{ElasticsearchGateway, SearchGateway};
    pub use crate::models::*;
    pub use crate::service::{RideLocationService, TripAnalyticsService};
    pub use crate::time_window::{TimeRangeToken, TimeWindow};
}
