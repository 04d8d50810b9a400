//! Data models for TripScope

pub mod analytics;
pub mod filter;
pub mod lenient;
pub mod location;
pub mod trip;

pub use analytics::*;
pub use filter::*;
pub use location::*;
pub use trip::*;
