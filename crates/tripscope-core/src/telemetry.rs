//! Self-monitoring metrics
//!
//! Recorded through the `metrics` facade; nothing is exported unless the embedding
//! process installs a recorder.

use std::time::Duration;

/// Record one backend round-trip
pub fn record_search(index: &str, outcome: &'static str, duration: Duration) {
    metrics::histogram!(
        "tripscope_search_duration_seconds",
        "index" => index.to_string(),
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());

    metrics::counter!(
        "tripscope_search_requests_total",
        "index" => index.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a cache lookup
pub fn record_cache_lookup(cache: &'static str, hit: bool) {
    if hit {
        metrics::counter!("tripscope_cache_hits_total", "cache" => cache).increment(1);
    } else {
        metrics::counter!("tripscope_cache_misses_total", "cache" => cache).increment(1);
    }
}

/// Record evictions made by a sweep
pub fn record_cache_evictions(cache: &'static str, evicted: usize) {
    if evicted > 0 {
        metrics::counter!("tripscope_cache_evictions_total", "cache" => cache)
            .increment(evicted as u64);
    }
}
