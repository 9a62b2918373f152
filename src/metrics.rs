//! Harvest counters, recorded through the `metrics` facade.
//!
//! Nothing here installs an exporter; without a recorder every call is a no-op.

use metrics::{counter, histogram};

pub const REQUESTS: &str = "nyc_shows_requests_total";
pub const FETCH_FAILURES: &str = "nyc_shows_fetch_failures_total";
pub const SKIPS: &str = "nyc_shows_skips_total";
pub const EVENTS: &str = "nyc_shows_events_total";
pub const PAGE_BYTES: &str = "nyc_shows_page_bytes";
pub const RUN_DURATION: &str = "nyc_shows_run_duration_seconds";

pub struct HarvestMetrics;

impl HarvestMetrics {
    pub fn record_request(source: &str) {
        counter!(REQUESTS, "source" => source.to_string()).increment(1);
    }

    pub fn record_page(source: &str, bytes: usize) {
        histogram!(PAGE_BYTES, "source" => source.to_string()).record(bytes as f64);
    }

    pub fn record_fetch_failure(source: &str) {
        counter!(FETCH_FAILURES, "source" => source.to_string()).increment(1);
    }

    pub fn record_skip(source: &str) {
        counter!(SKIPS, "source" => source.to_string()).increment(1);
    }

    pub fn record_events(source: &str, added: usize) {
        counter!(EVENTS, "source" => source.to_string()).increment(added as u64);
    }

    pub fn record_run(duration_secs: f64, incomplete: bool) {
        let outcome = if incomplete { "incomplete" } else { "complete" };
        histogram!(RUN_DURATION, "outcome" => outcome).record(duration_secs);
    }
}
