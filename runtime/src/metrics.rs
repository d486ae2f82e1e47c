//! Metrics for request orchestration and the store.
//!
//! Everything is recorded through the `metrics` facade. No exporter is
//! installed here; applications install whichever recorder they use and
//! call [`register_metrics`] once to attach descriptions.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use std::time::Duration;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Requests that passed `should_fetch` and were started
pub const REQUESTS_STARTED: &str = "api_request_started_total";
/// Requests refused by `should_fetch`
pub const REQUESTS_SKIPPED: &str = "api_request_skipped_total";
/// Requests whose async function failed
pub const REQUESTS_FAILED: &str = "api_request_failed_total";
/// Wall time of the async request function
pub const REQUEST_DURATION: &str = "api_request_duration_seconds";
/// Handlers that panicked and were discarded
pub const HANDLER_PANICS: &str = "api_request_handler_panics_total";
/// Actions reduced by a store
pub const STORE_ACTIONS: &str = "store_actions_total";
/// Effects currently running in a store
pub const STORE_PENDING_EFFECTS: &str = "store_pending_effects";

/// Register all metric descriptions.
pub fn register_metrics() {
    // Request orchestration
    describe_counter!(
        REQUESTS_STARTED,
        "Total number of API requests that were started"
    );
    describe_counter!(
        REQUESTS_SKIPPED,
        "Total number of API requests skipped by should_fetch"
    );
    describe_counter!(
        REQUESTS_FAILED,
        "Total number of API requests that failed"
    );
    describe_histogram!(
        REQUEST_DURATION,
        "Time taken by the async request function"
    );
    describe_counter!(
        HANDLER_PANICS,
        "Total number of lifecycle handlers that panicked"
    );

    // Store
    describe_counter!(STORE_ACTIONS, "Total number of actions reduced by stores");
    describe_gauge!(
        STORE_PENDING_EFFECTS,
        "Number of effects currently in flight"
    );
}

/// Request orchestration metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record a started request.
    pub fn record_start() {
        counter!(REQUESTS_STARTED).increment(1);
    }

    /// Record a request refused by `should_fetch`.
    pub fn record_skip() {
        counter!(REQUESTS_SKIPPED).increment(1);
    }

    /// Record how long the request function ran.
    pub fn record_finish(duration: Duration, failed: bool) {
        histogram!(REQUEST_DURATION).record(duration.as_secs_f64());
        if failed {
            counter!(REQUESTS_FAILED).increment(1);
        }
    }

    /// Record a handler panic.
    pub fn record_handler_panic(handler: &'static str) {
        counter!(HANDLER_PANICS, "handler" => handler).increment(1);
    }
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an action reduced by a store.
    pub fn record_action() {
        counter!(STORE_ACTIONS).increment(1);
    }

    /// Record the number of in-flight effects.
    #[allow(clippy::cast_precision_loss)] // effect counts stay far below 2^52
    pub fn record_pending(pending: usize) {
        gauge!(STORE_PENDING_EFFECTS).set(pending as f64);
    }
}
