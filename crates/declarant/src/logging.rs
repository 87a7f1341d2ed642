//! Tracing setup shared by binaries and integration tests.
//!
//! Bridges `log` records into `tracing` so the db/worker modules (which
//! use `log` macros) and the pipeline spans end up in the same subscriber.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber with an env-driven filter
/// (`RUST_LOG`, defaulting to `info`). Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let _ = tracing_log::LogTracer::init();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
