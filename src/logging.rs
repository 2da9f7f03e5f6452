//! Structured logging setup using the `tracing` crate.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global subscriber. Level defaults to `info`, overridable
/// through `RUST_LOG`. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
