//! Tracing/logging initialization shared by every Vorfall crate that touches IO.

use tracing_subscriber::EnvFilter;

/// Initialize process-wide tracing for a Vorfall host process.
///
/// Filtered via `RUST_LOG` (falls back to `info`), emitted as JSON lines with
/// a system-clock timestamp. Safe to call more than once; later calls are
/// no-ops since the global subscriber can only be installed once.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(true)
        .try_init();
}
