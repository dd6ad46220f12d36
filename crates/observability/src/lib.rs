//! Shared tracing/logging setup for Vorfall's database-facing crates.

pub mod tracing;

/// Initialize process-wide observability. Safe to call multiple times.
pub fn init() {
    tracing::init();
}
