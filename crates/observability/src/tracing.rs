//! Tracing/logging initialization.
//!
//! The engine is a library, so output stays in compact text form here;
//! embedding services can install their own layered/JSON subscriber instead.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(true)
        .try_init();
}

/// Initialize tracing for tests: warnings and above only, no timestamps.
///
/// Integrity-fault paths log at warn level; tests that exercise them can call
/// this to surface the output under `cargo test -- --nocapture`.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .without_time()
        .compact()
        .try_init();
}
