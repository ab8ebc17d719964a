//! Tracing/logging setup shared by the binaries.

/// Initialize process-wide tracing with JSON output.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;
