//! Tracing setup shared by binaries and tests.

/// Initialize process-wide tracing with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{init_for_tests, LogFormat};
