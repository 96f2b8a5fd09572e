//! Process-wide tracing setup shared by the PVZ binaries.

/// Initialize JSON tracing for the process.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber construction and filter defaults.
pub mod tracing;
