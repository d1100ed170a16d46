//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide tracing from `RUST_LOG` and `LOG_FORMAT`.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(tracing::LogFormat::from_env());
}

/// Tracing configuration (filters, output format).
pub mod tracing;
