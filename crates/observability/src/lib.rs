//! Tracing and logging setup shared by every binary.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use tracing::{LOG_FORMAT_VAR, LogFormat, ParseLogFormatError};

/// Initialize process-wide tracing.
///
/// The format comes from `OPSFORGE_LOG_FORMAT` (`json` unless set to
/// `pretty`). Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Initialize with an explicit output format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}
