//! Capability probing for entry points a build may not export.

use crate::diagnostics::DiagnosticSink;
use crate::engine::EntryPoint;
use crate::error::EngineError;

/// Attempt an optional entry point, substituting `default` on any failure.
///
/// An absent symbol is expected on some builds and logs a warning; any
/// other failure logs an error. Neither reaches the caller.
pub fn probe<T>(
    sink: &DiagnosticSink,
    entry: EntryPoint,
    default: T,
    attempt: impl FnOnce() -> Result<T, EngineError>,
) -> T {
    match attempt() {
        Ok(value) => value,
        Err(err) if err.is_unsupported() => {
            sink.warn_with(
                format!("{} not available in this engine build, using default", entry.symbol()),
                &err,
            );
            default
        }
        Err(err) => {
            sink.error(format!("{} failed", entry.symbol()), &err);
            default
        }
    }
}
