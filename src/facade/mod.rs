//! Invocation facade: one typed operation per fitting calculation.
//!
//! Error policy by operation group:
//! - setters propagate every error, a mis-set patient parameter must be seen
//! - calculators absorb engine and extraction failures into a logged event
//!   and a safe default (the caller's buffer, zeros, or `0.0`)
//! - [`compression_ratio`](Nal2Facade::compression_ratio) rejects malformed
//!   arrays with [`EngineError::InvalidShape`] before touching the engine

use std::sync::Arc;

use crate::context::FittingContext;
use crate::diagnostics::DiagnosticSink;
use crate::engine::{EngineCall, EngineReturn, EntryPoint};
use crate::error::EngineError;
use crate::extraction;
use crate::probe::probe;
use crate::types::VersionInfo;

mod corrections;
mod curves;
mod gain;
mod settings;

/// Typed, failure-tolerant call surface over the shared engine handle.
#[derive(Clone)]
pub struct Nal2Facade {
    context: Arc<FittingContext>,
}

impl Nal2Facade {
    pub fn new(context: Arc<FittingContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<FittingContext> {
        &self.context
    }

    fn sink(&self) -> &DiagnosticSink {
        self.context.sink()
    }

    /// Engine version, `fallback_version` ({2, 0}) when the build has no query.
    pub fn dll_version(&self) -> VersionInfo {
        let fallback = self.context.config().engine.fallback_version;
        probe(self.sink(), EntryPoint::DllVersion, fallback, || {
            let mut version = [fallback.major, fallback.minor];
            self.invoke(EngineCall::DllVersion {
                version: &mut version,
            })?;
            Ok(VersionInfo::new(version[0], version[1]))
        })
    }

    fn invoke(&self, call: EngineCall<'_>) -> Result<EngineReturn, EngineError> {
        self.context.engine()?.invoke(call)
    }

    /// Run a setter; errors are the caller's to handle.
    fn apply(&self, call: EngineCall<'_>) -> Result<(), EngineError> {
        self.invoke(call).map(|_| ())
    }

    /// Log an absorbed failure. Missing symbols are warnings, the rest errors.
    fn absorb(&self, entry: EntryPoint, err: &EngineError) {
        if err.is_unsupported() {
            self.sink().warn_with(
                format!("{} not available in this engine build", entry.symbol()),
                err,
            );
        } else {
            self.sink().error(format!("{} failed", entry.symbol()), err);
        }
    }

    /// Finish a vector calculation: extract on success, `default` on failure.
    fn finish_vector(
        &self,
        entry: EntryPoint,
        outcome: Result<EngineReturn, EngineError>,
        written: &[f64],
        default: &[f64],
    ) -> Vec<f64> {
        match outcome {
            Ok(ret) => extraction::vector(ret, written, self.sink(), entry.symbol()),
            Err(err) => {
                self.absorb(entry, &err);
                default.to_vec()
            }
        }
    }

    /// Like [`finish_vector`](Self::finish_vector) for calls without a caller buffer.
    fn finish_zeroed(
        &self,
        entry: EntryPoint,
        outcome: Result<EngineReturn, EngineError>,
        written: &[f64],
    ) -> Vec<f64> {
        let zeros = vec![0.0; written.len()];
        self.finish_vector(entry, outcome, written, &zeros)
    }

    fn finish_scalar(&self, entry: EntryPoint, outcome: Result<EngineReturn, EngineError>) -> f64 {
        match outcome {
            Ok(ret) => extraction::scalar(ret, self.sink(), entry.symbol()),
            Err(err) => {
                self.absorb(entry, &err);
                0.0
            }
        }
    }
}

/// Reject an array whose length differs from the required size.
///
/// `expected` is signed because some sizes come from caller-supplied counts;
/// a negative count never matches.
fn check_shape(argument: &'static str, actual: usize, expected: i64) -> Result<(), EngineError> {
    if i64::try_from(actual) == Ok(expected) {
        Ok(())
    } else {
        Err(EngineError::InvalidShape {
            argument,
            expected,
            actual,
        })
    }
}

/// Render a sequence the way the debug log lines show it.
fn render<T: std::fmt::Debug>(values: &[T]) -> String {
    format!("{:?}", values)
}

#[cfg(test)]
mod tests;
