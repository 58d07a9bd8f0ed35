//! Result extraction and normalisation.
//!
//! Engine builds hand the primary output back either through a named
//! accessor or only as a raw `output1` field. [`extract`] tries both in that
//! order and settles for the caller's fallback when neither works.
//! [`normalize`] is the one step that turns any [`EngineReturn`] into a
//! [`CalculationResult`].

use crate::diagnostics::DiagnosticSink;
use crate::engine::guard::guard;
use crate::engine::{EngineReturn, OutputHandle};
use crate::types::CalculationResult;

/// Recover the primary output of a result handle.
///
/// Never fails: a broken accessor logs a warning and falls through to the
/// raw field, a broken raw field logs an error and yields `fallback`.
pub fn extract(
    handle: &dyn OutputHandle,
    fallback: &[f64],
    sink: &DiagnosticSink,
    op: &str,
) -> Vec<f64> {
    let primary = match guard("OutputResult.getOutput1", || handle.output1()) {
        Ok(values) => return values,
        Err(err) => err,
    };
    sink.warn_with(
        format!("{}: output accessor unavailable, reading output1 field", op),
        &primary,
    );

    match guard("OutputResult.output1", || handle.raw_output1()) {
        Ok(values) => values,
        Err(err) => {
            sink.error(format!("{}: result extraction failed", op), &err);
            fallback.to_vec()
        }
    }
}

/// Turn an engine return into a tagged result.
///
/// `written` is the buffer the engine wrote into; unit returns report it
/// as-is and handle returns use it as the extraction fallback.
pub fn normalize(
    ret: EngineReturn,
    written: &[f64],
    sink: &DiagnosticSink,
    op: &str,
) -> CalculationResult {
    match ret {
        EngineReturn::Scalar(value) => CalculationResult::Scalar(value),
        EngineReturn::Unit => CalculationResult::Vector(written.to_vec()),
        EngineReturn::Handle(handle) => {
            CalculationResult::Vector(extract(handle.as_ref(), written, sink, op))
        }
    }
}

/// Normalise a return that must be a vector, falling back to `written`.
pub fn vector(ret: EngineReturn, written: &[f64], sink: &DiagnosticSink, op: &str) -> Vec<f64> {
    match normalize(ret, written, sink, op) {
        CalculationResult::Vector(values) => values,
        other => {
            sink.error(
                format!("{} failed", op),
                format!("expected a vector result, engine returned {:?}", other),
            );
            written.to_vec()
        }
    }
}

/// Normalise a return that must be a scalar, falling back to `0.0`.
pub fn scalar(ret: EngineReturn, sink: &DiagnosticSink, op: &str) -> f64 {
    match normalize(ret, &[], sink, op) {
        CalculationResult::Scalar(value) => value,
        other => {
            sink.error(
                format!("{} failed", op),
                format!("expected a scalar result, engine returned {:?}", other),
            );
            0.0
        }
    }
}
