//! Backend abstractions for the fitting engine.
//!
//! A backend is one build of the engine: the native shared library, or the
//! scriptable stub used by tests and desktop tooling. Backends report which
//! entry points they expose and execute typed [`EngineCall`]s.

use crate::error::EngineError;

use super::call::EngineCall;
use super::entry_points::CapabilitySet;

/// Opaque result object returned by handle-convention entry points.
///
/// Engine builds differ in how the primary output is reachable: some export
/// an accessor, others only lay the data out in the result struct.
pub trait OutputHandle: Send {
    /// Primary path: the named output accessor.
    fn output1(&self) -> Result<Vec<f64>, EngineError>;

    /// Secondary path: direct read of the raw `output1` field.
    fn raw_output1(&self) -> Result<Vec<f64>, EngineError>;
}

/// What an engine call handed back, before normalisation.
pub enum EngineReturn {
    Unit,
    Scalar(f64),
    Handle(Box<dyn OutputHandle>),
}

impl std::fmt::Debug for EngineReturn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineReturn::Unit => f.write_str("Unit"),
            EngineReturn::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            EngineReturn::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

/// Trait implemented by fitting-engine builds.
///
/// Implementations must be callable from any thread; the bridge adds no
/// locking around calculation calls.
pub trait FittingEngine: Send + Sync {
    /// Entry points this build exposes.
    fn capabilities(&self) -> CapabilitySet;

    /// Execute one call, writing outputs into the call's buffers.
    fn invoke(&self, call: EngineCall<'_>) -> Result<EngineReturn, EngineError>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String {
        "fitting engine".to_string()
    }
}

mod native;
pub use native::NativeEngine;

mod stub;
pub use stub::StubEngine;
