//! Panic containment at the engine boundary.
//!
//! Nothing that happens inside an engine call, a result accessor, or a
//! registered diagnostic callback may unwind into application code.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::EngineError;

/// Run `f`, turning a panic into [`EngineError::Panicked`].
pub fn guard<T>(op: &str, f: impl FnOnce() -> Result<T, EngineError>) -> Result<T, EngineError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(EngineError::Panicked {
            op: op.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

/// Run `f`, returning `default` if it panics.
pub fn guard_with_default<T>(op: &str, default: T, f: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            log::error!("panic contained in {}: {}", op, panic_message(payload.as_ref()));
            default
        }
    }
}

pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
