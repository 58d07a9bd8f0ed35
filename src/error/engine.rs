// Engine error types and constants

use crate::error::ErrorCode;
use flutter_rust_bridge::frb;
use log::error;
use std::fmt;

/// Engine error code constants exposed to Dart via FFI
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and Dart. The flutter_rust_bridge will automatically
/// generate corresponding Dart constants.
///
/// Error code range: 3001-3009
#[frb(unignore)]
pub struct EngineErrorCodes {}

#[frb]
impl EngineErrorCodes {
    /// Engine build does not expose the requested entry point
    pub const UNSUPPORTED: i32 = 3001;

    /// Caller-supplied array has the wrong length
    pub const INVALID_SHAPE: i32 = 3002;

    /// Engine call failed on the native side
    pub const FAULT: i32 = 3003;

    /// Neither extraction path recovered the output payload
    pub const EXTRACTION_FAILED: i32 = 3004;

    /// A panic was contained at the engine boundary
    pub const PANICKED: i32 = 3005;

    /// Native engine library could not be opened
    pub const LIBRARY_LOAD: i32 = 3006;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 3007;

    /// Context has no engine source to create a handle from
    pub const NOT_INITIALIZED: i32 = 3008;

    /// Dispatcher received a function name it does not know
    pub const UNKNOWN_FUNCTION: i32 = 3009;

    /// Get UNSUPPORTED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn unsupported() -> i32 {
        Self::UNSUPPORTED
    }

    /// Get INVALID_SHAPE error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn invalid_shape() -> i32 {
        Self::INVALID_SHAPE
    }

    /// Get FAULT error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn fault() -> i32 {
        Self::FAULT
    }

    /// Get EXTRACTION_FAILED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn extraction_failed() -> i32 {
        Self::EXTRACTION_FAILED
    }

    /// Get PANICKED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn panicked() -> i32 {
        Self::PANICKED
    }

    /// Get LIBRARY_LOAD error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn library_load() -> i32 {
        Self::LIBRARY_LOAD
    }

    /// Get LOCK_POISONED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn lock_poisoned() -> i32 {
        Self::LOCK_POISONED
    }

    /// Get NOT_INITIALIZED error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn not_initialized() -> i32 {
        Self::NOT_INITIALIZED
    }

    /// Get UNKNOWN_FUNCTION error code
    #[flutter_rust_bridge::frb(sync, getter)]
    pub fn unknown_function() -> i32 {
        Self::UNKNOWN_FUNCTION
    }
}

/// Log an engine error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_engine_error(err: &EngineError, context: &str) {
    error!(
        "Engine error in {}: code={}, component=FittingEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised at the boundary between application code and the fitting engine.
///
/// Only `InvalidShape` (caller error) and errors from configuration setters
/// ever reach the caller of a calculator; everything else is absorbed by the
/// facade, logged, and answered with a safe default.
///
/// Error code ranges: 3001-3009
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Engine build lacks the requested symbol
    Unsupported { symbol: String },

    /// Caller-supplied array length does not match the required size
    InvalidShape {
        argument: &'static str,
        expected: i64,
        actual: usize,
    },

    /// Native-side failure during an engine call
    Fault { symbol: String, reason: String },

    /// Result payload could not be recovered by either extraction path
    ExtractionFailed { reason: String },

    /// Panic contained at the engine boundary
    Panicked { op: String, message: String },

    /// Native library could not be opened
    LibraryLoad { path: String, reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Engine handle requested before any engine source was configured
    NotInitialized,

    /// Dispatcher received an unknown function name
    UnknownFunction { name: String },
}

impl EngineError {
    pub fn unsupported(symbol: impl Into<String>) -> Self {
        EngineError::Unsupported {
            symbol: symbol.into(),
        }
    }

    pub fn fault(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Fault {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// True when the engine build simply does not expose the entry point.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, EngineError::Unsupported { .. })
    }

    /// True for errors the caller must fix (malformed fixed-size arguments).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, EngineError::InvalidShape { .. })
    }
}

impl ErrorCode for EngineError {
    fn code(&self) -> i32 {
        match self {
            EngineError::Unsupported { .. } => EngineErrorCodes::UNSUPPORTED,
            EngineError::InvalidShape { .. } => EngineErrorCodes::INVALID_SHAPE,
            EngineError::Fault { .. } => EngineErrorCodes::FAULT,
            EngineError::ExtractionFailed { .. } => EngineErrorCodes::EXTRACTION_FAILED,
            EngineError::Panicked { .. } => EngineErrorCodes::PANICKED,
            EngineError::LibraryLoad { .. } => EngineErrorCodes::LIBRARY_LOAD,
            EngineError::LockPoisoned { .. } => EngineErrorCodes::LOCK_POISONED,
            EngineError::NotInitialized => EngineErrorCodes::NOT_INITIALIZED,
            EngineError::UnknownFunction { .. } => EngineErrorCodes::UNKNOWN_FUNCTION,
        }
    }

    fn message(&self) -> String {
        match self {
            EngineError::Unsupported { symbol } => {
                format!("Engine does not expose {}", symbol)
            }
            EngineError::InvalidShape {
                argument,
                expected,
                actual,
            } => {
                format!(
                    "{} array size must equal {} (got {})",
                    argument, expected, actual
                )
            }
            EngineError::Fault { symbol, reason } => {
                format!("{} failed: {}", symbol, reason)
            }
            EngineError::ExtractionFailed { reason } => {
                format!("Failed to recover output data: {}", reason)
            }
            EngineError::Panicked { op, message } => {
                format!("Panic in engine call {}: {}", op, message)
            }
            EngineError::LibraryLoad { path, reason } => {
                format!("Failed to load engine library {}: {}", path, reason)
            }
            EngineError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            EngineError::NotInitialized => {
                "Engine not initialized. Configure an engine source first.".to_string()
            }
            EngineError::UnknownFunction { name } => {
                format!("Unknown function: {}", name)
            }
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EngineError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for EngineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_codes() {
        assert_eq!(
            EngineError::unsupported("dllVersion").code(),
            EngineErrorCodes::UNSUPPORTED
        );
        assert_eq!(
            EngineError::InvalidShape {
                argument: "AC",
                expected: 9,
                actual: 8
            }
            .code(),
            EngineErrorCodes::INVALID_SHAPE
        );
        assert_eq!(
            EngineError::fault("getMPO_NL2", "boom").code(),
            EngineErrorCodes::FAULT
        );
        assert_eq!(
            EngineError::NotInitialized.code(),
            EngineErrorCodes::NOT_INITIALIZED
        );
        assert_eq!(
            EngineError::UnknownFunction {
                name: "nope".to_string()
            }
            .code(),
            EngineErrorCodes::UNKNOWN_FUNCTION
        );
    }

    #[test]
    fn test_invalid_shape_message_names_expected_size() {
        let err = EngineError::InvalidShape {
            argument: "centreFreq",
            expected: 6,
            actual: 5,
        };
        assert_eq!(err.message(), "centreFreq array size must equal 6 (got 5)");
        assert!(err.is_caller_error());
        assert!(!err.is_unsupported());
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::fault("GetMLE", "native fault");
        let display = format!("{}", err);
        assert!(display.contains("3003"));
        assert!(display.contains("GetMLE failed: native fault"));
    }

    #[test]
    fn test_error_code_getters() {
        assert_eq!(EngineErrorCodes::unsupported(), 3001);
        assert_eq!(EngineErrorCodes::invalid_shape(), 3002);
        assert_eq!(EngineErrorCodes::fault(), 3003);
        assert_eq!(EngineErrorCodes::extraction_failed(), 3004);
        assert_eq!(EngineErrorCodes::panicked(), 3005);
        assert_eq!(EngineErrorCodes::library_load(), 3006);
        assert_eq!(EngineErrorCodes::lock_poisoned(), 3007);
        assert_eq!(EngineErrorCodes::not_initialized(), 3008);
        assert_eq!(EngineErrorCodes::unknown_function(), 3009);
    }
}
