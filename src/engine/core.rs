//! EngineHandle: the one shared connection to a fitting-engine build.
//!
//! The handle pairs the engine with the capability table read at creation
//! time. Every call is checked against that table and runs inside the panic
//! guard, so a missing symbol or a native fault never unwinds into callers.

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::backend::{EngineReturn, FittingEngine, NativeEngine};
use super::call::EngineCall;
use super::entry_points::{CapabilitySet, EntryPoint};
use super::guard::guard;

/// Where a context obtains its engine on first use.
#[derive(Clone)]
pub enum EngineSource {
    /// Load the native library named by the config.
    Native(EngineConfig),
    /// Use an engine built by the host (tests, stub tooling).
    Provided(Arc<dyn FittingEngine>),
}

impl fmt::Debug for EngineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineSource::Native(config) => f.debug_tuple("Native").field(&config.library_path).finish(),
            EngineSource::Provided(engine) => f.debug_tuple("Provided").field(&engine.describe()).finish(),
        }
    }
}

#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<dyn FittingEngine>,
    capabilities: CapabilitySet,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn FittingEngine>) -> Self {
        let capabilities = engine.capabilities();
        Self {
            engine,
            capabilities,
        }
    }

    /// Build a handle from a source. Loading a native library may fail.
    pub fn from_source(source: &EngineSource) -> Result<Self, EngineError> {
        match source {
            EngineSource::Native(config) => {
                let engine = guard("engine load", || NativeEngine::load(config))?;
                Ok(Self::new(Arc::new(engine)))
            }
            EngineSource::Provided(engine) => Ok(Self::new(Arc::clone(engine))),
        }
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    pub fn supports(&self, entry: EntryPoint) -> bool {
        self.capabilities.contains(entry)
    }

    pub fn describe(&self) -> String {
        self.engine.describe()
    }

    /// Run one engine call.
    ///
    /// # Errors
    /// - `Unsupported` when the build lacks the entry point (no call is made)
    /// - whatever the engine reports, with panics mapped to `Panicked`
    pub fn invoke(&self, call: EngineCall<'_>) -> Result<EngineReturn, EngineError> {
        let entry = call.entry_point();
        if !self.supports(entry) {
            return Err(EngineError::unsupported(entry.symbol()));
        }
        let engine = &self.engine;
        guard(entry.symbol(), move || engine.invoke(call))
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("engine", &self.engine.describe())
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}
