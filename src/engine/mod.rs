//! Engine module: the boundary to the native fitting engine.
//!
//! `entry_points` catalogues the symbols, `call` types one invocation,
//! `backend` holds the engine builds and `core` the shared handle that
//! checks capabilities and contains panics.

pub mod backend;
pub mod call;
pub mod core;
pub mod entry_points;
pub mod guard;

pub use backend::{EngineReturn, FittingEngine, NativeEngine, OutputHandle, StubEngine};
pub use call::EngineCall;
pub use self::core::{EngineHandle, EngineSource};
pub use entry_points::{CapabilitySet, EntryPoint, ResultConvention};
