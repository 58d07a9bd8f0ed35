use std::collections::HashMap;
use std::sync::Mutex;

use crate::engine::call::EngineCall;
use crate::engine::entry_points::{CapabilitySet, EntryPoint, ResultConvention};
use crate::error::EngineError;

use super::{EngineReturn, FittingEngine, OutputHandle};

#[derive(Debug, Clone)]
enum Script {
    Missing,
    Fail(String),
    Panic(String),
    Output {
        written: Option<Vec<f64>>,
        accessor: Option<Vec<f64>>,
        raw_field: Option<Vec<f64>>,
        integers: Option<Vec<i32>>,
    },
    Scalar(f64),
    Version(i32, i32),
}

/// Scriptable in-process engine used for deterministic tests and tooling.
///
/// Unscripted entry points echo their primary buffer back through a result
/// handle (handle convention), return `0.0` (scalar convention) or do
/// nothing (unit convention). Every call is recorded.
#[derive(Debug, Default)]
pub struct StubEngine {
    scripts: HashMap<EntryPoint, Script>,
    calls: Mutex<Vec<EntryPoint>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine writes `values` and both extraction paths return them.
    pub fn returning(self, entry: EntryPoint, values: Vec<f64>) -> Self {
        self.script(
            entry,
            Script::Output {
                written: Some(values.clone()),
                accessor: Some(values.clone()),
                raw_field: Some(values),
                integers: None,
            },
        )
    }

    /// Like [`returning`](Self::returning), also filling the integer side-channel.
    pub fn returning_classified(self, entry: EntryPoint, values: Vec<f64>, line_type: Vec<i32>) -> Self {
        self.script(
            entry,
            Script::Output {
                written: Some(values.clone()),
                accessor: Some(values.clone()),
                raw_field: Some(values),
                integers: Some(line_type),
            },
        )
    }

    /// Accessor missing; only the raw field carries `values`. Caller buffers are untouched.
    pub fn raw_field_only(self, entry: EntryPoint, values: Vec<f64>) -> Self {
        self.script(
            entry,
            Script::Output {
                written: None,
                accessor: None,
                raw_field: Some(values),
                integers: None,
            },
        )
    }

    /// Neither extraction path works and caller buffers are untouched.
    pub fn broken_output(self, entry: EntryPoint) -> Self {
        self.script(
            entry,
            Script::Output {
                written: None,
                accessor: None,
                raw_field: None,
                integers: None,
            },
        )
    }

    /// Engine writes `values` into the caller buffer but the result handle is unreadable.
    pub fn unreadable_after_writing(self, entry: EntryPoint, values: Vec<f64>) -> Self {
        self.script(
            entry,
            Script::Output {
                written: Some(values),
                accessor: None,
                raw_field: None,
                integers: None,
            },
        )
    }

    pub fn scalar(self, entry: EntryPoint, value: f64) -> Self {
        self.script(entry, Script::Scalar(value))
    }

    pub fn version(self, major: i32, minor: i32) -> Self {
        self.script(EntryPoint::DllVersion, Script::Version(major, minor))
    }

    pub fn failing(self, entry: EntryPoint, reason: impl Into<String>) -> Self {
        self.script(entry, Script::Fail(reason.into()))
    }

    /// Entry point absent from this build.
    pub fn missing(self, entry: EntryPoint) -> Self {
        self.script(entry, Script::Missing)
    }

    pub fn panicking(self, entry: EntryPoint, message: impl Into<String>) -> Self {
        self.script(entry, Script::Panic(message.into()))
    }

    fn script(mut self, entry: EntryPoint, script: Script) -> Self {
        self.scripts.insert(entry, script);
        self
    }

    /// Entry points invoked so far, in order.
    pub fn calls(&self) -> Vec<EntryPoint> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self, entry: EntryPoint) -> usize {
        self.calls().iter().filter(|called| **called == entry).count()
    }

    fn record(&self, entry: EntryPoint) -> Result<(), EngineError> {
        self.calls
            .lock()
            .map_err(|_| EngineError::LockPoisoned {
                component: "stub_calls".to_string(),
            })?
            .push(entry);
        Ok(())
    }
}

fn fill<T: Copy>(target: &mut [T], values: &[T]) {
    let len = target.len().min(values.len());
    target[..len].copy_from_slice(&values[..len]);
}

/// Result handle whose extraction paths are scripted.
struct ScriptedOutput {
    accessor: Option<Vec<f64>>,
    raw_field: Option<Vec<f64>>,
}

impl OutputHandle for ScriptedOutput {
    fn output1(&self) -> Result<Vec<f64>, EngineError> {
        self.accessor
            .clone()
            .ok_or_else(|| EngineError::unsupported("OutputResult_getOutput1"))
    }

    fn raw_output1(&self) -> Result<Vec<f64>, EngineError> {
        self.raw_field
            .clone()
            .ok_or_else(|| EngineError::ExtractionFailed {
                reason: "output1 field unavailable".to_string(),
            })
    }
}

impl FittingEngine for StubEngine {
    fn capabilities(&self) -> CapabilitySet {
        let mut caps = CapabilitySet::all();
        for (entry, script) in &self.scripts {
            if matches!(script, Script::Missing) {
                caps.remove(*entry);
            }
        }
        caps
    }

    fn invoke(&self, mut call: EngineCall<'_>) -> Result<EngineReturn, EngineError> {
        let entry = call.entry_point();
        self.record(entry)?;

        match self.scripts.get(&entry) {
            Some(Script::Missing) => Err(EngineError::unsupported(entry.symbol())),
            Some(Script::Fail(reason)) => Err(EngineError::fault(entry.symbol(), reason.clone())),
            Some(Script::Panic(message)) => panic!("{}", message),
            Some(Script::Scalar(value)) => Ok(EngineReturn::Scalar(*value)),
            Some(Script::Version(major, minor)) => {
                if let EngineCall::DllVersion { version } = call {
                    *version = [*major, *minor];
                }
                Ok(EngineReturn::Unit)
            }
            Some(Script::Output {
                written,
                accessor,
                raw_field,
                integers,
            }) => {
                if let (Some(values), Some(out)) = (written, call.primary_output()) {
                    fill(out, values);
                }
                if let (Some(values), Some(out)) = (integers, call.integer_output()) {
                    fill(out, values);
                }
                match entry.convention() {
                    ResultConvention::Handle => Ok(EngineReturn::Handle(Box::new(ScriptedOutput {
                        accessor: accessor.clone(),
                        raw_field: raw_field.clone(),
                    }))),
                    _ => Ok(EngineReturn::Unit),
                }
            }
            None => match entry.convention() {
                ResultConvention::Handle => {
                    let echoed = call.primary_output().map(|out| out.to_vec());
                    Ok(EngineReturn::Handle(Box::new(ScriptedOutput {
                        accessor: echoed.clone(),
                        raw_field: echoed,
                    })))
                }
                ResultConvention::Scalar => Ok(EngineReturn::Scalar(0.0)),
                ResultConvention::Unit => Ok(EngineReturn::Unit),
            },
        }
    }

    fn describe(&self) -> String {
        format!("stub engine ({} scripted entry points)", self.scripts.len())
    }
}
