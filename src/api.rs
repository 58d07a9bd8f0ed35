// Public API for flutter_rust_bridge integration
// This module provides FFI functions for Flutter to reach the NAL-NL2 fitting engine

#![allow(dead_code)] // FFI functions are called from Dart, not detected by Rust analyzer

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use flutter_rust_bridge::DartFnFuture;
use once_cell::sync::Lazy;

use crate::config::BridgeConfig;
use crate::context::FittingContext;
use crate::diagnostics::{DiagnosticsSnapshot, LogLevel};
use crate::dispatch::Dispatcher;
use crate::engine::EntryPoint;
use crate::error::EngineError;
use crate::facade::Nal2Facade;
use crate::types::{
    CompressionRatioRequest, CrossOverFrequencies, GainAtRequest, GainRequest, SiiRequest,
    VersionInfo,
};

// Re-export error code constants for FFI exposure
pub use crate::error::EngineErrorCodes;

/// Engine availability summary for the settings screen
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EngineStatus {
    /// Whether the engine handle has been created
    pub ready: bool,
    /// Engine build description
    pub description: String,
    /// Entry points this build exposes
    pub exposed: Vec<String>,
    /// Entry points this build lacks
    pub missing: Vec<String>,
}

/// Global FittingContext instance
///
/// One engine connection per process. The native library is loaded on the
/// first call that needs it, not when the context is created.
static FITTING_CONTEXT: Lazy<Arc<FittingContext>> =
    Lazy::new(|| Arc::new(FittingContext::new(BridgeConfig::load_platform())));

/// Dispatcher over the global facade; owns the fitting session
static DISPATCHER: Lazy<Arc<Dispatcher>> =
    Lazy::new(|| Arc::new(Dispatcher::new(Nal2Facade::new(Arc::clone(&FITTING_CONTEXT)))));

/// Global facade, for Rust-side hosts (HTTP server, CLI)
#[flutter_rust_bridge::frb(ignore)]
pub fn facade() -> &'static Nal2Facade {
    DISPATCHER.facade()
}

/// Global dispatcher, for Rust-side hosts
#[flutter_rust_bridge::frb(ignore)]
pub fn dispatcher() -> Arc<Dispatcher> {
    Arc::clone(&DISPATCHER)
}

/// Initialize logging for the host platform
///
/// Safe to call more than once.
#[flutter_rust_bridge::frb(sync)]
pub fn init_app() {
    crate::init_logging();
}

/// Get the version of the bridge crate
///
/// # Returns
///
/// * `String` - Version string
#[flutter_rust_bridge::frb(sync)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get the version reported by the fitting engine
///
/// Falls back to the configured version (2.0 by default) when the engine
/// cannot be reached or has no version query.
#[flutter_rust_bridge::frb(sync)]
pub fn get_dll_version() -> VersionInfo {
    facade().dll_version()
}

/// Describe which entry points the engine exposes
///
/// Loads the engine if it has not been loaded yet.
///
/// # Returns
/// * `Ok(EngineStatus)` - Capability summary
/// * `Err(EngineError)` - Engine library could not be loaded
#[flutter_rust_bridge::frb]
pub fn get_engine_status() -> Result<EngineStatus, EngineError> {
    let handle = FITTING_CONTEXT.engine()?;
    let capabilities = handle.capabilities();
    Ok(EngineStatus {
        ready: FITTING_CONTEXT.is_engine_ready(),
        description: handle.describe(),
        exposed: capabilities
            .exposed()
            .map(|entry| entry.symbol().to_string())
            .collect(),
        missing: capabilities
            .missing()
            .map(|entry| entry.symbol().to_string())
            .collect(),
    })
}

/// Execute one JSON-encoded engine request
///
/// # Arguments
/// * `request_json` - `{sequence_num, function, input_parameters}`
///
/// # Returns
/// JSON `{sequence_num, function, return, output_parameters}`. Failures are
/// reported inside the response (`return: -1`), never as a Dart exception.
#[flutter_rust_bridge::frb]
pub fn process_request(request_json: String) -> String {
    let response = DISPATCHER.handle_json(&request_json);
    serde_json::to_string(&response).unwrap_or_else(|err| {
        failure_response(response.sequence_num, &response.function, &err.to_string())
    })
}

/// Minimal error response used when the full response cannot be encoded.
fn failure_response(sequence_num: i64, function: &str, reason: &str) -> String {
    serde_json::json!({
        "sequence_num": sequence_num,
        "function": function,
        "return": -1,
        "output_parameters": { "error": reason },
    })
    .to_string()
}

/// Current fitting session (last crossover and compression threshold) as JSON
#[flutter_rust_bridge::frb(sync)]
pub fn get_session() -> Result<String, EngineError> {
    let session = DISPATCHER.session()?;
    Ok(serde_json::to_string(&session).unwrap_or_else(|_| "{}".to_string()))
}

/// Forget the fitting session
#[flutter_rust_bridge::frb(sync)]
pub fn clear_session() -> Result<(), EngineError> {
    DISPATCHER.clear_session()
}

// ============================================================================
// CLIENT SETTINGS
// ============================================================================

/// Set adult/child selection and date of birth (YYYYMMDD)
#[flutter_rust_bridge::frb]
pub fn set_adult_child(adult_child: i32, date_of_birth: i32) -> Result<(), EngineError> {
    facade().set_adult_child(adult_child, date_of_birth)
}

/// Set hearing-aid experience
#[flutter_rust_bridge::frb]
pub fn set_experience(experience: i32) -> Result<(), EngineError> {
    facade().set_experience(experience)
}

/// Set compression speed
#[flutter_rust_bridge::frb]
pub fn set_comp_speed(comp_speed: i32) -> Result<(), EngineError> {
    facade().set_comp_speed(comp_speed)
}

/// Set tonal-language flag
#[flutter_rust_bridge::frb]
pub fn set_tonal_language(tonal: i32) -> Result<(), EngineError> {
    facade().set_tonal_language(tonal)
}

/// Set client gender
#[flutter_rust_bridge::frb]
pub fn set_gender(gender: i32) -> Result<(), EngineError> {
    facade().set_gender(gender)
}

// ============================================================================
// CALCULATIONS
// ============================================================================

/// Crossover frequencies for a channel count
///
/// Returns the input arrays unchanged if the engine call fails.
#[flutter_rust_bridge::frb]
pub fn get_cross_over_frequencies(
    cf_array: Vec<f64>,
    channels: i32,
    ac: Vec<f64>,
    bc: Vec<f64>,
    freq_in_ch: Vec<i32>,
) -> CrossOverFrequencies {
    facade().cross_over_frequencies(&cf_array, channels, &ac, &bc, &freq_in_ch)
}

/// Maximum power output per band
///
/// # Arguments
/// * `mpo` - Working buffer; returned unchanged if the engine call fails
/// * `mpo_type` - MPO calculation type
/// * `ac` / `bc` - Air- and bone-conduction thresholds
/// * `channels` - Number of compression channels
/// * `limiting` - Output limiting mode
#[flutter_rust_bridge::frb]
pub fn get_mpo(
    mpo: Vec<f64>,
    mpo_type: i32,
    ac: Vec<f64>,
    bc: Vec<f64>,
    channels: i32,
    limiting: i32,
) -> Vec<f64> {
    facade().mpo(&mpo, mpo_type, &ac, &bc, channels, limiting)
}

/// Per-channel compression ratios
///
/// # Errors
/// - `InvalidShape` if `centreFreq`, `AC`, `BC` or `ACother` has the wrong
///   length for the channel count
#[flutter_rust_bridge::frb]
pub fn get_compression_ratio(
    cr: Vec<f64>,
    request: CompressionRatioRequest,
) -> Result<Vec<f64>, EngineError> {
    facade().compression_ratio(&cr, &request)
}

/// Real-ear aided gain
#[flutter_rust_bridge::frb]
pub fn get_real_ear_aided_gain(reag: Vec<f64>, request: GainRequest) -> Vec<f64> {
    facade().real_ear_aided_gain(&reag, &request)
}

/// Real-ear insertion gain
#[flutter_rust_bridge::frb]
pub fn get_real_ear_insertion_gain(reig: Vec<f64>, request: GainRequest) -> Vec<f64> {
    facade().real_ear_insertion_gain(&reig, &request)
}

/// Gain at a single frequency; 0.0 if the engine call fails
#[flutter_rust_bridge::frb]
pub fn get_gain_at(request: GainAtRequest) -> f64 {
    facade().gain_at(&request)
}

/// Speech intelligibility index; 0.0 if the engine call fails
#[flutter_rust_bridge::frb]
pub fn get_speech_intelligibility_index(request: SiiRequest) -> f64 {
    facade().speech_intelligibility_index(&request)
}

// ============================================================================
// DIAGNOSTICS
// ============================================================================

/// Register the Dart log receiver
///
/// Replaces any previous receiver. Events are forwarded from a dedicated
/// thread so engine calls never wait on Dart.
///
/// # Arguments
/// * `dart_callback` - Receives `(tag, level, message)`
#[flutter_rust_bridge::frb]
pub fn set_log_callback(
    dart_callback: impl Fn(String, String, String) -> DartFnFuture<()> + Send + Sync + 'static,
) {
    let (tx, rx) = mpsc::channel::<(String, String, String)>();

    std::thread::spawn(move || {
        // Ends when the callback holding `tx` is replaced or cleared
        for (tag, level, message) in rx {
            futures::executor::block_on(dart_callback(tag, level, message));
        }
    });

    let tx = Mutex::new(tx);
    FITTING_CONTEXT.set_log_callback(Some(Arc::new(
        move |tag: &str, level: LogLevel, message: &str| {
            if let Ok(tx) = tx.lock() {
                let _ = tx.send((tag.to_string(), level.as_str().to_string(), message.to_string()));
            }
        },
    )));
}

/// Remove the Dart log receiver
#[flutter_rust_bridge::frb(sync)]
pub fn clear_log_callback() {
    FITTING_CONTEXT.set_log_callback(None);
}

/// Recent log events and counters
#[flutter_rust_bridge::frb(sync)]
pub fn get_diagnostics_snapshot() -> DiagnosticsSnapshot {
    FITTING_CONTEXT.sink().snapshot()
}

/// Get engine error codes as structured data
///
/// # Returns
/// EngineErrorCodes struct with all error code constants
#[flutter_rust_bridge::frb(sync)]
pub fn get_engine_error_codes() -> EngineErrorCodes {
    EngineErrorCodes {}
}

/// Symbol names of every entry point the bridge knows about
#[flutter_rust_bridge::frb(sync)]
pub fn get_known_functions() -> Vec<String> {
    EntryPoint::ALL
        .iter()
        .map(|entry| entry.symbol().to_string())
        .collect()
}
