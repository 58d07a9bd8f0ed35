use std::os::raw::{c_int, c_void};
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::{info, warn};

use crate::config::EngineConfig;
use crate::engine::call::EngineCall;
use crate::engine::entry_points::{CapabilitySet, EntryPoint};
use crate::error::EngineError;
use crate::types::CURVE_POINTS;

use super::{EngineReturn, FittingEngine, OutputHandle};

/// Result object layout shared with the engine.
#[repr(C)]
struct RawOutputResult {
    status: c_int,
    length: c_int,
    output1: *mut f64,
}

type ResultPtr = *mut RawOutputResult;

const ACCESSOR_SYMBOL: &str = "OutputResult_getOutput1";
const FREE_SYMBOL: &str = "OutputResult_free";

type AccessorFn = unsafe extern "C" fn(*const RawOutputResult, *mut f64, c_int) -> c_int;
type FreeFn = unsafe extern "C" fn(*mut RawOutputResult);

type IntArgFn = unsafe extern "C" fn(c_int);
type VersionFn = unsafe extern "C" fn(*mut c_int);
type AdultChildFn = unsafe extern "C" fn(c_int, c_int);
type CrossOverFn =
    unsafe extern "C" fn(*mut f64, c_int, *const f64, *const f64, *mut c_int) -> ResultPtr;
type CenterFrequenciesFn = unsafe extern "C" fn(*mut c_int, *const f64, c_int);
type SetBwcFn = unsafe extern "C" fn(c_int, *const f64);
type CompressionThresholdFn =
    unsafe extern "C" fn(*mut f64, c_int, c_int, c_int, c_int, c_int, c_int, *const c_int);
type CompressionRatioFn = unsafe extern "C" fn(
    *mut f64,
    c_int,
    *const c_int,
    *const f64,
    *const f64,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
) -> ResultPtr;
type MpoFn =
    unsafe extern "C" fn(*mut f64, c_int, *const f64, *const f64, c_int, c_int) -> ResultPtr;
type RealEarGainFn = unsafe extern "C" fn(
    *mut f64,
    *const f64,
    *const f64,
    f64,
    c_int,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
) -> ResultPtr;
type RecdhFn =
    unsafe extern "C" fn(*mut f64, c_int, c_int, c_int, c_int, c_int, c_int, c_int) -> ResultPtr;
type RecdtFn = unsafe extern "C" fn(
    *mut f64,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
) -> ResultPtr;
type SetCurveFn = unsafe extern "C" fn(*const f64);
type RealEarIoFn = unsafe extern "C" fn(
    *mut f64,
    *mut f64,
    *const f64,
    *const f64,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
) -> ResultPtr;
type ClassifiedIoFn = unsafe extern "C" fn(
    *mut f64,
    *mut f64,
    *const f64,
    *const f64,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
    c_int,
    c_int,
    c_int,
    *mut c_int,
) -> ResultPtr;
type SpeechOGramFn = unsafe extern "C" fn(
    *mut f64,
    *mut f64,
    *mut f64,
    *mut f64,
    *const f64,
    *const f64,
    f64,
    c_int,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
) -> ResultPtr;
type AidedThresholdFn = unsafe extern "C" fn(
    *mut f64,
    *const f64,
    *const f64,
    *const f64,
    c_int,
    *const f64,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
) -> ResultPtr;
type GetReurFn = unsafe extern "C" fn(*mut f64, c_int, c_int, c_int, c_int) -> ResultPtr;
type SetReddFn = unsafe extern "C" fn(*const f64, c_int);
type SetReurFn = unsafe extern "C" fn(*const f64, c_int, c_int, c_int, c_int);
type CouplerGainFn = unsafe extern "C" fn(
    *mut f64,
    *const f64,
    *const f64,
    f64,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
    c_int,
    c_int,
    c_int,
    *mut c_int,
) -> ResultPtr;
type GainAtFn = unsafe extern "C" fn(
    c_int,
    c_int,
    *const f64,
    *const f64,
    f64,
    c_int,
    c_int,
    c_int,
    c_int,
    *const f64,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
    c_int,
) -> f64;
type MleFn = unsafe extern "C" fn(*mut f64, c_int, c_int, c_int) -> ResultPtr;
type ReturnValuesFn = unsafe extern "C" fn(*mut f64, *mut f64, *mut f64) -> ResultPtr;
type CorrectionFn = unsafe extern "C" fn(*mut f64, c_int) -> ResultPtr;
type SiFn = unsafe extern "C" fn(c_int, *const f64, *const f64) -> f64;
type SiiFn = unsafe extern "C" fn(
    c_int,
    *const f64,
    c_int,
    *const f64,
    *const f64,
    *const f64,
    *const f64,
) -> f64;

/// Copy `values` into a zero-padded scratch array of at least
/// [`CURVE_POINTS`] elements.
///
/// The engine reads and writes fixed 9/19/100 element arrays regardless of
/// the slice the caller handed in.
fn staged<T: Copy + Default>(values: &[T]) -> Vec<T> {
    let mut scratch = vec![T::default(); values.len().max(CURVE_POINTS)];
    scratch[..values.len()].copy_from_slice(values);
    scratch
}

fn copy_back<T: Copy>(out: &mut [T], scratch: &[T]) {
    let len = out.len();
    out.copy_from_slice(&scratch[..len]);
}

#[derive(Clone, Copy)]
struct ResultAccessors {
    get_output1: Option<AccessorFn>,
    free: Option<FreeFn>,
}

/// Native fitting engine loaded from a shared library.
pub struct NativeEngine {
    library: Arc<Library>,
    path: String,
    capabilities: CapabilitySet,
    accessors: ResultAccessors,
}

impl NativeEngine {
    /// Load the library named by `config.library_path`.
    pub fn load(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::open(&config.library_path)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        // SAFETY: loading a library runs its initialisers; the engine library is
        // a plain numeric library with no global constructors we depend on.
        let library = unsafe { Library::new(path) }.map_err(|err| EngineError::LibraryLoad {
            path: display.clone(),
            reason: err.to_string(),
        })?;

        let capabilities = EntryPoint::ALL
            .iter()
            .copied()
            // SAFETY: symbols are only probed for presence here, never called.
            .filter(|entry| unsafe { library.get::<*const c_void>(entry.symbol().as_bytes()) }.is_ok())
            .collect::<CapabilitySet>();

        // SAFETY: the fn pointers are copied out of the symbols and stay valid for as
        // long as `library` is alive; every holder keeps an `Arc<Library>`.
        let accessors = unsafe {
            ResultAccessors {
                get_output1: library
                    .get::<AccessorFn>(ACCESSOR_SYMBOL.as_bytes())
                    .ok()
                    .map(|symbol| *symbol),
                free: library
                    .get::<FreeFn>(FREE_SYMBOL.as_bytes())
                    .ok()
                    .map(|symbol| *symbol),
            }
        };

        if accessors.get_output1.is_none() {
            warn!(
                "{} not exported by {}; results will be read from the raw output1 field",
                ACCESSOR_SYMBOL, display
            );
        }

        info!(
            "Loaded fitting engine from {} ({} of {} entry points)",
            display,
            capabilities.len(),
            EntryPoint::ALL.len()
        );

        Ok(Self {
            library: Arc::new(library),
            path: display,
            capabilities,
            accessors,
        })
    }

    fn symbol<T>(&self, entry: EntryPoint) -> Result<Symbol<'_, T>, EngineError> {
        // SAFETY: `T` is the fn type declared for this entry point above.
        unsafe { self.library.get::<T>(entry.symbol().as_bytes()) }
            .map_err(|_| EngineError::unsupported(entry.symbol()))
    }

    fn handle(&self, entry: EntryPoint, result: ResultPtr) -> Result<EngineReturn, EngineError> {
        let output = NativeOutput {
            _library: Arc::clone(&self.library),
            ptr: result,
            accessors: self.accessors,
        };

        if !result.is_null() {
            // SAFETY: non-null result pointers come from the engine and point at a
            // live `RawOutputResult` until freed by `NativeOutput::drop`.
            let status = unsafe { (*result).status };
            if status < 0 {
                return Err(EngineError::fault(
                    entry.symbol(),
                    format!("engine returned status {}", status),
                ));
            }
        }

        Ok(EngineReturn::Handle(Box::new(output)))
    }
}

/// Opaque engine result; frees itself through `OutputResult_free` when exported.
struct NativeOutput {
    _library: Arc<Library>,
    ptr: ResultPtr,
    accessors: ResultAccessors,
}

// SAFETY: the result object is owned exclusively by this handle and the
// engine does not tie it to the creating thread.
unsafe impl Send for NativeOutput {}

impl OutputHandle for NativeOutput {
    fn output1(&self) -> Result<Vec<f64>, EngineError> {
        let accessor = self
            .accessors
            .get_output1
            .ok_or_else(|| EngineError::unsupported(ACCESSOR_SYMBOL))?;
        if self.ptr.is_null() {
            return Err(EngineError::fault(ACCESSOR_SYMBOL, "null result"));
        }

        // SAFETY: a null destination with zero capacity only queries the length.
        let len = unsafe { accessor(self.ptr, ptr::null_mut(), 0) };
        if len < 0 {
            return Err(EngineError::fault(
                ACCESSOR_SYMBOL,
                format!("accessor returned {}", len),
            ));
        }

        let mut values = vec![0.0; len as usize];
        // SAFETY: `values` has room for exactly `len` doubles.
        let written = unsafe { accessor(self.ptr, values.as_mut_ptr(), len) };
        if written < 0 {
            return Err(EngineError::fault(
                ACCESSOR_SYMBOL,
                format!("accessor returned {}", written),
            ));
        }
        values.truncate(written as usize);
        Ok(values)
    }

    fn raw_output1(&self) -> Result<Vec<f64>, EngineError> {
        if self.ptr.is_null() {
            return Err(EngineError::ExtractionFailed {
                reason: "engine returned a null result".to_string(),
            });
        }

        // SAFETY: see `NativeEngine::handle`; the layout is `#[repr(C)]`.
        let raw = unsafe { &*self.ptr };
        if raw.output1.is_null() || raw.length < 0 {
            return Err(EngineError::ExtractionFailed {
                reason: format!("output1 field unset (length {})", raw.length),
            });
        }

        // SAFETY: the engine guarantees `output1` holds `length` doubles.
        let values = unsafe { std::slice::from_raw_parts(raw.output1, raw.length as usize) };
        Ok(values.to_vec())
    }
}

impl Drop for NativeOutput {
    fn drop(&mut self) {
        if let (false, Some(free)) = (self.ptr.is_null(), self.accessors.free) {
            // SAFETY: the pointer came from the engine and is freed exactly once.
            unsafe { free(self.ptr) };
        }
    }
}

impl FittingEngine for NativeEngine {
    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn describe(&self) -> String {
        format!("native engine ({})", self.path)
    }

    fn invoke(&self, call: EngineCall<'_>) -> Result<EngineReturn, EngineError> {
        let entry = call.entry_point();

        // SAFETY (all calls below): every pointer handed to the engine points into
        // a scratch array of at least CURVE_POINTS elements that outlives the call,
        // and every fn type matches the engine's exported C signature.
        match call {
            EngineCall::DllVersion { version } => {
                let f = self.symbol::<VersionFn>(entry)?;
                let mut scratch = staged(&version[..]);
                unsafe { f(scratch.as_mut_ptr()) };
                copy_back(&mut version[..], &scratch);
                Ok(EngineReturn::Unit)
            }
            EngineCall::SetAdultChild {
                adult_child,
                date_of_birth,
            } => {
                let f = self.symbol::<AdultChildFn>(entry)?;
                unsafe { f(adult_child, date_of_birth) };
                Ok(EngineReturn::Unit)
            }
            EngineCall::SetExperience { experience: value }
            | EngineCall::SetCompSpeed { comp_speed: value }
            | EngineCall::SetTonalLanguage { tonal: value }
            | EngineCall::SetGender { gender: value } => {
                let f = self.symbol::<IntArgFn>(entry)?;
                unsafe { f(value) };
                Ok(EngineReturn::Unit)
            }
            EngineCall::CrossOverFrequencies {
                cf_array,
                channels,
                ac,
                bc,
                freq_in_ch,
            } => {
                let f = self.symbol::<CrossOverFn>(entry)?;
                let mut cf = staged(cf_array);
                let mut freq = staged(freq_in_ch);
                let (ac, bc) = (staged(ac), staged(bc));
                let result = unsafe {
                    f(
                        cf.as_mut_ptr(),
                        channels,
                        ac.as_ptr(),
                        bc.as_ptr(),
                        freq.as_mut_ptr(),
                    )
                };
                copy_back(cf_array, &cf);
                copy_back(freq_in_ch, &freq);
                self.handle(entry, result)
            }
            EngineCall::CenterFrequencies {
                centre_freq,
                cf_array,
                channels,
            } => {
                let f = self.symbol::<CenterFrequenciesFn>(entry)?;
                let mut centre = staged(centre_freq);
                let cf = staged(cf_array);
                unsafe { f(centre.as_mut_ptr(), cf.as_ptr(), channels) };
                copy_back(centre_freq, &centre);
                Ok(EngineReturn::Unit)
            }
            EngineCall::SetBwc {
                channels,
                cross_over,
            } => {
                let f = self.symbol::<SetBwcFn>(entry)?;
                let cross_over = staged(cross_over);
                unsafe { f(channels, cross_over.as_ptr()) };
                Ok(EngineReturn::Unit)
            }
            EngineCall::CompressionThreshold { ct, request } => {
                let f = self.symbol::<CompressionThresholdFn>(entry)?;
                let mut scratch = staged(ct);
                let calc_ch = staged(&request.calc_ch);
                unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        request.band_width,
                        request.selection,
                        request.wbct,
                        request.aid_type,
                        request.direction,
                        request.mic,
                        calc_ch.as_ptr(),
                    )
                };
                copy_back(ct, &scratch);
                Ok(EngineReturn::Unit)
            }
            EngineCall::CompressionRatio { cr, request } => {
                let f = self.symbol::<CompressionRatioFn>(entry)?;
                let mut scratch = staged(cr);
                let centre = staged(&request.centre_freq);
                let audiogram = &request.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let aid = request.aid;
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        aid.channels,
                        centre.as_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        aid.direction,
                        aid.mic,
                        aid.limiting,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                    )
                };
                copy_back(cr, &scratch);
                self.handle(entry, result)
            }
            EngineCall::Mpo {
                mpo,
                mpo_type,
                ac,
                bc,
                channels,
                limiting,
            } => {
                let f = self.symbol::<MpoFn>(entry)?;
                let mut scratch = staged(mpo);
                let (ac, bc) = (staged(ac), staged(bc));
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        mpo_type,
                        ac.as_ptr(),
                        bc.as_ptr(),
                        channels,
                        limiting,
                    )
                };
                copy_back(mpo, &scratch);
                self.handle(entry, result)
            }
            EngineCall::RealEarAidedGain {
                reag,
                request,
                ac_other,
            } => self.real_ear_gain(entry, reag, request, ac_other),
            EngineCall::RealEarInsertionGain { reig, request } => {
                self.real_ear_gain(entry, reig, request, &request.audiogram.ac_other)
            }
            EngineCall::GetRecdh {
                recdh, request, ..
            } => {
                let f = self.symbol::<RecdhFn>(entry)?;
                let mut scratch = staged(recdh);
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        request.recd_meas_type,
                        request.date_of_birth,
                        request.aid_type,
                        request.tubing,
                        request.coupler,
                        request.fitting_depth,
                        request.coupler,
                    )
                };
                copy_back(recdh, &scratch);
                self.handle(entry, result)
            }
            EngineCall::GetRecdt {
                recdt, request, ..
            } => {
                let f = self.symbol::<RecdtFn>(entry)?;
                let mut scratch = staged(recdt);
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        request.recd_meas_type,
                        request.date_of_birth,
                        request.aid_type,
                        request.tubing,
                        request.vent,
                        request.earpiece,
                        request.coupler,
                        request.fitting_depth,
                    )
                };
                copy_back(recdt, &scratch);
                self.handle(entry, result)
            }
            EngineCall::SetRecdh { recdh: curve, .. } | EngineCall::SetRecdt { recdt: curve, .. } => {
                let f = self.symbol::<SetCurveFn>(entry)?;
                let curve = staged(curve);
                unsafe { f(curve.as_ptr()) };
                Ok(EngineReturn::Unit)
            }
            EngineCall::RealEarIoCurve {
                io,
                io_unl,
                request,
            } => {
                let f = self.symbol::<RealEarIoFn>(entry)?;
                let (mut io_scratch, mut unl_scratch) = (staged(io), staged(io_unl));
                let audiogram = &request.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let aid = request.aid;
                let result = unsafe {
                    f(
                        io_scratch.as_mut_ptr(),
                        unl_scratch.as_mut_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        request.graph_freq,
                        request.start_level,
                        request.finish_level,
                        aid.limiting,
                        aid.channels,
                        aid.direction,
                        aid.mic,
                        request.coupling.target,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                    )
                };
                copy_back(io, &io_scratch);
                copy_back(io_unl, &unl_scratch);
                self.handle(entry, result)
            }
            EngineCall::TccIoCurve {
                io,
                io_unl,
                request,
                line_type,
            }
            | EngineCall::EarSimulatorIoCurve {
                io,
                io_unl,
                request,
                line_type,
            } => {
                let f = self.symbol::<ClassifiedIoFn>(entry)?;
                let (mut io_scratch, mut unl_scratch) = (staged(io), staged(io_unl));
                let mut line_scratch = staged(line_type);
                let audiogram = &request.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let (aid, coupling) = (request.aid, request.coupling);
                let result = unsafe {
                    f(
                        io_scratch.as_mut_ptr(),
                        unl_scratch.as_mut_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        request.graph_freq,
                        request.start_level,
                        request.finish_level,
                        aid.limiting,
                        aid.channels,
                        aid.direction,
                        aid.mic,
                        coupling.target,
                        coupling.aid_type,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                        coupling.tubing,
                        coupling.vent,
                        coupling.recd_meas_type,
                        line_scratch.as_mut_ptr(),
                    )
                };
                copy_back(io, &io_scratch);
                copy_back(io_unl, &unl_scratch);
                copy_back(line_type, &line_scratch);
                self.handle(entry, result)
            }
            EngineCall::SpeechOGram {
                rms,
                max,
                min,
                thresh,
                request,
            } => {
                let f = self.symbol::<SpeechOGramFn>(entry)?;
                let (mut rms_s, mut max_s, mut min_s, mut thresh_s) =
                    (staged(rms), staged(max), staged(min), staged(thresh));
                let audiogram = &request.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let aid = request.aid;
                let result = unsafe {
                    f(
                        rms_s.as_mut_ptr(),
                        max_s.as_mut_ptr(),
                        min_s.as_mut_ptr(),
                        thresh_s.as_mut_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        request.level,
                        aid.limiting,
                        aid.channels,
                        aid.direction,
                        aid.mic,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                    )
                };
                copy_back(rms, &rms_s);
                copy_back(max, &max_s);
                copy_back(min, &min_s);
                copy_back(thresh, &thresh_s);
                self.handle(entry, result)
            }
            EngineCall::AidedThreshold { at, request } => {
                let f = self.symbol::<AidedThresholdFn>(entry)?;
                let mut scratch = staged(at);
                let audiogram = &request.audiogram;
                let (ac, bc, ac_other, ct) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                    staged(&request.ct),
                );
                let aid = request.aid;
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        ct.as_ptr(),
                        request.db_option,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                        aid.limiting,
                        aid.channels,
                        aid.direction,
                        aid.mic,
                    )
                };
                copy_back(at, &scratch);
                self.handle(entry, result)
            }
            EngineCall::GetRedd {
                redd, def_values, ..
            } => self.correction(entry, redd, def_values),
            EngineCall::GetReur { reur, request, .. } => {
                let f = self.symbol::<GetReurFn>(entry)?;
                let mut scratch = staged(reur);
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        request.def_values,
                        request.date_of_birth,
                        request.direction,
                        request.mic,
                    )
                };
                copy_back(reur, &scratch);
                self.handle(entry, result)
            }
            EngineCall::SetRedd {
                redd, def_values, ..
            } => {
                let f = self.symbol::<SetReddFn>(entry)?;
                let redd = staged(redd);
                unsafe { f(redd.as_ptr(), def_values) };
                Ok(EngineReturn::Unit)
            }
            EngineCall::SetReur { reur, request, .. } => {
                let f = self.symbol::<SetReurFn>(entry)?;
                let reur = staged(reur);
                unsafe {
                    f(
                        reur.as_ptr(),
                        request.def_values,
                        request.date_of_birth,
                        request.direction,
                        request.mic,
                    )
                };
                Ok(EngineReturn::Unit)
            }
            EngineCall::TccCouplerGain {
                gain,
                request,
                line_type,
            } => {
                let f = self.symbol::<CouplerGainFn>(entry)?;
                let mut scratch = staged(gain);
                let mut line_scratch = staged(line_type);
                let audiogram = &request.gain.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let (aid, coupling) = (request.gain.aid, request.coupling);
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        request.gain.level,
                        aid.limiting,
                        aid.channels,
                        aid.direction,
                        aid.mic,
                        coupling.target,
                        coupling.aid_type,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                        coupling.tubing,
                        coupling.vent,
                        coupling.recd_meas_type,
                        line_scratch.as_mut_ptr(),
                    )
                };
                copy_back(gain, &scratch);
                copy_back(line_type, &line_scratch);
                self.handle(entry, result)
            }
            EngineCall::EarSimulatorGain {
                gain,
                request,
                line_type,
            } => {
                // Same shape as the coupler gain, but direction/mic precede limiting/channels.
                let f = self.symbol::<CouplerGainFn>(entry)?;
                let mut scratch = staged(gain);
                let mut line_scratch = staged(line_type);
                let audiogram = &request.gain.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let (aid, coupling) = (request.gain.aid, request.coupling);
                let result = unsafe {
                    f(
                        scratch.as_mut_ptr(),
                        ac.as_ptr(),
                        bc.as_ptr(),
                        request.gain.level,
                        aid.direction,
                        aid.mic,
                        aid.limiting,
                        aid.channels,
                        coupling.target,
                        coupling.aid_type,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                        coupling.tubing,
                        coupling.vent,
                        coupling.recd_meas_type,
                        line_scratch.as_mut_ptr(),
                    )
                };
                copy_back(gain, &scratch);
                copy_back(line_type, &line_scratch);
                self.handle(entry, result)
            }
            EngineCall::GainAt { request } => {
                let f = self.symbol::<GainAtFn>(entry)?;
                let audiogram = &request.gain.audiogram;
                let (ac, bc, ac_other) = (
                    staged(&audiogram.ac),
                    staged(&audiogram.bc),
                    staged(&audiogram.ac_other),
                );
                let (aid, coupling) = (request.gain.aid, request.coupling);
                let gain = unsafe {
                    f(
                        request.freq_required,
                        request.target_type,
                        ac.as_ptr(),
                        bc.as_ptr(),
                        request.gain.level,
                        aid.limiting,
                        aid.channels,
                        aid.direction,
                        aid.mic,
                        ac_other.as_ptr(),
                        aid.no_of_aids,
                        request.band_width,
                        coupling.target,
                        coupling.aid_type,
                        coupling.tubing,
                        coupling.vent,
                        coupling.recd_meas_type,
                    )
                };
                Ok(EngineReturn::Scalar(gain))
            }
            EngineCall::Mle {
                mle,
                aid_type,
                direction,
                mic,
            } => {
                let f = self.symbol::<MleFn>(entry)?;
                let mut scratch = staged(mle);
                let result = unsafe { f(scratch.as_mut_ptr(), aid_type, direction, mic) };
                copy_back(mle, &scratch);
                self.handle(entry, result)
            }
            EngineCall::ReturnValues { maf, bwc, escd } => {
                let f = self.symbol::<ReturnValuesFn>(entry)?;
                let (mut maf_s, mut bwc_s, mut escd_s) = (staged(maf), staged(bwc), staged(escd));
                let result = unsafe { f(maf_s.as_mut_ptr(), bwc_s.as_mut_ptr(), escd_s.as_mut_ptr()) };
                copy_back(maf, &maf_s);
                copy_back(bwc, &bwc_s);
                copy_back(escd, &escd_s);
                self.handle(entry, result)
            }
            EngineCall::Tubing {
                tubing: out,
                tubing_type: selector,
                ..
            }
            | EngineCall::VentOut {
                vent_out: out,
                vent: selector,
                ..
            } => self.correction(entry, out, selector),
            EngineCall::SpeechIntelligibility { s, reag, limit } => {
                let f = self.symbol::<SiFn>(entry)?;
                let (reag, limit) = (staged(reag), staged(limit));
                let si = unsafe { f(s, reag.as_ptr(), limit.as_ptr()) };
                Ok(EngineReturn::Scalar(si))
            }
            EngineCall::SpeechIntelligibilityIndex { request } => {
                let f = self.symbol::<SiiFn>(entry)?;
                let speech_thresh = staged(&request.speech_thresh);
                let (reag, reag_plus, reag_minus, reur) = (
                    staged(&request.reag),
                    staged(&request.reag_plus),
                    staged(&request.reag_minus),
                    staged(&request.reur),
                );
                let sii = unsafe {
                    f(
                        request.comp_speed,
                        speech_thresh.as_ptr(),
                        request.s,
                        reag.as_ptr(),
                        reag_plus.as_ptr(),
                        reag_minus.as_ptr(),
                        reur.as_ptr(),
                    )
                };
                Ok(EngineReturn::Scalar(sii))
            }
        }
    }
}

impl NativeEngine {
    fn real_ear_gain(
        &self,
        entry: EntryPoint,
        out: &mut [f64],
        request: &crate::types::GainRequest,
        ac_other: &[f64],
    ) -> Result<EngineReturn, EngineError> {
        let f = self.symbol::<RealEarGainFn>(entry)?;
        let mut scratch = staged(out);
        let (ac, bc, ac_other) = (
            staged(&request.audiogram.ac),
            staged(&request.audiogram.bc),
            staged(ac_other),
        );
        let aid = request.aid;
        // SAFETY: pointers reference scratch arrays that outlive the call.
        let result = unsafe {
            f(
                scratch.as_mut_ptr(),
                ac.as_ptr(),
                bc.as_ptr(),
                request.level,
                aid.limiting,
                aid.channels,
                aid.direction,
                aid.mic,
                ac_other.as_ptr(),
                aid.no_of_aids,
            )
        };
        copy_back(out, &scratch);
        self.handle(entry, result)
    }

    /// Single-selector correction curves: REDD, tubing and vent.
    fn correction(
        &self,
        entry: EntryPoint,
        out: &mut [f64],
        selector: c_int,
    ) -> Result<EngineReturn, EngineError> {
        let f = self.symbol::<CorrectionFn>(entry)?;
        let mut scratch = staged(out);
        // SAFETY: the pointer references a scratch array that outlives the call.
        let result = unsafe { f(scratch.as_mut_ptr(), selector) };
        copy_back(out, &scratch);
        self.handle(entry, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_pads_short_buffers() {
        let scratch = staged(&[1.0, 2.0]);
        assert_eq!(scratch.len(), CURVE_POINTS);
        assert_eq!(&scratch[..3], &[1.0, 2.0, 0.0]);

        let long = vec![3.0; CURVE_POINTS + 5];
        assert_eq!(staged(&long).len(), CURVE_POINTS + 5);
    }

    #[test]
    fn copy_back_respects_caller_length() {
        let mut out = [0; 3];
        copy_back(&mut out, &[7, 8, 9, 10]);
        assert_eq!(out, [7, 8, 9]);
    }

    #[test]
    fn missing_library_is_a_load_error() {
        let err = NativeEngine::open("/nonexistent/libnal2.so")
            .err()
            .expect("load must fail");
        assert!(matches!(err, EngineError::LibraryLoad { .. }));
    }

    #[cfg(unix)]
    mod result_handles {
        use std::sync::atomic::{AtomicUsize, Ordering};

        use super::*;

        const ACCESSOR_VALUES: [f64; 3] = [4.0, 5.0, 6.0];

        static HANDLE_FAULT_FREES: AtomicUsize = AtomicUsize::new(0);
        static HANDLE_OK_FREES: AtomicUsize = AtomicUsize::new(0);

        unsafe extern "C" fn fixed_accessor(
            _result: *const RawOutputResult,
            dest: *mut f64,
            capacity: c_int,
        ) -> c_int {
            let len = ACCESSOR_VALUES.len() as c_int;
            if dest.is_null() {
                return len;
            }
            let count = len.min(capacity);
            ptr::copy_nonoverlapping(ACCESSOR_VALUES.as_ptr(), dest, count as usize);
            count
        }

        unsafe extern "C" fn failing_accessor(
            _result: *const RawOutputResult,
            _dest: *mut f64,
            _capacity: c_int,
        ) -> c_int {
            -1
        }

        unsafe extern "C" fn count_fault_free(_result: *mut RawOutputResult) {
            HANDLE_FAULT_FREES.fetch_add(1, Ordering::SeqCst);
        }

        unsafe extern "C" fn count_ok_free(_result: *mut RawOutputResult) {
            HANDLE_OK_FREES.fetch_add(1, Ordering::SeqCst);
        }

        fn this_library() -> Arc<Library> {
            Arc::new(Library::from(libloading::os::unix::Library::this()))
        }

        fn raw_result(status: c_int, values: &mut [f64]) -> RawOutputResult {
            RawOutputResult {
                status,
                length: values.len() as c_int,
                output1: values.as_mut_ptr(),
            }
        }

        fn output(ptr: ResultPtr, get_output1: Option<AccessorFn>) -> NativeOutput {
            NativeOutput {
                _library: this_library(),
                ptr,
                accessors: ResultAccessors {
                    get_output1,
                    free: None,
                },
            }
        }

        fn engine(free: FreeFn) -> NativeEngine {
            NativeEngine {
                library: this_library(),
                path: "self".to_string(),
                capabilities: CapabilitySet::empty(),
                accessors: ResultAccessors {
                    get_output1: Some(fixed_accessor),
                    free: Some(free),
                },
            }
        }

        #[test]
        fn accessor_values_win_over_the_raw_field() {
            let mut field = vec![1.0, 2.0];
            let mut raw = raw_result(0, &mut field);
            let handle = output(&mut raw, Some(fixed_accessor));

            assert_eq!(handle.output1().unwrap(), ACCESSOR_VALUES.to_vec());
            assert_eq!(handle.raw_output1().unwrap(), vec![1.0, 2.0]);
        }

        #[test]
        fn missing_accessor_falls_back_to_the_raw_field() {
            let mut field = vec![7.5; 9];
            let mut raw = raw_result(0, &mut field);
            let handle = output(&mut raw, None);

            assert_eq!(
                handle.output1().unwrap_err(),
                EngineError::unsupported(ACCESSOR_SYMBOL)
            );
            assert_eq!(handle.raw_output1().unwrap(), vec![7.5; 9]);
        }

        #[test]
        fn negative_accessor_length_is_a_fault() {
            let mut field = vec![1.0];
            let mut raw = raw_result(0, &mut field);
            let handle = output(&mut raw, Some(failing_accessor));

            assert_eq!(
                handle.output1().unwrap_err(),
                EngineError::fault(ACCESSOR_SYMBOL, "accessor returned -1")
            );
        }

        #[test]
        fn unset_output1_field_cannot_be_extracted() {
            let mut null_field = RawOutputResult {
                status: 0,
                length: 19,
                output1: ptr::null_mut(),
            };
            let err = output(&mut null_field, None).raw_output1().unwrap_err();
            assert_eq!(
                err,
                EngineError::ExtractionFailed {
                    reason: "output1 field unset (length 19)".to_string()
                }
            );

            let mut field = vec![1.0; 4];
            let mut negative = raw_result(0, &mut field);
            negative.length = -3;
            let err = output(&mut negative, None).raw_output1().unwrap_err();
            assert_eq!(
                err,
                EngineError::ExtractionFailed {
                    reason: "output1 field unset (length -3)".to_string()
                }
            );

            let err = output(ptr::null_mut(), None).raw_output1().unwrap_err();
            assert!(matches!(err, EngineError::ExtractionFailed { .. }));
        }

        #[test]
        fn negative_status_is_a_fault_and_frees_once() {
            let mut field = vec![0.0; 19];
            let mut raw = raw_result(-2, &mut field);
            let engine = engine(count_fault_free);

            let err = engine.handle(EntryPoint::Mpo, &mut raw).unwrap_err();

            assert_eq!(
                err,
                EngineError::fault(EntryPoint::Mpo.symbol(), "engine returned status -2")
            );
            assert_eq!(HANDLE_FAULT_FREES.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn successful_handle_frees_when_dropped() {
            let mut field = vec![0.0; 19];
            let mut raw = raw_result(0, &mut field);
            let engine = engine(count_ok_free);

            let handle = match engine.handle(EntryPoint::Mpo, &mut raw).unwrap() {
                EngineReturn::Handle(handle) => handle,
                other => panic!("expected a result handle, got {:?}", other),
            };
            assert_eq!(handle.output1().unwrap(), ACCESSOR_VALUES.to_vec());
            assert_eq!(HANDLE_OK_FREES.load(Ordering::SeqCst), 0);

            drop(handle);
            assert_eq!(HANDLE_OK_FREES.load(Ordering::SeqCst), 1);
        }
    }
}
