//! JSON function dispatcher.
//!
//! Maps `{sequence_num, function, input_parameters}` requests onto facade
//! operations by engine symbol name and answers
//! `{sequence_num, function, return, output_parameters}`. `return` is `-1`
//! whenever `output_parameters` carries an `error`.
//!
//! The dispatcher also keeps the most recent crossover frequencies and
//! compression thresholds of the fitting session in memory.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::engine::EntryPoint;
use crate::error::{EngineError, ErrorCode};
use crate::facade::Nal2Facade;
use crate::types::{
    AidedThresholdRequest, CompressionRatioRequest, CompressionThresholdRequest,
    CouplerGainRequest, CurveRequest, GainAtRequest, GainRequest, RecdRequest, ReurRequest,
    SiiRequest, EXTENDED_POINTS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    #[serde(default)]
    pub sequence_num: i64,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub input_parameters: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub sequence_num: i64,
    pub function: String,
    #[serde(rename = "return")]
    pub return_code: i32,
    pub output_parameters: Value,
}

/// Values carried between calls of one fitting session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(rename = "CFArray")]
    pub cf_array: Option<Vec<f64>>,
    #[serde(rename = "FreqInCh")]
    pub freq_in_ch: Option<Vec<i32>>,
    #[serde(rename = "CT")]
    pub ct: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Request had no `input_parameters` object
    MissingInput,
    /// A parameter is absent or has the wrong type
    InvalidParameters { reason: String },
    Engine(EngineError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::MissingInput => write!(f, "missing input_parameters"),
            DispatchError::InvalidParameters { reason } => {
                write!(f, "invalid input_parameters: {}", reason)
            }
            DispatchError::Engine(err) => write!(f, "{}", err.message()),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<EngineError> for DispatchError {
    fn from(err: EngineError) -> Self {
        DispatchError::Engine(err)
    }
}

/// Typed access to one request's parameter object.
struct Params<'a>(&'a Map<String, Value>);

impl Params<'_> {
    fn value(&self, key: &str) -> Result<&Value, DispatchError> {
        self.0.get(key).ok_or_else(|| DispatchError::InvalidParameters {
            reason: format!("missing field `{}`", key),
        })
    }

    fn int(&self, key: &str) -> Result<i32, DispatchError> {
        let value = self.value(key)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64))
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| DispatchError::InvalidParameters {
                reason: format!("`{}` must be an integer", key),
            })
    }

    fn floats(&self, key: &str) -> Result<Vec<f64>, DispatchError> {
        serde_json::from_value(self.value(key)?.clone()).map_err(|err| {
            DispatchError::InvalidParameters {
                reason: format!("`{}`: {}", key, err),
            }
        })
    }

    fn floats_opt(&self, key: &str) -> Result<Option<Vec<f64>>, DispatchError> {
        match self.0.get(key) {
            Some(_) => self.floats(key).map(Some),
            None => Ok(None),
        }
    }

    fn decode<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|err| {
            DispatchError::InvalidParameters {
                reason: err.to_string(),
            }
        })
    }
}

fn success() -> Value {
    json!({ "success": true })
}

pub struct Dispatcher {
    facade: Nal2Facade,
    session: Mutex<SessionState>,
}

impl Dispatcher {
    pub fn new(facade: Nal2Facade) -> Self {
        Self {
            facade,
            session: Mutex::new(SessionState::default()),
        }
    }

    pub fn facade(&self) -> &Nal2Facade {
        &self.facade
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, SessionState>, EngineError> {
        self.session.lock().map_err(|_| EngineError::LockPoisoned {
            component: "fitting_session".to_string(),
        })
    }

    pub fn session(&self) -> Result<SessionState, EngineError> {
        Ok(self.lock_session()?.clone())
    }

    pub fn clear_session(&self) -> Result<(), EngineError> {
        *self.lock_session()? = SessionState::default();
        Ok(())
    }

    /// Decode a raw request body and dispatch it.
    pub fn handle_json(&self, body: &str) -> DispatchResponse {
        match serde_json::from_str::<DispatchRequest>(body) {
            Ok(request) => self.handle(request),
            Err(err) => DispatchResponse {
                sequence_num: 0,
                function: String::new(),
                return_code: -1,
                output_parameters: json!({ "error": format!("invalid request: {}", err) }),
            },
        }
    }

    pub fn handle(&self, request: DispatchRequest) -> DispatchResponse {
        log::debug!(
            "[Dispatch] #{} {}",
            request.sequence_num,
            request.function
        );
        let output = match self.call(&request.function, request.input_parameters.as_ref()) {
            Ok(output) => output,
            Err(err) => {
                log::warn!("[Dispatch] {} failed: {}", request.function, err);
                json!({ "error": err.to_string() })
            }
        };
        let return_code = if output.get("error").is_some() { -1 } else { 0 };

        DispatchResponse {
            sequence_num: request.sequence_num,
            function: request.function,
            return_code,
            output_parameters: output,
        }
    }

    fn call(&self, function: &str, params: Option<&Map<String, Value>>) -> Result<Value, DispatchError> {
        let entry = EntryPoint::from_symbol(function).ok_or_else(|| EngineError::UnknownFunction {
            name: function.to_string(),
        })?;
        let params = Params(params.ok_or(DispatchError::MissingInput)?);
        let facade = &self.facade;
        let zeros = [0.0; EXTENDED_POINTS];

        let output = match entry {
            EntryPoint::DllVersion => {
                let version = facade.dll_version();
                json!({ "major": version.major, "minor": version.minor })
            }
            EntryPoint::SetAdultChild => {
                facade.set_adult_child(params.int("adultChild")?, params.int("dateOfBirth")?)?;
                success()
            }
            EntryPoint::SetExperience => {
                facade.set_experience(params.int("experience")?)?;
                success()
            }
            EntryPoint::SetCompSpeed => {
                facade.set_comp_speed(params.int("compSpeed")?)?;
                success()
            }
            EntryPoint::SetTonalLanguage => {
                facade.set_tonal_language(params.int("tonal")?)?;
                success()
            }
            EntryPoint::SetGender => {
                facade.set_gender(params.int("gender")?)?;
                success()
            }
            EntryPoint::CrossOverFrequencies => {
                let result = facade.cross_over_frequencies(
                    &zeros,
                    params.int("channels")?,
                    &params.floats("AC")?,
                    &params.floats("BC")?,
                    &[0; EXTENDED_POINTS],
                );
                {
                    let mut session = self.lock_session()?;
                    session.cf_array = Some(result.cf_array.clone());
                    session.freq_in_ch = Some(result.freq_in_ch.clone());
                }
                json!({ "CFArray": result.cf_array, "FreqInCh": result.freq_in_ch })
            }
            EntryPoint::CenterFrequencies => {
                // Without an explicit CFArray, use the session's crossover result.
                let cf_array = match params.floats_opt("CFArray")? {
                    Some(cf_array) => cf_array,
                    None => self.lock_session()?.cf_array.clone().unwrap_or_default(),
                };
                let centre_f = facade.center_frequencies(params.int("channels")?, &cf_array);
                json!({ "centreF": centre_f })
            }
            EntryPoint::SetBwc => {
                facade.set_bwc(params.int("channels")?, &params.floats("crossOver")?)?;
                success()
            }
            EntryPoint::CompressionThreshold => {
                let request: CompressionThresholdRequest = params.decode()?;
                let mut ct = zeros.to_vec();
                facade.set_compression_threshold(&mut ct, &request)?;
                self.lock_session()?.ct = Some(ct.clone());
                json!({ "CT": ct })
            }
            EntryPoint::CompressionRatio => {
                let request: CompressionRatioRequest = params.decode()?;
                json!({ "CR": facade.compression_ratio(&zeros, &request)? })
            }
            EntryPoint::Mpo => {
                let mpo = facade.mpo(
                    &zeros,
                    params.int("type")?,
                    &params.floats("AC")?,
                    &params.floats("BC")?,
                    params.int("channels")?,
                    params.int("limiting")?,
                );
                json!({ "MPO": mpo })
            }
            EntryPoint::RealEarAidedGain => {
                let request: GainRequest = params.decode()?;
                json!({ "REAG": facade.real_ear_aided_gain(&zeros, &request) })
            }
            EntryPoint::RealEarInsertionGain => {
                let request: GainRequest = params.decode()?;
                json!({ "REIG": facade.real_ear_insertion_gain(&zeros, &request) })
            }
            EntryPoint::GetRecdhIndiv => {
                json!({ "RECDh": facade.recdh_indiv(&params.decode::<RecdRequest>()?) })
            }
            EntryPoint::GetRecdhIndiv9 => {
                json!({ "RECDh": facade.recdh_indiv9(&params.decode::<RecdRequest>()?) })
            }
            EntryPoint::GetRecdtIndiv => {
                json!({ "RECDt": facade.recdt_indiv(&params.decode::<RecdRequest>()?) })
            }
            EntryPoint::GetRecdtIndiv9 => {
                json!({ "RECDt": facade.recdt_indiv9(&params.decode::<RecdRequest>()?) })
            }
            EntryPoint::SetRecdhIndiv => {
                facade.set_recdh_indiv(&params.floats("RECDh")?)?;
                success()
            }
            EntryPoint::SetRecdhIndiv9 => {
                facade.set_recdh_indiv9(&params.floats("RECDh")?)?;
                success()
            }
            EntryPoint::SetRecdtIndiv => {
                facade.set_recdt_indiv(&params.floats("RECDt")?)?;
                success()
            }
            EntryPoint::SetRecdtIndiv9 => {
                facade.set_recdt_indiv9(&params.floats("RECDt")?)?;
                success()
            }
            EntryPoint::RealEarInputOutputCurve => {
                let curve = facade.real_ear_input_output_curve(&params.decode::<CurveRequest>()?);
                json!({ "REIO": curve.io, "REIOunl": curve.io_unl })
            }
            EntryPoint::TccInputOutputCurve => {
                let curve = facade.tcc_input_output_curve(&params.decode::<CurveRequest>()?);
                json!({ "TccIO": curve.io, "TccIOunl": curve.io_unl, "lineType": curve.line_type })
            }
            EntryPoint::EarSimulatorInputOutputCurve => {
                let curve =
                    facade.ear_simulator_input_output_curve(&params.decode::<CurveRequest>()?);
                json!({ "ESIO": curve.io, "ESIOunl": curve.io_unl, "lineType": curve.line_type })
            }
            EntryPoint::SpeechOGram => {
                let speech = facade.speech_o_gram(&params.decode::<GainRequest>()?);
                json!({
                    "Speech_rms": speech.rms,
                    "Speech_max": speech.max,
                    "Speech_min": speech.min,
                    "Speech_thresh": speech.thresh,
                })
            }
            EntryPoint::AidedThreshold => {
                json!({ "AT": facade.aided_threshold(&params.decode::<AidedThresholdRequest>()?) })
            }
            EntryPoint::GetReddIndiv => {
                json!({ "REDD": facade.redd_indiv(params.int("defValues")?) })
            }
            EntryPoint::GetReddIndiv9 => {
                json!({ "REDD": facade.redd_indiv9(params.int("defValues")?) })
            }
            EntryPoint::GetReurIndiv => {
                json!({ "REUR": facade.reur_indiv(&params.decode::<ReurRequest>()?) })
            }
            EntryPoint::GetReurIndiv9 => {
                json!({ "REUR": facade.reur_indiv9(&params.decode::<ReurRequest>()?) })
            }
            EntryPoint::SetReddIndiv => {
                facade.set_redd_indiv(&params.floats("REDD")?, params.int("defValues")?)?;
                success()
            }
            EntryPoint::SetReddIndiv9 => {
                facade.set_redd_indiv9(&params.floats("REDD")?, params.int("defValues")?)?;
                success()
            }
            EntryPoint::SetReurIndiv => {
                facade.set_reur_indiv(&params.floats("REUR")?, &params.decode::<ReurRequest>()?)?;
                success()
            }
            EntryPoint::SetReurIndiv9 => {
                facade.set_reur_indiv9(&params.floats("REUR")?, &params.decode::<ReurRequest>()?)?;
                success()
            }
            EntryPoint::TccCouplerGain => {
                let gain = facade.tcc_coupler_gain(
                    &zeros,
                    &params.decode::<CouplerGainRequest>()?,
                    &[0; EXTENDED_POINTS],
                );
                json!({ "TccGain": gain.gain, "lineType": gain.line_type })
            }
            EntryPoint::EarSimulatorGain => {
                let gain = facade.ear_simulator_gain(
                    &zeros,
                    &params.decode::<CouplerGainRequest>()?,
                    &[0; EXTENDED_POINTS],
                );
                json!({ "ESG": gain.gain, "lineType": gain.line_type })
            }
            EntryPoint::GainAt => {
                json!({ "Gain": facade.gain_at(&params.decode::<GainAtRequest>()?) })
            }
            EntryPoint::GetMle => {
                let mle = facade.mle(
                    params.int("aidType")?,
                    params.int("direction")?,
                    params.int("mic")?,
                );
                json!({ "MLE": mle })
            }
            EntryPoint::ReturnValues => {
                let values = facade.return_values();
                json!({ "MAF": values.maf, "BWC": values.bwc, "ESCD": values.escd })
            }
            EntryPoint::GetTubing => json!({ "Tubing": facade.tubing(params.int("tubing")?) }),
            EntryPoint::GetTubing9 => json!({ "Tubing": facade.tubing9(params.int("tubing")?) }),
            EntryPoint::GetVentOut => json!({ "VentOut": facade.vent_out(params.int("vent")?) }),
            EntryPoint::GetVentOut9 => json!({ "VentOut": facade.vent_out9(params.int("vent")?) }),
            EntryPoint::SpeechIntelligibility => {
                let si = facade.speech_intelligibility(
                    params.int("s")?,
                    &params.floats("REAG")?,
                    &params.floats("Limit")?,
                );
                json!({ "SI": si })
            }
            EntryPoint::SpeechIntelligibilityIndex => {
                json!({ "SII": facade.speech_intelligibility_index(&params.decode::<SiiRequest>()?) })
            }
        };
        Ok(output)
    }
}
