//! Value types crossing the facade boundary.
//!
//! Requests group the fixed-shape argument tuples of the larger engine
//! calls. Field names serialize to the engine's own parameter names so the
//! same structs decode dispatcher payloads. Results cover the version tuple,
//! the tagged [`CalculationResult`] and the typed multi-output composites.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Standard audiometric frequencies.
pub const STANDARD_POINTS: usize = 9;
/// Extended frequency grid.
pub const EXTENDED_POINTS: usize = 19;
/// Input/output curve sample count.
pub const CURVE_POINTS: usize = 100;

/// Frequency grid selected by the `*9` entry-point variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    Extended,
    Standard,
}

impl Grid {
    pub fn points(self) -> usize {
        match self {
            Grid::Extended => EXTENDED_POINTS,
            Grid::Standard => STANDARD_POINTS,
        }
    }
}

/// Engine version tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: i32,
    pub minor: i32,
}

impl VersionInfo {
    pub fn new(major: i32, minor: i32) -> Self {
        Self { major, minor }
    }
}

impl Default for VersionInfo {
    /// NAL-NL2 nominal version 2.0
    fn default() -> Self {
        Self { major: 2, minor: 0 }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// Air- and bone-conduction thresholds, plus the other ear's air conduction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audiogram {
    #[serde(rename = "AC")]
    pub ac: Vec<f64>,
    #[serde(rename = "BC")]
    pub bc: Vec<f64>,
    #[serde(rename = "ACother", default)]
    pub ac_other: Vec<f64>,
}

/// Hearing-aid processing setup shared by most gain calculations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AidSetup {
    pub limiting: i32,
    pub channels: i32,
    pub direction: i32,
    pub mic: i32,
    #[serde(rename = "noOfAids", default)]
    pub no_of_aids: i32,
}

/// Real-ear gain at one input level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GainRequest {
    #[serde(flatten)]
    pub audiogram: Audiogram,
    #[serde(rename = "L")]
    pub level: f64,
    #[serde(flatten)]
    pub aid: AidSetup,
}

/// Hearing-aid coupling: fitting target, device style and acoustic path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coupling {
    #[serde(default)]
    pub target: i32,
    #[serde(rename = "aidType", default)]
    pub aid_type: i32,
    #[serde(default)]
    pub tubing: i32,
    #[serde(default)]
    pub vent: i32,
    #[serde(rename = "RECDmeasType", default)]
    pub recd_meas_type: i32,
}

/// Coupler (2cc) or ear-simulator gain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplerGainRequest {
    #[serde(flatten)]
    pub gain: GainRequest,
    #[serde(flatten)]
    pub coupling: Coupling,
}

/// Input/output curve at one graph frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveRequest {
    #[serde(flatten)]
    pub audiogram: Audiogram,
    #[serde(rename = "graphFreq")]
    pub graph_freq: i32,
    #[serde(rename = "startLevel")]
    pub start_level: i32,
    #[serde(rename = "finishLevel")]
    pub finish_level: i32,
    #[serde(flatten)]
    pub aid: AidSetup,
    #[serde(flatten)]
    pub coupling: Coupling,
}

/// Single gain value at a required frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GainAtRequest {
    #[serde(rename = "freqRequired")]
    pub freq_required: i32,
    #[serde(rename = "targetType")]
    pub target_type: i32,
    #[serde(flatten)]
    pub gain: GainRequest,
    #[serde(rename = "bandWidth", default)]
    pub band_width: i32,
    #[serde(flatten)]
    pub coupling: Coupling,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AidedThresholdRequest {
    #[serde(flatten)]
    pub audiogram: Audiogram,
    #[serde(rename = "CT")]
    pub ct: Vec<f64>,
    #[serde(rename = "dbOption")]
    pub db_option: i32,
    #[serde(flatten)]
    pub aid: AidSetup,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionThresholdRequest {
    #[serde(rename = "bandWidth", alias = "bandwidth", default)]
    pub band_width: i32,
    #[serde(default)]
    pub selection: i32,
    #[serde(rename = "WBCT", default)]
    pub wbct: i32,
    #[serde(rename = "aidType", default)]
    pub aid_type: i32,
    #[serde(default)]
    pub direction: i32,
    #[serde(default)]
    pub mic: i32,
    #[serde(rename = "calcCh")]
    pub calc_ch: Vec<i32>,
}

/// Per-channel compression ratio. Array shapes are validated before the
/// engine is called.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionRatioRequest {
    #[serde(rename = "centreFreq")]
    pub centre_freq: Vec<i32>,
    #[serde(flatten)]
    pub audiogram: Audiogram,
    #[serde(flatten)]
    pub aid: AidSetup,
}

/// Real-ear-to-coupler difference prediction inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecdRequest {
    #[serde(rename = "RECDmeasType")]
    pub recd_meas_type: i32,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: i32,
    #[serde(rename = "aidType")]
    pub aid_type: i32,
    pub tubing: i32,
    #[serde(default)]
    pub vent: i32,
    #[serde(default)]
    pub earpiece: i32,
    pub coupler: i32,
    #[serde(rename = "fittingDepth")]
    pub fitting_depth: i32,
}

/// Real-ear unaided response selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReurRequest {
    #[serde(rename = "defValues")]
    pub def_values: i32,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: i32,
    pub direction: i32,
    pub mic: i32,
}

/// Speech intelligibility index with aided/occluded/unaided responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiiRequest {
    #[serde(rename = "nCompSpeed")]
    pub comp_speed: i32,
    #[serde(rename = "Speech_thresh")]
    pub speech_thresh: Vec<f64>,
    pub s: i32,
    #[serde(rename = "REAG")]
    pub reag: Vec<f64>,
    #[serde(rename = "REAGp")]
    pub reag_plus: Vec<f64>,
    #[serde(rename = "REAGm")]
    pub reag_minus: Vec<f64>,
    #[serde(rename = "REUR")]
    pub reur: Vec<f64>,
}

// ============================================================================
// RESULTS
// ============================================================================

/// Uniform result of one calculation.
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationResult {
    Scalar(f64),
    Vector(Vec<f64>),
    /// Integer sequence such as a line-type classification or channel map.
    Integers(Vec<i32>),
    /// Named group of results; names are kept in insertion order.
    Composite(Vec<(String, CalculationResult)>),
}

impl CalculationResult {
    pub fn composite<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = (S, CalculationResult)>,
        S: Into<String>,
    {
        CalculationResult::Composite(
            parts
                .into_iter()
                .map(|(name, part)| (name.into(), part))
                .collect(),
        )
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            CalculationResult::Vector(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            CalculationResult::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// Look up a named part of a composite.
    pub fn part(&self, name: &str) -> Option<&CalculationResult> {
        match self {
            CalculationResult::Composite(parts) => parts
                .iter()
                .find(|(part_name, _)| part_name == name)
                .map(|(_, part)| part),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            CalculationResult::Scalar(value) => json!(value),
            CalculationResult::Vector(values) => json!(values),
            CalculationResult::Integers(values) => json!(values),
            CalculationResult::Composite(parts) => {
                let mut map = Map::new();
                for (name, part) in parts {
                    map.insert(name.clone(), part.to_json());
                }
                Value::Object(map)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossOverFrequencies {
    pub cf_array: Vec<f64>,
    pub freq_in_ch: Vec<i32>,
}

/// Input/output curve pair: with and without limiting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputOutputCurve {
    pub io: Vec<f64>,
    pub io_unl: Vec<f64>,
}

/// Input/output curve pair with a per-point line-type classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCurve {
    pub io: Vec<f64>,
    pub io_unl: Vec<f64>,
    pub line_type: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechOGram {
    pub rms: Vec<f64>,
    pub max: Vec<f64>,
    pub min: Vec<f64>,
    pub thresh: Vec<f64>,
}

/// MAF / BWC / ESCD triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnValues {
    pub maf: Vec<f64>,
    pub bwc: Vec<f64>,
    pub escd: Vec<f64>,
}

/// Coupler or simulator gain with its line-type classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplerGain {
    pub gain: Vec<f64>,
    pub line_type: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_defaults_to_two_zero() {
        assert_eq!(VersionInfo::default(), VersionInfo::new(2, 0));
    }

    #[test]
    fn grid_lengths() {
        assert_eq!(Grid::Extended.points(), 19);
        assert_eq!(Grid::Standard.points(), 9);
    }

    #[test]
    fn coupler_gain_request_decodes_engine_parameter_names() {
        let payload = json!({
            "AC": [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0],
            "BC": [5, 15, 25, 35, 45, 55, 65, 75, 85],
            "ACother": [0, 0, 0, 0, 0, 0, 0, 0, 0],
            "L": 65,
            "limiting": 1,
            "channels": 6,
            "direction": 0,
            "mic": 1,
            "noOfAids": 2,
            "target": 1,
            "aidType": 3,
            "tubing": 4,
            "vent": 5,
            "RECDmeasType": 1
        });

        let request: CouplerGainRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(request.gain.audiogram.ac.len(), 9);
        assert_eq!(request.gain.audiogram.bc[1], 15.0);
        assert_eq!(request.gain.level, 65.0);
        assert_eq!(request.gain.aid.channels, 6);
        assert_eq!(request.gain.aid.no_of_aids, 2);
        assert_eq!(request.coupling.aid_type, 3);
        assert_eq!(request.coupling.recd_meas_type, 1);
    }

    #[test]
    fn compression_threshold_accepts_lowercase_bandwidth() {
        let request: CompressionThresholdRequest =
            serde_json::from_value(json!({ "bandwidth": 2, "calcCh": [1, 1, 0] })).unwrap();
        assert_eq!(request.band_width, 2);
        assert_eq!(request.selection, 0);
        assert_eq!(request.calc_ch, vec![1, 1, 0]);
    }

    #[test]
    fn composite_serializes_in_named_order() {
        let result = CalculationResult::composite([
            ("TccGain", CalculationResult::Vector(vec![1.5, 2.5])),
            ("lineType", CalculationResult::Integers(vec![0, 1])),
        ]);

        assert_eq!(
            result.to_json(),
            json!({ "TccGain": [1.5, 2.5], "lineType": [0, 1] })
        );
        assert_eq!(
            result.part("lineType"),
            Some(&CalculationResult::Integers(vec![0, 1]))
        );
        assert!(result.as_vector().is_none());
    }
}
