//! Typed engine calls.
//!
//! An [`EngineCall`] is one invocation of one entry point. Inputs are
//! borrowed, outputs are mutable caller buffers the engine writes into.
//! Calls are consumed by [`FittingEngine::invoke`](super::FittingEngine::invoke),
//! so no borrow outlives the call.

use crate::types::{
    AidedThresholdRequest, CompressionRatioRequest, CompressionThresholdRequest,
    CouplerGainRequest, CurveRequest, GainAtRequest, GainRequest, Grid, RecdRequest, ReurRequest,
    SiiRequest,
};

use super::entry_points::EntryPoint;

#[derive(Debug)]
pub enum EngineCall<'a> {
    DllVersion {
        version: &'a mut [i32; 2],
    },
    SetAdultChild {
        adult_child: i32,
        date_of_birth: i32,
    },
    SetExperience {
        experience: i32,
    },
    SetCompSpeed {
        comp_speed: i32,
    },
    SetTonalLanguage {
        tonal: i32,
    },
    SetGender {
        gender: i32,
    },
    CrossOverFrequencies {
        cf_array: &'a mut [f64],
        channels: i32,
        ac: &'a [f64],
        bc: &'a [f64],
        freq_in_ch: &'a mut [i32],
    },
    CenterFrequencies {
        centre_freq: &'a mut [i32],
        cf_array: &'a [f64],
        channels: i32,
    },
    SetBwc {
        channels: i32,
        cross_over: &'a [f64],
    },
    CompressionThreshold {
        ct: &'a mut [f64],
        request: &'a CompressionThresholdRequest,
    },
    CompressionRatio {
        cr: &'a mut [f64],
        request: &'a CompressionRatioRequest,
    },
    Mpo {
        mpo: &'a mut [f64],
        mpo_type: i32,
        ac: &'a [f64],
        bc: &'a [f64],
        channels: i32,
        limiting: i32,
    },
    RealEarAidedGain {
        reag: &'a mut [f64],
        request: &'a GainRequest,
        ac_other: &'a [f64],
    },
    RealEarInsertionGain {
        reig: &'a mut [f64],
        request: &'a GainRequest,
    },
    GetRecdh {
        grid: Grid,
        recdh: &'a mut [f64],
        request: &'a RecdRequest,
    },
    GetRecdt {
        grid: Grid,
        recdt: &'a mut [f64],
        request: &'a RecdRequest,
    },
    SetRecdh {
        grid: Grid,
        recdh: &'a [f64],
    },
    SetRecdt {
        grid: Grid,
        recdt: &'a [f64],
    },
    RealEarIoCurve {
        io: &'a mut [f64],
        io_unl: &'a mut [f64],
        request: &'a CurveRequest,
    },
    TccIoCurve {
        io: &'a mut [f64],
        io_unl: &'a mut [f64],
        request: &'a CurveRequest,
        line_type: &'a mut [i32],
    },
    EarSimulatorIoCurve {
        io: &'a mut [f64],
        io_unl: &'a mut [f64],
        request: &'a CurveRequest,
        line_type: &'a mut [i32],
    },
    SpeechOGram {
        rms: &'a mut [f64],
        max: &'a mut [f64],
        min: &'a mut [f64],
        thresh: &'a mut [f64],
        request: &'a GainRequest,
    },
    AidedThreshold {
        at: &'a mut [f64],
        request: &'a AidedThresholdRequest,
    },
    GetRedd {
        grid: Grid,
        redd: &'a mut [f64],
        def_values: i32,
    },
    GetReur {
        grid: Grid,
        reur: &'a mut [f64],
        request: &'a ReurRequest,
    },
    SetRedd {
        grid: Grid,
        redd: &'a [f64],
        def_values: i32,
    },
    SetReur {
        grid: Grid,
        reur: &'a [f64],
        request: &'a ReurRequest,
    },
    TccCouplerGain {
        gain: &'a mut [f64],
        request: &'a CouplerGainRequest,
        line_type: &'a mut [i32],
    },
    EarSimulatorGain {
        gain: &'a mut [f64],
        request: &'a CouplerGainRequest,
        line_type: &'a mut [i32],
    },
    GainAt {
        request: &'a GainAtRequest,
    },
    Mle {
        mle: &'a mut [f64],
        aid_type: i32,
        direction: i32,
        mic: i32,
    },
    ReturnValues {
        maf: &'a mut [f64],
        bwc: &'a mut [f64],
        escd: &'a mut [f64],
    },
    Tubing {
        grid: Grid,
        tubing: &'a mut [f64],
        tubing_type: i32,
    },
    VentOut {
        grid: Grid,
        vent_out: &'a mut [f64],
        vent: i32,
    },
    SpeechIntelligibility {
        s: i32,
        reag: &'a [f64],
        limit: &'a [f64],
    },
    SpeechIntelligibilityIndex {
        request: &'a SiiRequest,
    },
}

fn by_grid(grid: Grid, extended: EntryPoint, standard: EntryPoint) -> EntryPoint {
    match grid {
        Grid::Extended => extended,
        Grid::Standard => standard,
    }
}

impl EngineCall<'_> {
    pub fn entry_point(&self) -> EntryPoint {
        match self {
            EngineCall::DllVersion { .. } => EntryPoint::DllVersion,
            EngineCall::SetAdultChild { .. } => EntryPoint::SetAdultChild,
            EngineCall::SetExperience { .. } => EntryPoint::SetExperience,
            EngineCall::SetCompSpeed { .. } => EntryPoint::SetCompSpeed,
            EngineCall::SetTonalLanguage { .. } => EntryPoint::SetTonalLanguage,
            EngineCall::SetGender { .. } => EntryPoint::SetGender,
            EngineCall::CrossOverFrequencies { .. } => EntryPoint::CrossOverFrequencies,
            EngineCall::CenterFrequencies { .. } => EntryPoint::CenterFrequencies,
            EngineCall::SetBwc { .. } => EntryPoint::SetBwc,
            EngineCall::CompressionThreshold { .. } => EntryPoint::CompressionThreshold,
            EngineCall::CompressionRatio { .. } => EntryPoint::CompressionRatio,
            EngineCall::Mpo { .. } => EntryPoint::Mpo,
            EngineCall::RealEarAidedGain { .. } => EntryPoint::RealEarAidedGain,
            EngineCall::RealEarInsertionGain { .. } => EntryPoint::RealEarInsertionGain,
            EngineCall::GetRecdh { grid, .. } => {
                by_grid(*grid, EntryPoint::GetRecdhIndiv, EntryPoint::GetRecdhIndiv9)
            }
            EngineCall::GetRecdt { grid, .. } => {
                by_grid(*grid, EntryPoint::GetRecdtIndiv, EntryPoint::GetRecdtIndiv9)
            }
            EngineCall::SetRecdh { grid, .. } => {
                by_grid(*grid, EntryPoint::SetRecdhIndiv, EntryPoint::SetRecdhIndiv9)
            }
            EngineCall::SetRecdt { grid, .. } => {
                by_grid(*grid, EntryPoint::SetRecdtIndiv, EntryPoint::SetRecdtIndiv9)
            }
            EngineCall::RealEarIoCurve { .. } => EntryPoint::RealEarInputOutputCurve,
            EngineCall::TccIoCurve { .. } => EntryPoint::TccInputOutputCurve,
            EngineCall::EarSimulatorIoCurve { .. } => EntryPoint::EarSimulatorInputOutputCurve,
            EngineCall::SpeechOGram { .. } => EntryPoint::SpeechOGram,
            EngineCall::AidedThreshold { .. } => EntryPoint::AidedThreshold,
            EngineCall::GetRedd { grid, .. } => {
                by_grid(*grid, EntryPoint::GetReddIndiv, EntryPoint::GetReddIndiv9)
            }
            EngineCall::GetReur { grid, .. } => {
                by_grid(*grid, EntryPoint::GetReurIndiv, EntryPoint::GetReurIndiv9)
            }
            EngineCall::SetRedd { grid, .. } => {
                by_grid(*grid, EntryPoint::SetReddIndiv, EntryPoint::SetReddIndiv9)
            }
            EngineCall::SetReur { grid, .. } => {
                by_grid(*grid, EntryPoint::SetReurIndiv, EntryPoint::SetReurIndiv9)
            }
            EngineCall::TccCouplerGain { .. } => EntryPoint::TccCouplerGain,
            EngineCall::EarSimulatorGain { .. } => EntryPoint::EarSimulatorGain,
            EngineCall::GainAt { .. } => EntryPoint::GainAt,
            EngineCall::Mle { .. } => EntryPoint::GetMle,
            EngineCall::ReturnValues { .. } => EntryPoint::ReturnValues,
            EngineCall::Tubing { grid, .. } => {
                by_grid(*grid, EntryPoint::GetTubing, EntryPoint::GetTubing9)
            }
            EngineCall::VentOut { grid, .. } => {
                by_grid(*grid, EntryPoint::GetVentOut, EntryPoint::GetVentOut9)
            }
            EngineCall::SpeechIntelligibility { .. } => EntryPoint::SpeechIntelligibility,
            EngineCall::SpeechIntelligibilityIndex { .. } => EntryPoint::SpeechIntelligibilityIndex,
        }
    }

    /// Buffer the result handle's `output1` mirrors, if the call has one.
    pub fn primary_output(&mut self) -> Option<&mut [f64]> {
        match self {
            EngineCall::CrossOverFrequencies { cf_array, .. } => Some(&mut **cf_array),
            EngineCall::CompressionThreshold { ct, .. } => Some(&mut **ct),
            EngineCall::CompressionRatio { cr, .. } => Some(&mut **cr),
            EngineCall::Mpo { mpo, .. } => Some(&mut **mpo),
            EngineCall::RealEarAidedGain { reag, .. } => Some(&mut **reag),
            EngineCall::RealEarInsertionGain { reig, .. } => Some(&mut **reig),
            EngineCall::GetRecdh { recdh, .. } => Some(&mut **recdh),
            EngineCall::GetRecdt { recdt, .. } => Some(&mut **recdt),
            EngineCall::RealEarIoCurve { io, .. }
            | EngineCall::TccIoCurve { io, .. }
            | EngineCall::EarSimulatorIoCurve { io, .. } => Some(&mut **io),
            EngineCall::SpeechOGram { rms, .. } => Some(&mut **rms),
            EngineCall::AidedThreshold { at, .. } => Some(&mut **at),
            EngineCall::GetRedd { redd, .. } => Some(&mut **redd),
            EngineCall::GetReur { reur, .. } => Some(&mut **reur),
            EngineCall::TccCouplerGain { gain, .. } | EngineCall::EarSimulatorGain { gain, .. } => {
                Some(&mut **gain)
            }
            EngineCall::Mle { mle, .. } => Some(&mut **mle),
            EngineCall::ReturnValues { maf, .. } => Some(&mut **maf),
            EngineCall::Tubing { tubing, .. } => Some(&mut **tubing),
            EngineCall::VentOut { vent_out, .. } => Some(&mut **vent_out),
            _ => None,
        }
    }

    /// Integer side-channel the engine fills alongside the primary output.
    pub fn integer_output(&mut self) -> Option<&mut [i32]> {
        match self {
            EngineCall::CrossOverFrequencies { freq_in_ch, .. } => Some(&mut **freq_in_ch),
            EngineCall::CenterFrequencies { centre_freq, .. } => Some(&mut **centre_freq),
            EngineCall::TccIoCurve { line_type, .. }
            | EngineCall::EarSimulatorIoCurve { line_type, .. }
            | EngineCall::TccCouplerGain { line_type, .. }
            | EngineCall::EarSimulatorGain { line_type, .. } => Some(&mut **line_type),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_selects_the_nine_point_symbol() {
        let mut redd = [0.0; 9];
        let call = EngineCall::GetRedd {
            grid: Grid::Standard,
            redd: &mut redd,
            def_values: 1,
        };
        assert_eq!(call.entry_point(), EntryPoint::GetReddIndiv9);
        assert_eq!(call.entry_point().symbol(), "GetREDDindiv9");

        let mut tubing = [0.0; 19];
        let call = EngineCall::Tubing {
            grid: Grid::Extended,
            tubing: &mut tubing,
            tubing_type: 2,
        };
        assert_eq!(call.entry_point(), EntryPoint::GetTubing);
    }

    #[test]
    fn primary_output_points_at_the_written_buffer() {
        let mut mpo = vec![0.0; 19];
        let ac = [0.0; 9];
        let mut call = EngineCall::Mpo {
            mpo: &mut mpo,
            mpo_type: 1,
            ac: &ac,
            bc: &ac,
            channels: 6,
            limiting: 1,
        };
        if let Some(out) = call.primary_output() {
            out[0] = 42.0;
        }
        assert!(call.integer_output().is_none());
        drop(call);
        assert_eq!(mpo[0], 42.0);
    }

    #[test]
    fn setters_have_no_outputs() {
        let mut call = EngineCall::SetGender { gender: 1 };
        assert!(call.primary_output().is_none());
        assert!(call.integer_output().is_none());
    }
}
