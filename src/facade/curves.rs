//! Input/output curves and the speech-o-gram.
//!
//! None of these take caller buffers; failures yield zero-filled curves of
//! the engine length.

use crate::engine::{EngineCall, EngineReturn, EntryPoint};
use crate::error::EngineError;
use crate::extraction;
use crate::types::{
    ClassifiedCurve, CurveRequest, GainRequest, InputOutputCurve, SpeechOGram, CURVE_POINTS,
    EXTENDED_POINTS,
};

use super::Nal2Facade;

impl Nal2Facade {
    pub fn real_ear_input_output_curve(&self, request: &CurveRequest) -> InputOutputCurve {
        let entry = EntryPoint::RealEarInputOutputCurve;
        let mut io = vec![0.0; CURVE_POINTS];
        let mut io_unl = vec![0.0; CURVE_POINTS];
        let outcome = self.invoke(EngineCall::RealEarIoCurve {
            io: &mut io,
            io_unl: &mut io_unl,
            request,
        });

        match outcome {
            Ok(ret) => InputOutputCurve {
                io: extraction::vector(ret, &io, self.sink(), entry.symbol()),
                io_unl,
            },
            Err(err) => {
                self.absorb(entry, &err);
                InputOutputCurve {
                    io: vec![0.0; CURVE_POINTS],
                    io_unl: vec![0.0; CURVE_POINTS],
                }
            }
        }
    }

    /// 2cc coupler input/output curve.
    pub fn tcc_input_output_curve(&self, request: &CurveRequest) -> ClassifiedCurve {
        let mut io = vec![0.0; CURVE_POINTS];
        let mut io_unl = vec![0.0; CURVE_POINTS];
        let mut line_type = vec![0; CURVE_POINTS];
        let outcome = self.invoke(EngineCall::TccIoCurve {
            io: &mut io,
            io_unl: &mut io_unl,
            request,
            line_type: &mut line_type,
        });
        self.finish_classified(EntryPoint::TccInputOutputCurve, outcome, io, io_unl, line_type)
    }

    /// Ear-simulator input/output curve.
    pub fn ear_simulator_input_output_curve(&self, request: &CurveRequest) -> ClassifiedCurve {
        let mut io = vec![0.0; CURVE_POINTS];
        let mut io_unl = vec![0.0; CURVE_POINTS];
        let mut line_type = vec![0; CURVE_POINTS];
        let outcome = self.invoke(EngineCall::EarSimulatorIoCurve {
            io: &mut io,
            io_unl: &mut io_unl,
            request,
            line_type: &mut line_type,
        });
        self.finish_classified(
            EntryPoint::EarSimulatorInputOutputCurve,
            outcome,
            io,
            io_unl,
            line_type,
        )
    }

    fn finish_classified(
        &self,
        entry: EntryPoint,
        outcome: Result<EngineReturn, EngineError>,
        io: Vec<f64>,
        io_unl: Vec<f64>,
        line_type: Vec<i32>,
    ) -> ClassifiedCurve {
        match outcome {
            Ok(ret) => ClassifiedCurve {
                io: extraction::vector(ret, &io, self.sink(), entry.symbol()),
                io_unl,
                line_type,
            },
            Err(err) => {
                self.absorb(entry, &err);
                ClassifiedCurve {
                    io: vec![0.0; CURVE_POINTS],
                    io_unl: vec![0.0; CURVE_POINTS],
                    line_type: vec![0; CURVE_POINTS],
                }
            }
        }
    }

    /// Speech levels (rms, peaks, troughs) against aided thresholds.
    pub fn speech_o_gram(&self, request: &GainRequest) -> SpeechOGram {
        let entry = EntryPoint::SpeechOGram;
        let mut rms = vec![0.0; EXTENDED_POINTS];
        let mut max = vec![0.0; EXTENDED_POINTS];
        let mut min = vec![0.0; EXTENDED_POINTS];
        let mut thresh = vec![0.0; EXTENDED_POINTS];
        let outcome = self.invoke(EngineCall::SpeechOGram {
            rms: &mut rms,
            max: &mut max,
            min: &mut min,
            thresh: &mut thresh,
            request,
        });

        match outcome {
            Ok(ret) => SpeechOGram {
                rms: extraction::vector(ret, &rms, self.sink(), entry.symbol()),
                max,
                min,
                thresh,
            },
            Err(err) => {
                self.absorb(entry, &err);
                SpeechOGram {
                    rms: vec![0.0; EXTENDED_POINTS],
                    max: vec![0.0; EXTENDED_POINTS],
                    min: vec![0.0; EXTENDED_POINTS],
                    thresh: vec![0.0; EXTENDED_POINTS],
                }
            }
        }
    }
}
