//! Frequency layout, gain and compression calculators.

use crate::engine::{EngineCall, EngineReturn, EntryPoint};
use crate::error::EngineError;
use crate::extraction;
use crate::types::{
    AidedThresholdRequest, CompressionRatioRequest, CouplerGain, CouplerGainRequest,
    CrossOverFrequencies, GainAtRequest, GainRequest, SiiRequest, EXTENDED_POINTS,
    STANDARD_POINTS,
};

use super::{check_shape, render, Nal2Facade};

impl Nal2Facade {
    /// Crossover frequencies for `channels`, plus the channel index of each
    /// frequency. Logs both arrays at debug level.
    pub fn cross_over_frequencies(
        &self,
        cf_array: &[f64],
        channels: i32,
        ac: &[f64],
        bc: &[f64],
        freq_in_ch: &[i32],
    ) -> CrossOverFrequencies {
        let entry = EntryPoint::CrossOverFrequencies;
        let mut cf_working = cf_array.to_vec();
        let mut freq_working = freq_in_ch.to_vec();
        let outcome = self.invoke(EngineCall::CrossOverFrequencies {
            cf_array: &mut cf_working,
            channels,
            ac,
            bc,
            freq_in_ch: &mut freq_working,
        });

        match outcome {
            Ok(ret) => {
                let cf = extraction::vector(ret, &cf_working, self.sink(), entry.symbol());
                self.sink().debug(format!("CFArray: {}", render(&cf)));
                self.sink().debug(format!("FreqInCh: {}", render(&freq_working)));
                CrossOverFrequencies {
                    cf_array: cf,
                    freq_in_ch: freq_working,
                }
            }
            Err(err) => {
                self.absorb(entry, &err);
                CrossOverFrequencies {
                    cf_array: cf_array.to_vec(),
                    freq_in_ch: freq_in_ch.to_vec(),
                }
            }
        }
    }

    /// Centre frequency of each channel. Zeros on failure.
    pub fn center_frequencies(&self, channels: i32, cf_array: &[f64]) -> Vec<i32> {
        let len = usize::try_from(channels).unwrap_or(0);
        let mut centre_freq = vec![0; len];
        match self.invoke(EngineCall::CenterFrequencies {
            centre_freq: &mut centre_freq,
            cf_array,
            channels,
        }) {
            Ok(_) => centre_freq,
            Err(err) => {
                self.absorb(EntryPoint::CenterFrequencies, &err);
                vec![0; len]
            }
        }
    }

    /// Per-channel compression ratios.
    ///
    /// # Errors
    /// `InvalidShape` when `centreFreq` does not hold one entry per channel
    /// or any audiogram does not hold 9 values. The engine is not called.
    pub fn compression_ratio(
        &self,
        cr: &[f64],
        request: &CompressionRatioRequest,
    ) -> Result<Vec<f64>, EngineError> {
        let entry = EntryPoint::CompressionRatio;
        let channels = request.aid.channels;
        let audiogram = &request.audiogram;

        let points = STANDARD_POINTS as i64;
        let validated = check_shape("centreFreq", request.centre_freq.len(), i64::from(channels))
            .and_then(|_| check_shape("AC", audiogram.ac.len(), points))
            .and_then(|_| check_shape("BC", audiogram.bc.len(), points))
            .and_then(|_| check_shape("ACother", audiogram.ac_other.len(), points));
        if let Err(err) = validated {
            self.sink()
                .error(format!("{} rejected arguments", entry.symbol()), &err);
            return Err(err);
        }

        self.sink().debug(format!(
            "{}: channels={}, centreFreq length={}, AC length={}, BC length={}, ACother length={}, CR length={}",
            entry.symbol(),
            channels,
            request.centre_freq.len(),
            audiogram.ac.len(),
            audiogram.bc.len(),
            audiogram.ac_other.len(),
            cr.len()
        ));

        let mut working = cr.to_vec();
        let outcome = self.invoke(EngineCall::CompressionRatio {
            cr: &mut working,
            request,
        });
        Ok(self.finish_vector(entry, outcome, &working, cr))
    }

    /// Maximum power output per band.
    pub fn mpo(
        &self,
        mpo: &[f64],
        mpo_type: i32,
        ac: &[f64],
        bc: &[f64],
        channels: i32,
        limiting: i32,
    ) -> Vec<f64> {
        let entry = EntryPoint::Mpo;
        self.sink().debug(format!(
            "{}: type={}, channels={}, limiting={}",
            entry.symbol(),
            mpo_type,
            channels,
            limiting
        ));

        let mut working = mpo.to_vec();
        let outcome = self.invoke(EngineCall::Mpo {
            mpo: &mut working,
            mpo_type,
            ac,
            bc,
            channels,
            limiting,
        });
        self.finish_vector(entry, outcome, &working, mpo)
    }

    /// Real-ear aided gain. The request's own AC doubles as the other-ear
    /// audiogram.
    pub fn real_ear_aided_gain(&self, reag: &[f64], request: &GainRequest) -> Vec<f64> {
        let mut working = reag.to_vec();
        let outcome = self.invoke(EngineCall::RealEarAidedGain {
            reag: &mut working,
            request,
            ac_other: &request.audiogram.ac,
        });
        self.finish_vector(EntryPoint::RealEarAidedGain, outcome, &working, reag)
    }

    pub fn real_ear_insertion_gain(&self, reig: &[f64], request: &GainRequest) -> Vec<f64> {
        let mut working = reig.to_vec();
        let outcome = self.invoke(EngineCall::RealEarInsertionGain {
            reig: &mut working,
            request,
        });
        self.finish_vector(EntryPoint::RealEarInsertionGain, outcome, &working, reig)
    }

    /// 2cc coupler gain with its line-type classification.
    pub fn tcc_coupler_gain(
        &self,
        gain: &[f64],
        request: &CouplerGainRequest,
        line_type: &[i32],
    ) -> CouplerGain {
        let mut working = gain.to_vec();
        let mut line_working = line_type.to_vec();
        let outcome = self.invoke(EngineCall::TccCouplerGain {
            gain: &mut working,
            request,
            line_type: &mut line_working,
        });
        self.finish_coupler_gain(EntryPoint::TccCouplerGain, outcome, working, line_working, gain, line_type)
    }

    /// Ear-simulator gain with its line-type classification.
    pub fn ear_simulator_gain(
        &self,
        gain: &[f64],
        request: &CouplerGainRequest,
        line_type: &[i32],
    ) -> CouplerGain {
        let mut working = gain.to_vec();
        let mut line_working = line_type.to_vec();
        let outcome = self.invoke(EngineCall::EarSimulatorGain {
            gain: &mut working,
            request,
            line_type: &mut line_working,
        });
        self.finish_coupler_gain(EntryPoint::EarSimulatorGain, outcome, working, line_working, gain, line_type)
    }

    fn finish_coupler_gain(
        &self,
        entry: EntryPoint,
        outcome: Result<EngineReturn, EngineError>,
        written: Vec<f64>,
        line_written: Vec<i32>,
        gain: &[f64],
        line_type: &[i32],
    ) -> CouplerGain {
        match outcome {
            Ok(ret) => CouplerGain {
                gain: extraction::vector(ret, &written, self.sink(), entry.symbol()),
                line_type: line_written,
            },
            Err(err) => {
                self.absorb(entry, &err);
                CouplerGain {
                    gain: gain.to_vec(),
                    line_type: line_type.to_vec(),
                }
            }
        }
    }

    /// Single gain value at `freq_required`. `0.0` on failure.
    pub fn gain_at(&self, request: &GainAtRequest) -> f64 {
        let outcome = self.invoke(EngineCall::GainAt { request });
        self.finish_scalar(EntryPoint::GainAt, outcome)
    }

    /// Aided thresholds on the extended grid.
    pub fn aided_threshold(&self, request: &AidedThresholdRequest) -> Vec<f64> {
        let mut at = vec![0.0; EXTENDED_POINTS];
        let outcome = self.invoke(EngineCall::AidedThreshold {
            at: &mut at,
            request,
        });
        self.finish_zeroed(EntryPoint::AidedThreshold, outcome, &at)
    }

    /// Speech intelligibility. `0.0` on failure.
    pub fn speech_intelligibility(&self, s: i32, reag: &[f64], limit: &[f64]) -> f64 {
        let outcome = self.invoke(EngineCall::SpeechIntelligibility { s, reag, limit });
        self.finish_scalar(EntryPoint::SpeechIntelligibility, outcome)
    }

    /// Speech intelligibility index from aided, occluded and unaided
    /// responses. `0.0` on failure.
    pub fn speech_intelligibility_index(&self, request: &SiiRequest) -> f64 {
        let outcome = self.invoke(EngineCall::SpeechIntelligibilityIndex { request });
        self.finish_scalar(EntryPoint::SpeechIntelligibilityIndex, outcome)
    }
}
