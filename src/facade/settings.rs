//! Patient and device configuration setters.
//!
//! All of these propagate engine errors unchanged.

use crate::engine::EngineCall;
use crate::error::EngineError;
use crate::types::{CompressionThresholdRequest, Grid, ReurRequest};

use super::Nal2Facade;

impl Nal2Facade {
    pub fn set_adult_child(&self, adult_child: i32, date_of_birth: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetAdultChild {
            adult_child,
            date_of_birth,
        })
    }

    pub fn set_experience(&self, experience: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetExperience { experience })
    }

    pub fn set_comp_speed(&self, comp_speed: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetCompSpeed { comp_speed })
    }

    pub fn set_tonal_language(&self, tonal: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetTonalLanguage { tonal })
    }

    pub fn set_gender(&self, gender: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetGender { gender })
    }

    /// Bandwidth configuration from the crossover frequencies.
    pub fn set_bwc(&self, channels: i32, cross_over: &[f64]) -> Result<(), EngineError> {
        self.apply(EngineCall::SetBwc {
            channels,
            cross_over,
        })
    }

    /// Compute compression thresholds into `ct`.
    ///
    /// Treated as configuration: the engine fills `ct` in place and errors
    /// propagate.
    pub fn set_compression_threshold(
        &self,
        ct: &mut [f64],
        request: &CompressionThresholdRequest,
    ) -> Result<(), EngineError> {
        self.apply(EngineCall::CompressionThreshold { ct, request })
    }

    pub fn set_recdh_indiv(&self, recdh: &[f64]) -> Result<(), EngineError> {
        self.apply(EngineCall::SetRecdh {
            grid: Grid::Extended,
            recdh,
        })
    }

    pub fn set_recdh_indiv9(&self, recdh: &[f64]) -> Result<(), EngineError> {
        self.apply(EngineCall::SetRecdh {
            grid: Grid::Standard,
            recdh,
        })
    }

    pub fn set_recdt_indiv(&self, recdt: &[f64]) -> Result<(), EngineError> {
        self.apply(EngineCall::SetRecdt {
            grid: Grid::Extended,
            recdt,
        })
    }

    pub fn set_recdt_indiv9(&self, recdt: &[f64]) -> Result<(), EngineError> {
        self.apply(EngineCall::SetRecdt {
            grid: Grid::Standard,
            recdt,
        })
    }

    pub fn set_redd_indiv(&self, redd: &[f64], def_values: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetRedd {
            grid: Grid::Extended,
            redd,
            def_values,
        })
    }

    pub fn set_redd_indiv9(&self, redd: &[f64], def_values: i32) -> Result<(), EngineError> {
        self.apply(EngineCall::SetRedd {
            grid: Grid::Standard,
            redd,
            def_values,
        })
    }

    pub fn set_reur_indiv(&self, reur: &[f64], request: &ReurRequest) -> Result<(), EngineError> {
        self.apply(EngineCall::SetReur {
            grid: Grid::Extended,
            reur,
            request,
        })
    }

    pub fn set_reur_indiv9(&self, reur: &[f64], request: &ReurRequest) -> Result<(), EngineError> {
        self.apply(EngineCall::SetReur {
            grid: Grid::Standard,
            reur,
            request,
        })
    }
}
