//! Individual correction curves (RECD, REDD, REUR), acoustic path
//! corrections and the engine's reference tables.

use crate::engine::{EngineCall, EntryPoint};
use crate::extraction;
use crate::types::{Grid, RecdRequest, ReturnValues, ReurRequest, EXTENDED_POINTS, STANDARD_POINTS};

use super::Nal2Facade;

impl Nal2Facade {
    /// Predicted real-ear-to-coupler difference (HA1 coupler).
    pub fn recdh_indiv(&self, request: &RecdRequest) -> Vec<f64> {
        self.recdh(Grid::Extended, request)
    }

    pub fn recdh_indiv9(&self, request: &RecdRequest) -> Vec<f64> {
        self.recdh(Grid::Standard, request)
    }

    /// Predicted real-ear-to-coupler difference (HA2 coupler).
    pub fn recdt_indiv(&self, request: &RecdRequest) -> Vec<f64> {
        self.recdt(Grid::Extended, request)
    }

    pub fn recdt_indiv9(&self, request: &RecdRequest) -> Vec<f64> {
        self.recdt(Grid::Standard, request)
    }

    // RECD curves are 9 points on both grids.
    fn recdh(&self, grid: Grid, request: &RecdRequest) -> Vec<f64> {
        let mut recdh = vec![0.0; STANDARD_POINTS];
        let call = EngineCall::GetRecdh {
            grid,
            recdh: &mut recdh,
            request,
        };
        let entry = call.entry_point();
        let outcome = self.invoke(call);
        self.finish_zeroed(entry, outcome, &recdh)
    }

    fn recdt(&self, grid: Grid, request: &RecdRequest) -> Vec<f64> {
        let mut recdt = vec![0.0; STANDARD_POINTS];
        let call = EngineCall::GetRecdt {
            grid,
            recdt: &mut recdt,
            request,
        };
        let entry = call.entry_point();
        let outcome = self.invoke(call);
        self.finish_zeroed(entry, outcome, &recdt)
    }

    /// Real-ear-to-dial difference.
    pub fn redd_indiv(&self, def_values: i32) -> Vec<f64> {
        self.redd(Grid::Extended, def_values)
    }

    pub fn redd_indiv9(&self, def_values: i32) -> Vec<f64> {
        self.redd(Grid::Standard, def_values)
    }

    fn redd(&self, grid: Grid, def_values: i32) -> Vec<f64> {
        let mut redd = vec![0.0; grid.points()];
        let call = EngineCall::GetRedd {
            grid,
            redd: &mut redd,
            def_values,
        };
        let entry = call.entry_point();
        let outcome = self.invoke(call);
        self.finish_zeroed(entry, outcome, &redd)
    }

    /// Real-ear unaided response.
    pub fn reur_indiv(&self, request: &ReurRequest) -> Vec<f64> {
        self.reur(Grid::Extended, request)
    }

    pub fn reur_indiv9(&self, request: &ReurRequest) -> Vec<f64> {
        self.reur(Grid::Standard, request)
    }

    fn reur(&self, grid: Grid, request: &ReurRequest) -> Vec<f64> {
        let mut reur = vec![0.0; grid.points()];
        let call = EngineCall::GetReur {
            grid,
            reur: &mut reur,
            request,
        };
        let entry = call.entry_point();
        let outcome = self.invoke(call);
        self.finish_zeroed(entry, outcome, &reur)
    }

    /// Maximum levels of equipment.
    pub fn mle(&self, aid_type: i32, direction: i32, mic: i32) -> Vec<f64> {
        let mut mle = vec![0.0; EXTENDED_POINTS];
        let outcome = self.invoke(EngineCall::Mle {
            mle: &mut mle,
            aid_type,
            direction,
            mic,
        });
        self.finish_zeroed(EntryPoint::GetMle, outcome, &mle)
    }

    /// MAF, BWC and ESCD reference tables.
    pub fn return_values(&self) -> ReturnValues {
        let entry = EntryPoint::ReturnValues;
        let mut maf = vec![0.0; EXTENDED_POINTS];
        let mut bwc = vec![0.0; EXTENDED_POINTS];
        let mut escd = vec![0.0; EXTENDED_POINTS];
        let outcome = self.invoke(EngineCall::ReturnValues {
            maf: &mut maf,
            bwc: &mut bwc,
            escd: &mut escd,
        });

        match outcome {
            Ok(ret) => ReturnValues {
                maf: extraction::vector(ret, &maf, self.sink(), entry.symbol()),
                bwc,
                escd,
            },
            Err(err) => {
                self.absorb(entry, &err);
                ReturnValues {
                    maf: vec![0.0; EXTENDED_POINTS],
                    bwc: vec![0.0; EXTENDED_POINTS],
                    escd: vec![0.0; EXTENDED_POINTS],
                }
            }
        }
    }

    /// Tubing correction for `tubing_type`.
    pub fn tubing(&self, tubing_type: i32) -> Vec<f64> {
        self.tubing_on(Grid::Extended, tubing_type)
    }

    pub fn tubing9(&self, tubing_type: i32) -> Vec<f64> {
        self.tubing_on(Grid::Standard, tubing_type)
    }

    fn tubing_on(&self, grid: Grid, tubing_type: i32) -> Vec<f64> {
        let mut tubing = vec![0.0; grid.points()];
        let call = EngineCall::Tubing {
            grid,
            tubing: &mut tubing,
            tubing_type,
        };
        let entry = call.entry_point();
        let outcome = self.invoke(call);
        self.finish_zeroed(entry, outcome, &tubing)
    }

    /// Vent-out correction for `vent`.
    pub fn vent_out(&self, vent: i32) -> Vec<f64> {
        self.vent_out_on(Grid::Extended, vent)
    }

    pub fn vent_out9(&self, vent: i32) -> Vec<f64> {
        self.vent_out_on(Grid::Standard, vent)
    }

    fn vent_out_on(&self, grid: Grid, vent: i32) -> Vec<f64> {
        let mut vent_out = vec![0.0; grid.points()];
        let call = EngineCall::VentOut {
            grid,
            vent_out: &mut vent_out,
            vent,
        };
        let entry = call.entry_point();
        let outcome = self.invoke(call);
        self.finish_zeroed(entry, outcome, &vent_out)
    }
}
