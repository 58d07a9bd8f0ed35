//! Catalogue of fitting-engine entry points.
//!
//! Every symbol the engine may expose is listed here together with the
//! result convention it uses. A [`CapabilitySet`] records which of them a
//! particular engine build actually provides; it is filled once when the
//! engine handle is created and consulted before every call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How an entry point hands its result back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultConvention {
    /// Writes into caller buffers and returns nothing.
    Unit,
    /// Returns a single double directly.
    Scalar,
    /// Writes into caller buffers and returns an opaque result handle.
    Handle,
}

/// One engine symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntryPoint {
    DllVersion,
    SetAdultChild,
    SetExperience,
    SetCompSpeed,
    SetTonalLanguage,
    SetGender,
    CrossOverFrequencies,
    CenterFrequencies,
    SetBwc,
    CompressionThreshold,
    CompressionRatio,
    Mpo,
    RealEarAidedGain,
    RealEarInsertionGain,
    GetRecdhIndiv,
    GetRecdhIndiv9,
    GetRecdtIndiv,
    GetRecdtIndiv9,
    SetRecdhIndiv,
    SetRecdhIndiv9,
    SetRecdtIndiv,
    SetRecdtIndiv9,
    RealEarInputOutputCurve,
    TccInputOutputCurve,
    EarSimulatorInputOutputCurve,
    SpeechOGram,
    AidedThreshold,
    GetReddIndiv,
    GetReddIndiv9,
    GetReurIndiv,
    GetReurIndiv9,
    SetReddIndiv,
    SetReddIndiv9,
    SetReurIndiv,
    SetReurIndiv9,
    TccCouplerGain,
    EarSimulatorGain,
    GainAt,
    GetMle,
    ReturnValues,
    GetTubing,
    GetTubing9,
    GetVentOut,
    GetVentOut9,
    SpeechIntelligibility,
    SpeechIntelligibilityIndex,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 46] = [
        EntryPoint::DllVersion,
        EntryPoint::SetAdultChild,
        EntryPoint::SetExperience,
        EntryPoint::SetCompSpeed,
        EntryPoint::SetTonalLanguage,
        EntryPoint::SetGender,
        EntryPoint::CrossOverFrequencies,
        EntryPoint::CenterFrequencies,
        EntryPoint::SetBwc,
        EntryPoint::CompressionThreshold,
        EntryPoint::CompressionRatio,
        EntryPoint::Mpo,
        EntryPoint::RealEarAidedGain,
        EntryPoint::RealEarInsertionGain,
        EntryPoint::GetRecdhIndiv,
        EntryPoint::GetRecdhIndiv9,
        EntryPoint::GetRecdtIndiv,
        EntryPoint::GetRecdtIndiv9,
        EntryPoint::SetRecdhIndiv,
        EntryPoint::SetRecdhIndiv9,
        EntryPoint::SetRecdtIndiv,
        EntryPoint::SetRecdtIndiv9,
        EntryPoint::RealEarInputOutputCurve,
        EntryPoint::TccInputOutputCurve,
        EntryPoint::EarSimulatorInputOutputCurve,
        EntryPoint::SpeechOGram,
        EntryPoint::AidedThreshold,
        EntryPoint::GetReddIndiv,
        EntryPoint::GetReddIndiv9,
        EntryPoint::GetReurIndiv,
        EntryPoint::GetReurIndiv9,
        EntryPoint::SetReddIndiv,
        EntryPoint::SetReddIndiv9,
        EntryPoint::SetReurIndiv,
        EntryPoint::SetReurIndiv9,
        EntryPoint::TccCouplerGain,
        EntryPoint::EarSimulatorGain,
        EntryPoint::GainAt,
        EntryPoint::GetMle,
        EntryPoint::ReturnValues,
        EntryPoint::GetTubing,
        EntryPoint::GetTubing9,
        EntryPoint::GetVentOut,
        EntryPoint::GetVentOut9,
        EntryPoint::SpeechIntelligibility,
        EntryPoint::SpeechIntelligibilityIndex,
    ];

    /// Exported symbol name in the native library.
    pub fn symbol(self) -> &'static str {
        match self {
            EntryPoint::DllVersion => "dllVersion",
            EntryPoint::SetAdultChild => "SetAdultChild",
            EntryPoint::SetExperience => "SetExperience",
            EntryPoint::SetCompSpeed => "SetCompSpeed",
            EntryPoint::SetTonalLanguage => "SetTonalLanguage",
            EntryPoint::SetGender => "SetGender",
            EntryPoint::CrossOverFrequencies => "CrossOverFrequencies_NL2",
            EntryPoint::CenterFrequencies => "CenterFrequencies",
            EntryPoint::SetBwc => "setBWC",
            EntryPoint::CompressionThreshold => "CompressionThreshold_NL2",
            EntryPoint::CompressionRatio => "CompressionRatio_NL2",
            EntryPoint::Mpo => "getMPO_NL2",
            EntryPoint::RealEarAidedGain => "RealEarAidedGain_NL2",
            EntryPoint::RealEarInsertionGain => "RealEarInsertionGain_NL2",
            EntryPoint::GetRecdhIndiv => "GetRECDh_indiv_NL2",
            EntryPoint::GetRecdhIndiv9 => "GetRECDh_indiv9_NL2",
            EntryPoint::GetRecdtIndiv => "GetRECDt_indiv_NL2",
            EntryPoint::GetRecdtIndiv9 => "GetRECDt_indiv9_NL2",
            EntryPoint::SetRecdhIndiv => "SetRECDh_indiv_NL2",
            EntryPoint::SetRecdhIndiv9 => "SetRECDh_indiv9_NL2",
            EntryPoint::SetRecdtIndiv => "SetRECDt_indiv_NL2",
            EntryPoint::SetRecdtIndiv9 => "SetRECDt_indiv9_NL2",
            EntryPoint::RealEarInputOutputCurve => "RealEarInputOutputCurve_NL2",
            EntryPoint::TccInputOutputCurve => "TccInputOutputCurve_NL2",
            EntryPoint::EarSimulatorInputOutputCurve => "EarSimulatorInputOutputCurve_NL2",
            EntryPoint::SpeechOGram => "Speech_o_Gram_NL2",
            EntryPoint::AidedThreshold => "AidedThreshold_NL2",
            EntryPoint::GetReddIndiv => "GetREDDindiv",
            EntryPoint::GetReddIndiv9 => "GetREDDindiv9",
            EntryPoint::GetReurIndiv => "GetREURindiv",
            EntryPoint::GetReurIndiv9 => "GetREURindiv9",
            EntryPoint::SetReddIndiv => "SetREDDindiv",
            EntryPoint::SetReddIndiv9 => "SetREDDindiv9",
            EntryPoint::SetReurIndiv => "SetREURindiv",
            EntryPoint::SetReurIndiv9 => "SetREURindiv9",
            EntryPoint::TccCouplerGain => "TccCouplerGain_NL2",
            EntryPoint::EarSimulatorGain => "EarSimulatorGain_NL2",
            EntryPoint::GainAt => "GainAt_NL2",
            EntryPoint::GetMle => "GetMLE",
            EntryPoint::ReturnValues => "ReturnValues_NL2",
            EntryPoint::GetTubing => "GetTubing_NL2",
            EntryPoint::GetTubing9 => "GetTubing9_NL2",
            EntryPoint::GetVentOut => "GetVentOut_NL2",
            EntryPoint::GetVentOut9 => "GetVentOut9_NL2",
            EntryPoint::SpeechIntelligibility => "Get_SI_NL2",
            EntryPoint::SpeechIntelligibilityIndex => "Get_SII",
        }
    }

    /// Look up an entry point by its exported symbol name.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|entry| entry.symbol() == symbol)
    }

    pub fn convention(self) -> ResultConvention {
        match self {
            EntryPoint::GainAt
            | EntryPoint::SpeechIntelligibility
            | EntryPoint::SpeechIntelligibilityIndex => ResultConvention::Scalar,
            EntryPoint::DllVersion
            | EntryPoint::SetAdultChild
            | EntryPoint::SetExperience
            | EntryPoint::SetCompSpeed
            | EntryPoint::SetTonalLanguage
            | EntryPoint::SetGender
            | EntryPoint::CenterFrequencies
            | EntryPoint::SetBwc
            | EntryPoint::CompressionThreshold
            | EntryPoint::SetRecdhIndiv
            | EntryPoint::SetRecdhIndiv9
            | EntryPoint::SetRecdtIndiv
            | EntryPoint::SetRecdtIndiv9
            | EntryPoint::SetReddIndiv
            | EntryPoint::SetReddIndiv9
            | EntryPoint::SetReurIndiv
            | EntryPoint::SetReurIndiv9 => ResultConvention::Unit,
            _ => ResultConvention::Handle,
        }
    }

    fn bit(self) -> u64 {
        1u64 << (self as u32)
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Set of entry points exposed by one engine build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    bits: u64,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        EntryPoint::ALL.iter().copied().collect()
    }

    pub fn insert(&mut self, entry: EntryPoint) {
        self.bits |= entry.bit();
    }

    pub fn remove(&mut self, entry: EntryPoint) {
        self.bits &= !entry.bit();
    }

    pub fn contains(&self, entry: EntryPoint) -> bool {
        self.bits & entry.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn exposed(&self) -> impl Iterator<Item = EntryPoint> + '_ {
        EntryPoint::ALL
            .iter()
            .copied()
            .filter(move |entry| self.contains(*entry))
    }

    pub fn missing(&self) -> impl Iterator<Item = EntryPoint> + '_ {
        EntryPoint::ALL
            .iter()
            .copied()
            .filter(move |entry| !self.contains(*entry))
    }
}

impl FromIterator<EntryPoint> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = EntryPoint>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_order_matches_discriminants() {
        for (index, entry) in EntryPoint::ALL.iter().enumerate() {
            assert_eq!(*entry as usize, index, "{} out of order", entry);
        }
    }

    #[test]
    fn symbols_are_unique_and_resolvable() {
        for entry in EntryPoint::ALL {
            assert_eq!(EntryPoint::from_symbol(entry.symbol()), Some(entry));
        }
        assert_eq!(EntryPoint::from_symbol("NotAnEngineCall"), None);
    }

    #[test]
    fn scalar_entry_points_are_the_direct_double_returns() {
        let scalars: Vec<_> = EntryPoint::ALL
            .iter()
            .filter(|entry| entry.convention() == ResultConvention::Scalar)
            .map(|entry| entry.symbol())
            .collect();
        assert_eq!(scalars, vec!["GainAt_NL2", "Get_SI_NL2", "Get_SII"]);
        assert_eq!(EntryPoint::Mpo.convention(), ResultConvention::Handle);
        assert_eq!(
            EntryPoint::CenterFrequencies.convention(),
            ResultConvention::Unit
        );
    }

    #[test]
    fn capability_set_tracks_missing_symbols() {
        let mut caps = CapabilitySet::all();
        assert_eq!(caps.len(), EntryPoint::ALL.len());

        caps.remove(EntryPoint::DllVersion);
        assert!(!caps.contains(EntryPoint::DllVersion));
        assert!(caps.contains(EntryPoint::Mpo));
        assert_eq!(caps.missing().collect::<Vec<_>>(), vec![EntryPoint::DllVersion]);
        assert_eq!(caps.exposed().count(), EntryPoint::ALL.len() - 1);
        assert!(CapabilitySet::empty().is_empty());
    }
}
