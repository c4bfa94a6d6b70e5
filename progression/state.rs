use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of tracked disease states.
pub const STATE_COUNT: usize = 5;

/// A disease state in the progression chain.
///
/// The variant order is the severity order: every state is strictly worse than the
/// ones declared before it. `Death` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiseaseState {
    /// No Evidence of Disease. Every trajectory starts here.
    #[serde(rename = "NED")]
    Ned,
    #[serde(rename = "Local Recurrence")]
    LocalRecurrence,
    #[serde(rename = "Regional Recurrence")]
    RegionalRecurrence,
    #[serde(rename = "Distant Metastasis")]
    DistantMetastasis,
    #[serde(rename = "Death")]
    Death,
}

static SEVERITY_ORDER: [DiseaseState; STATE_COUNT] = DiseaseState::ALL;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized disease state '{0}'")]
pub struct StateParseError(pub String);

impl DiseaseState {
    /// All states, least to most severe.
    pub const ALL: [DiseaseState; STATE_COUNT] = [
        DiseaseState::Ned,
        DiseaseState::LocalRecurrence,
        DiseaseState::RegionalRecurrence,
        DiseaseState::DistantMetastasis,
        DiseaseState::Death,
    ];

    /// Row/column position of this state in a transition matrix.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        SEVERITY_ORDER.get(index).copied()
    }

    /// The output key used when results are marshalled.
    pub const fn label(self) -> &'static str {
        match self {
            DiseaseState::Ned => "NED",
            DiseaseState::LocalRecurrence => "Local Recurrence",
            DiseaseState::RegionalRecurrence => "Regional Recurrence",
            DiseaseState::DistantMetastasis => "Distant Metastasis",
            DiseaseState::Death => "Death",
        }
    }

    /// Every state strictly later in the severity order.
    pub fn worse_states(self) -> &'static [DiseaseState] {
        &SEVERITY_ORDER[self.index() + 1..]
    }

    #[inline]
    pub const fn is_absorbing(self) -> bool {
        matches!(self, DiseaseState::Death)
    }
}

impl fmt::Display for DiseaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DiseaseState {
    type Err = StateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NED" => Ok(DiseaseState::Ned),
            "Local Recurrence" | "Local" => Ok(DiseaseState::LocalRecurrence),
            "Regional Recurrence" | "Regional" => Ok(DiseaseState::RegionalRecurrence),
            "Distant Metastasis" | "Distant" => Ok(DiseaseState::DistantMetastasis),
            "Death" => Ok(DiseaseState::Death),
            other => Err(StateParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_indices() {
        for (idx, state) in DiseaseState::ALL.iter().enumerate() {
            assert_eq!(state.index(), idx);
            assert_eq!(DiseaseState::from_index(idx), Some(*state));
        }
        assert_eq!(DiseaseState::from_index(STATE_COUNT), None);
        assert!(DiseaseState::Ned < DiseaseState::LocalRecurrence);
        assert!(DiseaseState::DistantMetastasis < DiseaseState::Death);
    }

    #[test]
    fn worse_states_are_strict_suffixes() {
        assert_eq!(
            DiseaseState::Ned.worse_states(),
            &[
                DiseaseState::LocalRecurrence,
                DiseaseState::RegionalRecurrence,
                DiseaseState::DistantMetastasis,
                DiseaseState::Death,
            ]
        );
        assert_eq!(
            DiseaseState::DistantMetastasis.worse_states(),
            &[DiseaseState::Death]
        );
        assert!(DiseaseState::Death.worse_states().is_empty());
    }

    #[test]
    fn labels_parse_back() {
        for state in DiseaseState::ALL {
            assert_eq!(state.label().parse::<DiseaseState>(), Ok(state));
        }
        assert_eq!("Distant".parse::<DiseaseState>(), Ok(DiseaseState::DistantMetastasis));
        assert!("Remission".parse::<DiseaseState>().is_err());
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&DiseaseState::RegionalRecurrence).expect("serialize");
        assert_eq!(json, "\"Regional Recurrence\"");
    }
}
