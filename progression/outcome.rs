use crate::state::{DiseaseState, STATE_COUNT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of trajectories occupying each state at the horizon.
///
/// Always carries all five states. Serializes as a JSON object keyed by the
/// state labels ("NED", "Local Recurrence", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimulationResult {
    occupancy: BTreeMap<DiseaseState, f64>,
}

impl SimulationResult {
    /// Builds occupancy fractions from final-state counts.
    pub fn from_counts(counts: &[usize; STATE_COUNT], n_simulations: usize) -> Self {
        let total = n_simulations as f64;
        let occupancy = DiseaseState::ALL
            .iter()
            .map(|&state| (state, counts[state.index()] as f64 / total))
            .collect();
        Self { occupancy }
    }

    /// Wraps precomputed shares, indexed by severity order.
    pub fn from_shares(shares: [f64; STATE_COUNT]) -> Self {
        let occupancy = DiseaseState::ALL
            .iter()
            .map(|&state| (state, shares[state.index()]))
            .collect();
        Self { occupancy }
    }

    pub fn get(&self, state: DiseaseState) -> f64 {
        self.occupancy.get(&state).copied().unwrap_or(0.0)
    }

    /// Sum over all states. 1.0 for Markov results, unconstrained for the
    /// exponential heuristic.
    pub fn total(&self) -> f64 {
        self.occupancy.values().sum()
    }

    /// 1 - P(Death).
    pub fn survival(&self) -> f64 {
        1.0 - self.get(DiseaseState::Death)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DiseaseState, f64)> + '_ {
        self.occupancy.iter().map(|(state, share)| (*state, *share))
    }
}
