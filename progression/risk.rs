//! Patient-specific risk adjustment of the transition matrix.
//!
//! Clinical factors are folded into one scalar risk modifier. A damped transform
//! of that modifier lowers each non-absorbing state's self-transition
//! probability, never below a per-state floor, and the freed mass moves to the
//! strictly worse states.

use crate::matrix::TransitionMatrix;
use crate::patient::{MolecularSubtype, PatientFeatures};
use crate::state::DiseaseState;

/// Fraction of the stay probability removed per unit of adjustment factor.
const STAY_REDUCTION_RATE: f64 = 0.02;

/// Offset applied before taking the log in the adjustment factor.
const ADJUSTMENT_OFFSET: f64 = 0.3;

/// Lowest self-transition probability risk adjustment may produce for `state`.
pub fn min_stay_probability(state: DiseaseState) -> f64 {
    match state {
        DiseaseState::Ned => 0.995,
        DiseaseState::LocalRecurrence => 0.93,
        DiseaseState::RegionalRecurrence => 0.92,
        DiseaseState::DistantMetastasis => 0.97,
        DiseaseState::Death => 1.0,
    }
}

/// The subset of patient features that drives risk adjustment.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskProfile {
    pub subtype: MolecularSubtype,
    pub grade: u8,
    pub nodes_positive: u32,
}

impl Default for RiskProfile {
    fn default() -> Self {
        Self::from_features(&PatientFeatures::default())
    }
}

impl RiskProfile {
    pub fn new(subtype: MolecularSubtype, grade: u8, nodes_positive: u32) -> Self {
        Self {
            subtype,
            grade,
            nodes_positive,
        }
    }

    /// Missing fields take the defaults: unknown subtype, grade 2, no nodes.
    pub fn from_features(features: &PatientFeatures) -> Self {
        Self {
            subtype: features.subtype().clone(),
            grade: features.grade(),
            nodes_positive: features.nodes_positive(),
        }
    }

    pub fn subtype_factor(&self) -> f64 {
        match self.subtype {
            MolecularSubtype::TripleNegative => 1.20,
            MolecularSubtype::Her2Enriched => 1.15,
            MolecularSubtype::LuminalBHer2Positive => 1.10,
            MolecularSubtype::LuminalBHer2Negative => 1.05,
            _ => 1.0,
        }
    }

    pub fn grade_factor(&self) -> f64 {
        match self.grade {
            3 => 1.15,
            1 => 0.9,
            _ => 1.0,
        }
    }

    pub fn nodes_factor(&self) -> f64 {
        if self.nodes_positive > 3 {
            1.2
        } else if self.nodes_positive > 0 {
            1.1
        } else {
            1.0
        }
    }

    /// Product of the independent subtype, grade and nodal factors.
    pub fn risk_modifier(&self) -> f64 {
        self.subtype_factor() * self.grade_factor() * self.nodes_factor()
    }

    /// `ln(risk_modifier + 0.3) / 2`
    pub fn adjustment_factor(&self) -> f64 {
        (self.risk_modifier() + ADJUSTMENT_OFFSET).ln() / 2.0
    }
}

/// Returns a risk-adjusted copy of `matrix`. The input is left untouched.
///
/// A stay probability already below its floor is lifted to the floor; no mass
/// is freed and the row is renormalized afterwards.
pub fn adjust_for_risk(matrix: &TransitionMatrix, profile: &RiskProfile) -> TransitionMatrix {
    let adjustment = profile.adjustment_factor();
    log::debug!(
        "Risk modifier {:.4} (subtype {}, grade {}, nodes {}), adjustment factor {:.6}",
        profile.risk_modifier(),
        profile.subtype,
        profile.grade,
        profile.nodes_positive,
        adjustment
    );

    let mut probs = matrix.to_owned_array();
    for state in DiseaseState::ALL {
        if state.is_absorbing() {
            continue;
        }
        let s = state.index();
        let stay = probs[[s, s]];
        let new_stay =
            min_stay_probability(state).max(stay - stay * STAY_REDUCTION_RATE * adjustment);
        let freed = (stay - new_stay).max(0.0);

        let worse = state.worse_states();
        let shares: Vec<f64> = worse.iter().map(|w| probs[[s, w.index()]]).collect();
        let worse_sum: f64 = shares.iter().sum();

        if worse_sum > 0.0 {
            for (target, share) in worse.iter().zip(&shares) {
                probs[[s, target.index()]] += freed * (share / worse_sum);
            }
        } else if freed > 0.0 && !worse.is_empty() {
            let equal_share = freed / worse.len() as f64;
            for target in worse {
                probs[[s, target.index()]] += equal_share;
            }
        }

        probs[[s, s]] = new_stay;
    }

    TransitionMatrix::from_adjusted(probs)
}
