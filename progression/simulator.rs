//! The progression simulator: composes the matrix builders with the rollout,
//! or evaluates the exponential projection.

use crate::exponential;
use crate::matrix::{MatrixError, TransitionMatrix};
use crate::outcome::SimulationResult;
use crate::patient::PatientFeatures;
use crate::risk::{RiskProfile, adjust_for_risk};
use crate::rollout::rollout;
use crate::state::DiseaseState;
use crate::treatment::{TreatmentPlan, adjust_for_treatment};
use rand::Rng;
use rand::distributions::WeightedError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MONTHS: u32 = 60;
pub const DEFAULT_SIMULATIONS: usize = 100;
pub const MONTHS_PER_YEAR: u32 = 12;

#[derive(Error, Debug)]
pub enum SimulationError {
    /// An unrecognized simulation mode was requested.
    #[error("Unknown simulation type: {0}")]
    Configuration(String),
    #[error("At least one simulation run is required")]
    NoSimulations,
    #[error("Cannot sample transitions out of {state}: {source}")]
    Sampling {
        state: DiseaseState,
        source: WeightedError,
    },
    #[error("A {years}-year horizon does not fit in a month count")]
    HorizonTooLong { years: u32 },
    #[error("Invalid transition matrix: {0}")]
    Matrix(#[from] MatrixError),
}

/// How progression is projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Monte Carlo rollout of the adjusted Markov chain.
    #[default]
    Markov,
    /// Closed-form growth and survival heuristic; no sampling.
    Exponential,
}

impl SimulationMode {
    pub fn name(self) -> &'static str {
        match self {
            SimulationMode::Markov => "markov",
            SimulationMode::Exponential => "exponential",
        }
    }
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SimulationMode {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "markov" => Ok(SimulationMode::Markov),
            "exponential" => Ok(SimulationMode::Exponential),
            other => Err(SimulationError::Configuration(other.to_string())),
        }
    }
}

/// Stateless apart from its mode; every call builds its own matrix, so one
/// simulator can serve concurrent requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressionSimulator {
    mode: SimulationMode,
}

impl ProgressionSimulator {
    pub fn new(mode: SimulationMode) -> Self {
        Self { mode }
    }

    /// Fails with [`SimulationError::Configuration`] for anything other than
    /// "markov" or "exponential".
    pub fn from_mode_name(name: &str) -> Result<Self, SimulationError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Base matrix, risk-adjusted for the patient, then edited for the plan's
    /// treatment when a plan is given.
    pub fn markov_matrix(
        &self,
        features: &PatientFeatures,
        plan: Option<&TreatmentPlan>,
    ) -> TransitionMatrix {
        let profile = RiskProfile::from_features(features);
        let adjusted = adjust_for_risk(&TransitionMatrix::base(), &profile);
        match plan {
            Some(plan) => {
                let kind = plan.kind();
                let treated = adjust_for_treatment(&adjusted, &kind, features.subtype());
                log::debug!(
                    "Treatment '{}' applied with efficacy {:.2}",
                    kind,
                    treated.efficacy
                );
                treated.matrix
            }
            None => adjusted,
        }
    }

    /// Projects state occupancy `months` months out.
    ///
    /// In Markov mode this runs `n_simulations` trajectories drawing randomness
    /// from `rng`. The exponential mode ignores both and is deterministic.
    pub fn simulate_progression<R: Rng + ?Sized>(
        &self,
        features: &PatientFeatures,
        plan: Option<&TreatmentPlan>,
        months: u32,
        n_simulations: usize,
        rng: &mut R,
    ) -> Result<SimulationResult, SimulationError> {
        match self.mode {
            SimulationMode::Markov => {
                let matrix = self.markov_matrix(features, plan);
                let result = rollout(&matrix, months, n_simulations, rng)?;
                log::info!(
                    "Markov rollout: {} trajectories over {} months, NED {:.4}, Death {:.4}",
                    n_simulations,
                    months,
                    result.get(DiseaseState::Ned),
                    result.get(DiseaseState::Death)
                );
                Ok(result)
            }
            SimulationMode::Exponential => {
                let survival = exponential::survival_probability(features, months);
                log::info!(
                    "Exponential projection over {} months, survival {:.4}",
                    months,
                    survival
                );
                Ok(exponential::state_shares(survival))
            }
        }
    }

    /// Survival (1 - P(Death)) at each whole year from 0 to `years`, always
    /// estimated with the Markov rollout. Fails before sampling when
    /// `years * 12` overflows.
    pub fn survival_curve<R: Rng + ?Sized>(
        &self,
        features: &PatientFeatures,
        plan: Option<&TreatmentPlan>,
        years: u32,
        n_simulations: usize,
        rng: &mut R,
    ) -> Result<BTreeMap<u32, f64>, SimulationError> {
        years
            .checked_mul(MONTHS_PER_YEAR)
            .ok_or(SimulationError::HorizonTooLong { years })?;
        let matrix = self.markov_matrix(features, plan);
        let mut curve = BTreeMap::new();
        for year in 0..=years {
            let occupancy = rollout(&matrix, year * MONTHS_PER_YEAR, n_simulations, rng)?;
            curve.insert(year, occupancy.survival());
        }
        Ok(curve)
    }
}
