//! Deterministic exponential projection.
//!
//! A closed-form alternative to the Markov rollout: tumor growth follows a
//! per-patient exponential rate and survival comes from a stage heuristic. The
//! five state shares derived from survival are independent heuristics and are
//! not normalized; their sum is generally not 1.

use crate::outcome::SimulationResult;
use crate::patient::{MolecularSubtype, PatientFeatures};
use serde::{Deserialize, Serialize};

/// Monthly growth before grade/subtype multipliers.
const BASE_GROWTH_RATE: f64 = 0.03;

/// Initial size assumed for the growth trajectory when none is recorded.
const DEFAULT_TRAJECTORY_SIZE_MM: f64 = 10.0;
/// Size assumed for staging when none is recorded.
const DEFAULT_STAGING_SIZE_MM: f64 = 20.0;

/// Months the five-year survival anchors refer to.
const ANCHOR_MONTHS: f64 = 60.0;

/// Everything the exponential mode produces for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExponentialProjection {
    pub growth_rate: f64,
    /// Tumor size at months 0 through the horizon, inclusive.
    pub tumor_sizes_mm: Vec<f64>,
    pub survival_probability: f64,
    pub states: SimulationResult,
}

/// Monthly tumor growth rate.
pub fn growth_rate(features: &PatientFeatures) -> f64 {
    let grade_factor = match features.grade() {
        1 => 0.7,
        3 => 1.5,
        _ => 1.0,
    };
    let subtype_factor = match features.subtype() {
        MolecularSubtype::TripleNegative => 1.6,
        MolecularSubtype::Her2Enriched => 1.4,
        _ => 1.0,
    };
    BASE_GROWTH_RATE * grade_factor * subtype_factor
}

/// Projected tumor size for each month from 0 to `months`.
pub fn tumor_trajectory(features: &PatientFeatures, months: u32) -> Vec<f64> {
    let initial = features.tumor_size_mm.unwrap_or(DEFAULT_TRAJECTORY_SIZE_MM);
    let rate = growth_rate(features);
    (0..=months)
        .map(|month| initial * (rate * f64::from(month)).exp())
        .collect()
}

/// Five-year survival anchor from a nodal/size staging heuristic.
pub fn five_year_survival_anchor(features: &PatientFeatures) -> f64 {
    let nodes = features.nodes_positive();
    let size = features.tumor_size_mm.unwrap_or(DEFAULT_STAGING_SIZE_MM);
    if nodes == 0 && size <= 20.0 {
        0.98
    } else if nodes <= 3 && size <= 50.0 {
        0.90
    } else if nodes <= 9 || size <= 70.0 {
        0.72
    } else {
        0.30
    }
}

/// Probability of surviving `months` months. Never exceeds 1.
pub fn survival_probability(features: &PatientFeatures, months: u32) -> f64 {
    let mut monthly = five_year_survival_anchor(features).powf(1.0 / ANCHOR_MONTHS);

    if features.er_status().is_positive() || features.pr_status().is_positive() {
        monthly *= 1.002;
    }
    if features.her2_status().is_positive() {
        monthly *= 1.001;
    }
    match features.grade() {
        3 => monthly *= 0.998,
        1 => monthly *= 1.002,
        _ => {}
    }
    if features.age() > 70 {
        monthly *= 0.999;
    }

    // The favourable multipliers can push a stage-I monthly rate past 1.
    monthly.min(1.0).powf(f64::from(months))
}

/// Heuristic state shares derived from a survival probability.
pub fn state_shares(survival: f64) -> SimulationResult {
    let mortality = 1.0 - survival;
    SimulationResult::from_shares([
        0.78_f64.max(survival - 0.08),
        0.05_f64.min(mortality * 0.3),
        0.03_f64.min(mortality * 0.2),
        0.05_f64.min(mortality * 0.3),
        0.15_f64.min(mortality),
    ])
}

pub fn project(features: &PatientFeatures, months: u32) -> ExponentialProjection {
    let survival = survival_probability(features, months);
    ExponentialProjection {
        growth_rate: growth_rate(features),
        tumor_sizes_mm: tumor_trajectory(features, months),
        survival_probability: survival,
        states: state_shares(survival),
    }
}
