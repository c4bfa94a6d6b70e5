//! Treatment-specific structural edits of the transition matrix.

use crate::matrix::TransitionMatrix;
use crate::patient::MolecularSubtype;
use crate::state::DiseaseState;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

const DEFAULT_EFFICACY: f64 = 0.6;

/// Share of P[NED][Local] moved onto P[NED][NED] by local therapies.
const SURGERY_LOCAL_REDUCTION: f64 = 0.9;
const RADIATION_LOCAL_REDUCTION: f64 = 0.85;

/// Floor for P[Local][NED] after surgical resection of a local recurrence.
const SURGICAL_CURE_PROBABILITY: f64 = 0.7;
/// Floor for P[Local][NED] under radiation.
const RADIATION_CONTROL_PROBABILITY: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TreatmentKind {
    Surgery,
    Radiation,
    Chemotherapy,
    HormoneTherapy,
    TargetedTherapy,
    /// Any unrecognized treatment type; produces no structural edit.
    Other(String),
}

impl TreatmentKind {
    pub fn parse(treatment_type: &str) -> Self {
        match treatment_type.trim() {
            "surgery" => TreatmentKind::Surgery,
            "radiation" => TreatmentKind::Radiation,
            "chemotherapy" => TreatmentKind::Chemotherapy,
            "hormone_therapy" => TreatmentKind::HormoneTherapy,
            "targeted_therapy" => TreatmentKind::TargetedTherapy,
            other => TreatmentKind::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TreatmentKind::Surgery => "surgery",
            TreatmentKind::Radiation => "radiation",
            TreatmentKind::Chemotherapy => "chemotherapy",
            TreatmentKind::HormoneTherapy => "hormone_therapy",
            TreatmentKind::TargetedTherapy => "targeted_therapy",
            TreatmentKind::Other(name) => name,
        }
    }

    /// Reported efficacy. Informational only; it never scales probabilities.
    pub fn efficacy(&self, subtype: &MolecularSubtype) -> f64 {
        match self {
            TreatmentKind::Chemotherapy => match subtype {
                MolecularSubtype::TripleNegative => 0.8,
                MolecularSubtype::Her2Enriched => 0.7,
                _ => 0.6,
            },
            TreatmentKind::HormoneTherapy => match subtype {
                MolecularSubtype::LuminalA | MolecularSubtype::LuminalB => 0.7,
                _ => 0.2,
            },
            TreatmentKind::TargetedTherapy => match subtype {
                MolecularSubtype::Her2Enriched => 0.9,
                _ => 0.4,
            },
            TreatmentKind::Surgery => 0.95,
            TreatmentKind::Radiation => 0.85,
            TreatmentKind::Other(_) => DEFAULT_EFFICACY,
        }
    }
}

impl fmt::Display for TreatmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_treatment_type() -> String {
    "unknown".to_string()
}

/// A treatment plan as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentPlan {
    #[serde(default = "default_treatment_type")]
    pub treatment_type: String,
    #[serde(default)]
    pub regimen: Option<String>,
    #[serde(default)]
    pub duration_months: Option<u32>,
}

impl Default for TreatmentPlan {
    fn default() -> Self {
        Self::new(default_treatment_type())
    }
}

impl TreatmentPlan {
    pub fn new(treatment_type: impl Into<String>) -> Self {
        Self {
            treatment_type: treatment_type.into(),
            regimen: None,
            duration_months: None,
        }
    }

    pub fn kind(&self) -> TreatmentKind {
        TreatmentKind::parse(&self.treatment_type)
    }
}

/// Result of a treatment edit: the new matrix and the efficacy reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct TreatmentAdjustment {
    pub matrix: TransitionMatrix,
    pub efficacy: f64,
}

/// Applies the structural edit for `kind` to a copy of `matrix`.
pub fn adjust_for_treatment(
    matrix: &TransitionMatrix,
    kind: &TreatmentKind,
    subtype: &MolecularSubtype,
) -> TreatmentAdjustment {
    let efficacy = kind.efficacy(subtype);
    log::debug!("Applying {kind} edit (efficacy {efficacy:.2} for subtype {subtype})");

    let mut probs = matrix.to_owned_array();
    match kind {
        TreatmentKind::Surgery => {
            shift_local_risk_to_ned(&mut probs, SURGERY_LOCAL_REDUCTION);
            raise_local_to_ned(&mut probs, SURGICAL_CURE_PROBABILITY);
        }
        TreatmentKind::Radiation => {
            shift_local_risk_to_ned(&mut probs, RADIATION_LOCAL_REDUCTION);
            raise_local_to_ned(&mut probs, RADIATION_CONTROL_PROBABILITY);
        }
        TreatmentKind::Chemotherapy => reinforce_stay(&mut probs, 0.05, 0.3),
        TreatmentKind::HormoneTherapy | TreatmentKind::TargetedTherapy => {
            reinforce_stay(&mut probs, 0.03, 0.2)
        }
        TreatmentKind::Other(name) => {
            log::debug!("No structural edit for treatment type '{name}'");
        }
    }

    TreatmentAdjustment {
        matrix: TransitionMatrix::from_adjusted(probs),
        efficacy,
    }
}

/// Moves `fraction` of P[NED][Local] onto P[NED][NED].
fn shift_local_risk_to_ned(probs: &mut Array2<f64>, fraction: f64) {
    let ned = DiseaseState::Ned.index();
    let local = DiseaseState::LocalRecurrence.index();
    let reduction = probs[[ned, local]] * fraction;
    probs[[ned, local]] -= reduction;
    probs[[ned, ned]] += reduction;
}

/// Raises P[Local][NED] to `target` when it is lower and rescales the other
/// Local-row entries to share the remaining `1 - target` by their current
/// relative weights. A row already at or above `target` is left alone.
fn raise_local_to_ned(probs: &mut Array2<f64>, target: f64) {
    let local = DiseaseState::LocalRecurrence.index();
    let ned = DiseaseState::Ned.index();
    if probs[[local, ned]] >= target {
        return;
    }
    probs[[local, ned]] = target;

    let others: f64 = (0..probs.ncols())
        .filter(|&col| col != ned)
        .map(|col| probs[[local, col]])
        .sum();
    if others > 0.0 {
        let scale = (1.0 - target) / others;
        for col in (0..probs.ncols()).filter(|&col| col != ned) {
            probs[[local, col]] *= scale;
        }
    }
}

/// For every non-absorbing row, raises the self-transition by
/// `min(cap, (1 - stay) * rate)` and shrinks the off-diagonal entries
/// proportionally so the row keeps summing to one.
fn reinforce_stay(probs: &mut Array2<f64>, cap: f64, rate: f64) {
    for state in DiseaseState::ALL {
        if state.is_absorbing() {
            continue;
        }
        let s = state.index();
        let stay = probs[[s, s]];
        let increase = cap.min((1.0 - stay) * rate);
        probs[[s, s]] = stay + increase;

        let others: f64 = (0..probs.ncols())
            .filter(|&col| col != s)
            .map(|col| probs[[s, col]])
            .sum();
        if others > 0.0 {
            let scale = (others - increase).max(0.0) / others;
            for col in (0..probs.ncols()).filter(|&col| col != s) {
                probs[[s, col]] *= scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn apply(kind: TreatmentKind) -> (TransitionMatrix, TransitionMatrix) {
        let before = TransitionMatrix::base();
        let after = adjust_for_treatment(&before, &kind, &MolecularSubtype::default()).matrix;
        (before, after)
    }

    #[test]
    fn efficacy_table() {
        let tn = MolecularSubtype::TripleNegative;
        let her2 = MolecularSubtype::Her2Enriched;
        let lum_a = MolecularSubtype::LuminalA;
        let lum_b_pos = MolecularSubtype::LuminalBHer2Positive;

        assert_abs_diff_eq!(TreatmentKind::Chemotherapy.efficacy(&tn), 0.8);
        assert_abs_diff_eq!(TreatmentKind::Chemotherapy.efficacy(&her2), 0.7);
        assert_abs_diff_eq!(TreatmentKind::Chemotherapy.efficacy(&lum_a), 0.6);
        assert_abs_diff_eq!(TreatmentKind::HormoneTherapy.efficacy(&lum_a), 0.7);
        assert_abs_diff_eq!(TreatmentKind::HormoneTherapy.efficacy(&lum_b_pos), 0.2);
        assert_abs_diff_eq!(TreatmentKind::TargetedTherapy.efficacy(&her2), 0.9);
        assert_abs_diff_eq!(TreatmentKind::TargetedTherapy.efficacy(&tn), 0.4);
        assert_abs_diff_eq!(TreatmentKind::Surgery.efficacy(&tn), 0.95);
        assert_abs_diff_eq!(TreatmentKind::Radiation.efficacy(&tn), 0.85);
        assert_abs_diff_eq!(TreatmentKind::parse("immunotherapy").efficacy(&tn), 0.6);
    }

    #[test]
    fn treatment_names_parse() {
        for name in [
            "surgery",
            "radiation",
            "chemotherapy",
            "hormone_therapy",
            "targeted_therapy",
        ] {
            let kind = TreatmentKind::parse(name);
            assert!(!matches!(kind, TreatmentKind::Other(_)));
            assert_eq!(kind.name(), name);
        }
        assert_eq!(TreatmentPlan::default().kind(), TreatmentKind::Other("unknown".into()));
    }

    #[test]
    fn surgery_edits_ned_and_local_rows() {
        let (before, after) = apply(TreatmentKind::Surgery);
        let ned = DiseaseState::Ned;
        let local = DiseaseState::LocalRecurrence;

        assert_abs_diff_eq!(after.probability(ned, ned), 0.997 + 0.0015 * 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(after.probability(ned, local), 0.0015 * 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(after.probability(local, ned), 0.7, epsilon = 1e-12);

        // Remaining 0.3 keeps the pre-edit proportions of the other columns.
        let before_others = 1.0 - before.probability(local, ned);
        for to in [
            DiseaseState::LocalRecurrence,
            DiseaseState::RegionalRecurrence,
            DiseaseState::DistantMetastasis,
            DiseaseState::Death,
        ] {
            let expected = before.probability(local, to) / before_others * 0.3;
            assert_abs_diff_eq!(after.probability(local, to), expected, epsilon = 1e-12);
        }
        after.validate().expect("surgery keeps matrix stochastic");
    }

    #[test]
    fn radiation_raises_local_control_floor() {
        let (_, after) = apply(TreatmentKind::Radiation);
        let ned = DiseaseState::Ned;
        let local = DiseaseState::LocalRecurrence;
        assert_abs_diff_eq!(after.probability(ned, ned), 0.997 + 0.0015 * 0.85, epsilon = 1e-12);
        assert_abs_diff_eq!(after.probability(local, ned), 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(after.row(local).sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn radiation_keeps_existing_high_local_control() {
        let matrix = TransitionMatrix::from_rows([
            [0.997, 0.0015, 0.0008, 0.0005, 0.0002],
            [0.4, 0.58, 0.01, 0.005, 0.005],
            [0.02, 0.03, 0.92, 0.02, 0.01],
            [0.001, 0.002, 0.007, 0.98, 0.01],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
        .expect("valid matrix");
        let after = adjust_for_treatment(
            &matrix,
            &TreatmentKind::Radiation,
            &MolecularSubtype::default(),
        )
        .matrix;
        assert_abs_diff_eq!(
            after.probability(DiseaseState::LocalRecurrence, DiseaseState::Ned),
            0.4,
            epsilon = 1e-12
        );
    }

    #[test]
    fn surgery_keeps_local_control_above_its_floor() {
        let matrix = TransitionMatrix::from_rows([
            [0.997, 0.0015, 0.0008, 0.0005, 0.0002],
            [0.9, 0.08, 0.01, 0.005, 0.005],
            [0.02, 0.03, 0.92, 0.02, 0.01],
            [0.001, 0.002, 0.007, 0.98, 0.01],
            [0.0, 0.0, 0.0, 0.0, 1.0],
        ])
        .expect("valid matrix");
        let after =
            adjust_for_treatment(&matrix, &TreatmentKind::Surgery, &MolecularSubtype::default())
                .matrix;
        let local = DiseaseState::LocalRecurrence;
        assert_abs_diff_eq!(after.probability(local, DiseaseState::Ned), 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(after.probability(local, local), 0.08, epsilon = 1e-12);
        after.validate().expect("surgery keeps matrix stochastic");
    }

    #[test]
    fn systemic_therapies_never_lower_self_transitions() {
        for kind in [
            TreatmentKind::Chemotherapy,
            TreatmentKind::HormoneTherapy,
            TreatmentKind::TargetedTherapy,
        ] {
            let (before, after) = apply(kind.clone());
            for state in DiseaseState::ALL {
                assert!(
                    after.probability(state, state) >= before.probability(state, state),
                    "{kind} lowered the {state} self-transition"
                );
            }
            after.validate().expect("systemic edit keeps matrix stochastic");
        }
    }

    #[test]
    fn chemotherapy_increase_is_capped() {
        let (_, after) = apply(TreatmentKind::Chemotherapy);
        // Local: (1 - 0.93) * 0.3 = 0.021 < 0.05.
        assert_abs_diff_eq!(
            after.probability(DiseaseState::LocalRecurrence, DiseaseState::LocalRecurrence),
            0.951,
            epsilon = 1e-12
        );
        // NED: (1 - 0.997) * 0.3 = 0.0009.
        assert_abs_diff_eq!(
            after.probability(DiseaseState::Ned, DiseaseState::Ned),
            0.9979,
            epsilon = 1e-12
        );
    }

    #[test]
    fn unknown_treatment_is_identity() {
        let (before, after) = apply(TreatmentKind::parse("acupuncture"));
        assert_eq!(before, after);
    }

    #[test]
    fn death_row_is_never_edited() {
        for name in ["surgery", "radiation", "chemotherapy", "hormone_therapy"] {
            let (_, after) = apply(TreatmentKind::parse(name));
            assert_eq!(
                after.probability(DiseaseState::Death, DiseaseState::Death),
                1.0
            );
        }
    }
}
