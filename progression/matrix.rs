use crate::state::{DiseaseState, STATE_COUNT};
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::BTreeMap;
use thiserror::Error;

/// Maximum tolerated deviation of a row sum from 1.0 for a valid matrix.
pub const ROW_SUM_TOLERANCE: f64 = 1e-9;

/// Row-sum drift beyond which an adjusted row is divided by its sum.
pub const RENORMALIZE_TOLERANCE: f64 = 1e-10;

/// Monthly transition probabilities, rows in severity order (from-state), columns
/// likewise (to-state).
const BASE_TRANSITIONS: [[f64; STATE_COUNT]; STATE_COUNT] = [
    [0.997, 0.0015, 0.0008, 0.0005, 0.0002],
    [0.05, 0.93, 0.01, 0.005, 0.005],
    [0.02, 0.03, 0.92, 0.02, 0.01],
    [0.001, 0.002, 0.007, 0.98, 0.01],
    [0.0, 0.0, 0.0, 0.0, 1.0],
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatrixError {
    #[error("transition matrix must be {expected}x{expected}, found {rows}x{cols}")]
    Shape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
    #[error("transition {from} -> {to} has invalid probability {value}")]
    InvalidProbability {
        from: DiseaseState,
        to: DiseaseState,
        value: f64,
    },
    #[error("row {state} sums to {sum}, expected 1.0")]
    RowSum { state: DiseaseState, sum: f64 },
    #[error("the Death row must be absorbing")]
    DeathNotAbsorbing,
}

/// A row-stochastic matrix over the five disease states.
///
/// Instances are immutable. Every adjustment in this crate takes a reference and
/// returns a fresh matrix, so one matrix can be shared by concurrent rollouts.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionMatrix {
    probs: Array2<f64>,
}

impl TransitionMatrix {
    /// The canonical monthly transition matrix before any patient or treatment
    /// adjustment.
    pub fn base() -> Self {
        let probs = Array2::from_shape_fn((STATE_COUNT, STATE_COUNT), |(i, j)| {
            BASE_TRANSITIONS[i][j]
        });
        Self { probs }
    }

    /// Builds a matrix from explicit rows, rejecting anything that is not
    /// row-stochastic or whose Death row is not the identity row.
    pub fn from_rows(rows: [[f64; STATE_COUNT]; STATE_COUNT]) -> Result<Self, MatrixError> {
        let probs = Array2::from_shape_fn((STATE_COUNT, STATE_COUNT), |(i, j)| rows[i][j]);
        Self::from_array(probs)
    }

    pub fn from_array(probs: Array2<f64>) -> Result<Self, MatrixError> {
        let (rows, cols) = probs.dim();
        if rows != STATE_COUNT || cols != STATE_COUNT {
            return Err(MatrixError::Shape {
                expected: STATE_COUNT,
                rows,
                cols,
            });
        }
        let matrix = Self { probs };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Wraps the output of an adjustment pass: rows drifting further than
    /// [`RENORMALIZE_TOLERANCE`] from 1.0 are divided by their sum.
    pub(crate) fn from_adjusted(mut probs: Array2<f64>) -> Self {
        renormalize_rows(&mut probs, RENORMALIZE_TOLERANCE);
        let matrix = Self { probs };
        debug_assert!(matrix.validate().is_ok(), "adjustment broke the matrix invariants");
        matrix
    }

    /// A copy whose rows are divided by their sums wherever the sum drifts from
    /// 1.0 by more than `tolerance`.
    pub fn renormalized(&self, tolerance: f64) -> Self {
        let mut probs = self.probs.clone();
        renormalize_rows(&mut probs, tolerance);
        Self { probs }
    }

    /// A mutable working copy for adjustment passes.
    pub(crate) fn to_owned_array(&self) -> Array2<f64> {
        self.probs.clone()
    }

    #[inline]
    pub fn probability(&self, from: DiseaseState, to: DiseaseState) -> f64 {
        self.probs[[from.index(), to.index()]]
    }

    pub fn row(&self, from: DiseaseState) -> ArrayView1<'_, f64> {
        self.probs.row(from.index())
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.probs
    }

    /// Checks the row-stochastic and absorbing-state invariants.
    pub fn validate(&self) -> Result<(), MatrixError> {
        for from in DiseaseState::ALL {
            let row = self.row(from);
            for to in DiseaseState::ALL {
                let value = row[to.index()];
                if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                    return Err(MatrixError::InvalidProbability { from, to, value });
                }
            }
            let sum = row.sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(MatrixError::RowSum { state: from, sum });
            }
        }

        let death = self.row(DiseaseState::Death);
        let absorbing = DiseaseState::ALL.iter().all(|&to| {
            let expected = if to.is_absorbing() { 1.0 } else { 0.0 };
            death[to.index()] == expected
        });
        if !absorbing {
            return Err(MatrixError::DeathNotAbsorbing);
        }
        Ok(())
    }

    /// Nested `from -> to -> probability` view used for JSON output.
    pub fn to_nested_map(&self) -> BTreeMap<DiseaseState, BTreeMap<DiseaseState, f64>> {
        DiseaseState::ALL
            .iter()
            .map(|&from| {
                let row = DiseaseState::ALL
                    .iter()
                    .map(|&to| (to, self.probability(from, to)))
                    .collect();
                (from, row)
            })
            .collect()
    }
}

/// Divides each row by its sum when the sum has drifted past `tolerance`.
/// Rows with a non-positive sum are left untouched.
fn renormalize_rows(probs: &mut Array2<f64>, tolerance: f64) {
    for (idx, mut row) in probs.axis_iter_mut(Axis(0)).enumerate() {
        let total = row.sum();
        if (total - 1.0).abs() > tolerance && total > 0.0 {
            if let Some(state) = DiseaseState::from_index(idx) {
                log::debug!("Renormalizing {} row (sum was {:.12})", state, total);
            }
            row.mapv_inplace(|p| p / total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn base_matrix_is_valid() {
        let base = TransitionMatrix::base();
        base.validate().expect("base matrix must be row-stochastic");
        assert_abs_diff_eq!(
            base.probability(DiseaseState::Ned, DiseaseState::Ned),
            0.997
        );
        assert_abs_diff_eq!(
            base.probability(DiseaseState::DistantMetastasis, DiseaseState::RegionalRecurrence),
            0.007
        );
        assert_abs_diff_eq!(
            base.probability(DiseaseState::Death, DiseaseState::Death),
            1.0
        );
    }

    #[test]
    fn from_rows_rejects_non_stochastic_rows() {
        let mut rows = BASE_TRANSITIONS;
        rows[1][1] = 0.5;
        match TransitionMatrix::from_rows(rows) {
            Err(MatrixError::RowSum { state, .. }) => {
                assert_eq!(state, DiseaseState::LocalRecurrence)
            }
            other => panic!("expected row-sum error, got {other:?}"),
        }
    }

    #[test]
    fn from_rows_rejects_leaky_death_row() {
        let mut rows = BASE_TRANSITIONS;
        rows[4] = [0.1, 0.0, 0.0, 0.0, 0.9];
        assert_eq!(
            TransitionMatrix::from_rows(rows),
            Err(MatrixError::DeathNotAbsorbing)
        );
    }

    #[test]
    fn from_rows_rejects_negative_entries() {
        let mut rows = BASE_TRANSITIONS;
        rows[0][1] = -0.0015;
        rows[0][0] = 1.0;
        rows[0][2] += 0.0015;
        assert!(matches!(
            TransitionMatrix::from_rows(rows),
            Err(MatrixError::InvalidProbability { .. })
        ));
    }

    #[test]
    fn from_array_rejects_wrong_shape() {
        let probs = Array2::<f64>::eye(4);
        assert!(matches!(
            TransitionMatrix::from_array(probs),
            Err(MatrixError::Shape { rows: 4, cols: 4, .. })
        ));
    }

    #[test]
    fn from_adjusted_renormalizes_drifting_rows() {
        let mut probs = TransitionMatrix::base().to_owned_array();
        probs[[0, 0]] += 0.5;
        let matrix = TransitionMatrix::from_adjusted(probs);
        assert_abs_diff_eq!(matrix.row(DiseaseState::Ned).sum(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            matrix.probability(DiseaseState::Ned, DiseaseState::Ned),
            1.497 / 1.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn renormalized_respects_tolerance() {
        let base = TransitionMatrix::base();
        assert_eq!(base.renormalized(RENORMALIZE_TOLERANCE), base);

        let mut probs = base.to_owned_array();
        probs[[1, 1]] += 1e-6;
        let drifted = TransitionMatrix { probs };
        let within = drifted.renormalized(1e-3);
        assert_eq!(within, drifted);
        let fixed = drifted.renormalized(RENORMALIZE_TOLERANCE);
        assert_abs_diff_eq!(
            fixed.row(DiseaseState::LocalRecurrence).sum(),
            1.0,
            epsilon = 1e-12
        );
        fixed.validate().expect("renormalized matrix is stochastic");
    }

    #[test]
    fn nested_map_covers_every_pair() {
        let map = TransitionMatrix::base().to_nested_map();
        assert_eq!(map.len(), STATE_COUNT);
        assert!(map.values().all(|row| row.len() == STATE_COUNT));
        assert_abs_diff_eq!(
            map[&DiseaseState::RegionalRecurrence][&DiseaseState::LocalRecurrence],
            0.03
        );
    }
}
