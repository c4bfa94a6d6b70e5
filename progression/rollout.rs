//! Monte Carlo rollout of the progression chain.
//!
//! Trials are split into fixed-size batches. One seed per batch is drawn, in
//! order, from the caller's generator; batches then run on the rayon pool with
//! their own `StdRng`. The outcome depends only on the caller's seed, never on
//! the number of worker threads or the order batches finish in.

use crate::matrix::TransitionMatrix;
use crate::outcome::SimulationResult;
use crate::simulator::SimulationError;
use crate::state::{DiseaseState, STATE_COUNT};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Trajectories simulated per independently seeded batch.
pub const TRIALS_PER_BATCH: usize = 2048;

/// One categorical sampler per from-state.
struct RowSamplers {
    rows: Vec<WeightedIndex<f64>>,
}

impl RowSamplers {
    fn new(matrix: &TransitionMatrix) -> Result<Self, SimulationError> {
        let rows = DiseaseState::ALL
            .iter()
            .map(|&state| {
                WeightedIndex::new(matrix.row(state).iter().copied())
                    .map_err(|source| SimulationError::Sampling { state, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    #[inline]
    fn step<R: Rng + ?Sized>(&self, from: DiseaseState, rng: &mut R) -> DiseaseState {
        let next = self.rows[from.index()].sample(rng);
        DiseaseState::ALL[next]
    }

    /// Runs `trials` trajectories of `months` steps from NED and counts the
    /// final states.
    fn run_batch(&self, months: u32, trials: usize, seed: u64) -> [usize; STATE_COUNT] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = [0usize; STATE_COUNT];
        for _ in 0..trials {
            let mut state = DiseaseState::Ned;
            for _ in 0..months {
                if state.is_absorbing() {
                    break;
                }
                state = self.step(state, &mut rng);
            }
            counts[state.index()] += 1;
        }
        counts
    }
}

/// Simulates `n_simulations` independent trajectories over `matrix` for
/// `months` monthly steps, starting in NED, and returns final-state occupancy.
pub fn rollout<R: Rng + ?Sized>(
    matrix: &TransitionMatrix,
    months: u32,
    n_simulations: usize,
    rng: &mut R,
) -> Result<SimulationResult, SimulationError> {
    if n_simulations == 0 {
        return Err(SimulationError::NoSimulations);
    }
    let samplers = RowSamplers::new(matrix)?;

    let batches: Vec<(u64, usize)> = (0..n_simulations)
        .step_by(TRIALS_PER_BATCH)
        .map(|start| {
            let size = TRIALS_PER_BATCH.min(n_simulations - start);
            (rng.next_u64(), size)
        })
        .collect();

    let counts = batches
        .into_par_iter()
        .map(|(seed, size)| samplers.run_batch(months, size, seed))
        .reduce(
            || [0usize; STATE_COUNT],
            |mut acc, batch| {
                for (total, count) in acc.iter_mut().zip(batch) {
                    *total += count;
                }
                acc
            },
        );

    Ok(SimulationResult::from_counts(&counts, n_simulations))
}
