#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod exponential;
pub mod matrix;
pub mod metrics;
pub mod outcome;
pub mod risk;
pub mod rollout;
pub mod simulator;
pub mod state;
pub mod treatment;

#[path = "../patient/mod.rs"]
pub mod patient;

pub use matrix::TransitionMatrix;
pub use outcome::SimulationResult;
pub use patient::PatientFeatures;
pub use simulator::{ProgressionSimulator, SimulationError, SimulationMode};
pub use state::DiseaseState;
pub use treatment::TreatmentPlan;
