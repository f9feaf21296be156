//! # ag-optimizer
//!
//! Black-box calibration of crop-model parameters: decision-variable
//! registration over heterogeneous kinds (continuous, integer, categorical,
//! quantized), numeric encoding for solver arithmetic, memoized evaluation
//! of the expensive simulation, and orchestration over a local Nelder–Mead
//! backend and a global differential-evolution backend.
//!
//! Scores follow one convention throughout: **lower is better**.

mod cache;
mod differential_evolution;
mod encoding;
mod engine;
mod nelder_mead;
mod objective;
mod problem;
mod result;

#[cfg(test)]
mod test_util;

pub use cache::{CacheKey, CacheStats, EvaluationCache};
pub use differential_evolution::{minimize as differential_evolution_minimize, DeOptions, InitStrategy};
pub use encoding::Encoder;
pub use engine::{CalibrationEngine, RunState, SolverConfig};
pub use nelder_mead::{minimize as nelder_mead_minimize, NelderMeadOptions};
pub use objective::{CustomObjective, Evaluator, Objective};
pub use problem::{
    Control, DecisionVariable, Domain, FieldValue, ProblemSpec, VariableKind,
    DEFAULT_CACHE_CAPACITY,
};
pub use result::{OptimizationResult, SolverOutcome};
