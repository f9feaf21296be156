//! Result packaging for solver runs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ag_types::ParamValue;

use crate::cache::CacheStats;

/// Raw outcome of a single solver stage, in encoded space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub x: Vec<f64>,
    pub fx: f64,
    /// Solver-level iterations: simplex steps or DE generations.
    pub iterations: u64,
    pub converged: bool,
}

/// The packaged result of one `run` call. Replaced, never merged, by the
/// next call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub id: Uuid,
    pub solver: String,
    /// Ordered variable labels; index-aligned with the value vectors below.
    pub labels: Vec<String>,
    pub best_encoded: Vec<f64>,
    pub best_values: Vec<ParamValue>,
    /// Achieved score, lower is better.
    pub best_score: f64,
    /// Objective evaluations across all workers, cache hits included.
    pub evaluations: u64,
    /// Solver-level iterations: simplex steps or DE generations.
    pub iterations: u64,
    pub converged: bool,
    /// Cache counters, merged across workers.
    pub cache: CacheStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OptimizationResult {
    /// The best decoded values keyed by variable label.
    pub fn best_map(&self) -> HashMap<String, ParamValue> {
        self.labels
            .iter()
            .cloned()
            .zip(self.best_values.iter().cloned())
            .collect()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
