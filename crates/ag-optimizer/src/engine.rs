//! Orchestration of calibration runs over the local and global backends.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use ag_types::{AgResult, SimulationModel, ValidationError};

use crate::cache::CacheStats;
use crate::differential_evolution::{self, DeOptions};
use crate::encoding::Encoder;
use crate::nelder_mead::{self, NelderMeadOptions};
use crate::objective::{evaluate_batch, Evaluator, Objective};
use crate::problem::ProblemSpec;
use crate::result::{OptimizationResult, SolverOutcome};

/// Lifecycle of the orchestrator. A run moves Idle → Running → one of the
/// terminal states; `reset` (or the next `run`) leaves the terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Converged,
    BudgetExhausted,
    Failed,
}

/// Which backend drives the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SolverConfig {
    /// Deterministic derivative-free local search from the start values.
    Local(NelderMeadOptions),
    /// Population-based stochastic global search.
    DifferentialEvolution(DeOptions),
}

impl SolverConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "nelder-mead",
            Self::DifferentialEvolution(_) => "differential-evolution",
        }
    }
}

/// Drives a calibration problem against one or more model handles.
///
/// The engine owns the problem spec, the objective, and the models; every
/// `run` call builds fresh per-run evaluators (and therefore fresh caches),
/// so nothing leaks between runs. Each evaluation mutates a model in place;
/// callers wanting isolated concurrent runs must hand each engine its own
/// model instances.
pub struct CalibrationEngine<M: SimulationModel + Send> {
    spec: ProblemSpec,
    objective: Objective,
    models: Vec<M>,
    state: RunState,
}

impl<M: SimulationModel + Send> CalibrationEngine<M> {
    pub fn new(spec: ProblemSpec, model: M, objective: Objective) -> Self {
        Self {
            spec,
            objective,
            models: vec![model],
            state: RunState::Idle,
        }
    }

    /// Additional model handles for worker fan-out: the global backend can
    /// use one worker per handle.
    pub fn with_worker_models(mut self, models: impl IntoIterator<Item = M>) -> Self {
        self.models.extend(models);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RunState::Idle;
    }

    pub fn spec(&self) -> &ProblemSpec {
        &self.spec
    }

    /// Reclaim the model handles.
    pub fn into_models(self) -> Vec<M> {
        self.models
    }

    /// Execute one calibration run. The previous result, if any, is simply
    /// superseded; the cache never survives across calls.
    pub fn run(&mut self, solver: &SolverConfig) -> AgResult<OptimizationResult> {
        if self.spec.is_empty() {
            return Err(ValidationError::NoVariables.into());
        }

        self.state = RunState::Running;
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let encoder = Encoder::new(self.spec.variables());

        info!(
            solver = solver.name(),
            variables = self.spec.len(),
            "starting calibration run"
        );

        match self.dispatch(solver, &encoder) {
            Ok((outcome, evaluations, cache)) => {
                let best_values = match encoder.decode(&outcome.x) {
                    Ok(values) => values,
                    Err(e) => {
                        self.state = RunState::Failed;
                        return Err(e);
                    }
                };
                self.state = if outcome.converged {
                    RunState::Converged
                } else {
                    RunState::BudgetExhausted
                };
                let result = OptimizationResult {
                    id,
                    solver: solver.name().to_string(),
                    labels: self.spec.labels(),
                    best_encoded: outcome.x,
                    best_values,
                    best_score: outcome.fx,
                    evaluations,
                    iterations: outcome.iterations,
                    converged: outcome.converged,
                    cache,
                    started_at,
                    finished_at: Utc::now(),
                };
                info!(
                    score = result.best_score,
                    evaluations = result.evaluations,
                    converged = result.converged,
                    "calibration run finished"
                );
                Ok(result)
            }
            Err(e) => {
                self.state = RunState::Failed;
                error!(error = %e, "calibration run failed");
                Err(e)
            }
        }
    }

    fn dispatch(
        &mut self,
        solver: &SolverConfig,
        encoder: &Encoder,
    ) -> AgResult<(SolverOutcome, u64, CacheStats)> {
        let spec = &self.spec;
        let objective = &self.objective;
        let bounds = encoder.solver_bounds();
        let x0 = encoder.encode(&spec.start_values())?;

        let mut evaluators: Vec<Evaluator<'_, &mut M>> = self
            .models
            .iter_mut()
            .map(|model| Evaluator::new(spec, encoder, objective, model))
            .collect();

        let outcome = match solver {
            SolverConfig::Local(options) => {
                let evaluator = &mut evaluators[0];
                nelder_mead::minimize(|x| evaluator.score(x), &x0, &bounds, options)?
            }
            SolverConfig::DifferentialEvolution(options) => {
                let requested = options.workers.max(1);
                let workers = requested.min(evaluators.len());
                if workers < requested {
                    warn!(
                        requested,
                        available = evaluators.len(),
                        "fewer model handles than requested workers"
                    );
                }
                let pool = &mut evaluators[..workers];
                let global = differential_evolution::minimize(
                    |candidates| evaluate_batch(pool, candidates),
                    Some(&x0),
                    &bounds,
                    options,
                )?;

                if options.polish {
                    // Polish reuses worker 0, so its cache carries over from
                    // the global stage within this one invocation.
                    let evaluator = &mut evaluators[0];
                    let local = nelder_mead::minimize(
                        |x| evaluator.score(x),
                        &global.x,
                        &bounds,
                        &NelderMeadOptions::default(),
                    )?;
                    SolverOutcome {
                        x: local.x,
                        fx: local.fx,
                        iterations: global.iterations + local.iterations,
                        converged: global.converged,
                    }
                } else {
                    global
                }
            }
        };

        let evaluations = evaluators.iter().map(Evaluator::evaluations).sum();
        let mut cache = CacheStats::default();
        for evaluator in &evaluators {
            cache.merge(evaluator.cache_stats());
        }
        Ok((outcome, evaluations, cache))
    }
}
