//! Turning a nominal solver vector into a scalar score.

use rayon::prelude::*;

use ag_metrics::Metric;
use ag_types::{AgResult, ModelError, ParamValue, ResultsTable, SimulationModel};

use crate::cache::{CacheKey, CacheStats, EvaluationCache};
use crate::encoding::Encoder;
use crate::problem::{DecisionVariable, FieldValue, ProblemSpec};

/// User-supplied scoring of the simulation output. Lower is better; callers
/// wanting to maximize a quantity negate it here.
pub type CustomObjective = Box<dyn Fn(&ResultsTable) -> AgResult<f64> + Send + Sync>;

/// The scalar objective of a calibration problem.
///
/// Every objective scores under one convention: **lower is better**. Metric
/// objectives are oriented through [`Metric::loss`]; custom objectives must
/// orient themselves.
pub enum Objective {
    /// Compare a results-table column against a reference series.
    Metric {
        metric: Metric,
        observed: Vec<f64>,
        predicted_column: String,
    },
    Custom(CustomObjective),
}

impl Objective {
    pub fn metric(metric: Metric, observed: Vec<f64>, predicted_column: impl Into<String>) -> Self {
        Self::Metric {
            metric,
            observed,
            predicted_column: predicted_column.into(),
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&ResultsTable) -> AgResult<f64> + Send + Sync + 'static,
    {
        Self::Custom(Box::new(f))
    }

    /// Score the last run's output.
    pub fn score(&self, results: &ResultsTable) -> AgResult<f64> {
        match self {
            Self::Metric {
                metric,
                observed,
                predicted_column,
            } => {
                let predicted =
                    results
                        .column(predicted_column)
                        .ok_or_else(|| ModelError::MissingColumn {
                            column: predicted_column.clone(),
                        })?;
                Ok(metric.loss(observed, &predicted)?)
            }
            Self::Custom(f) => f(results),
        }
    }
}

impl std::fmt::Debug for Objective {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metric {
                metric,
                predicted_column,
                observed,
            } => f
                .debug_struct("Metric")
                .field("metric", &metric.name())
                .field("predicted_column", predicted_column)
                .field("observed_len", &observed.len())
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Per-run evaluation context: owns one model handle, one cache, and one
/// evaluation counter. Built fresh for every solver invocation, so no state
/// leaks between runs.
pub struct Evaluator<'a, M: SimulationModel> {
    variables: &'a [DecisionVariable],
    encoder: &'a Encoder,
    objective: &'a Objective,
    model: M,
    cache: EvaluationCache,
    evaluations: u64,
}

impl<'a, M: SimulationModel> Evaluator<'a, M> {
    pub fn new(
        spec: &'a ProblemSpec,
        encoder: &'a Encoder,
        objective: &'a Objective,
        model: M,
    ) -> Self {
        Self {
            variables: spec.variables(),
            encoder,
            objective,
            model,
            cache: EvaluationCache::new(spec.cache_capacity()),
            evaluations: 0,
        }
    }

    /// Objective evaluations so far, cache hits included.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Score one encoded candidate: decode, consult the cache, and on a miss
    /// apply the decoded values to the model, run it, and score the output.
    /// Model errors propagate unwrapped; there are no retries here.
    pub fn score(&mut self, x: &[f64]) -> AgResult<f64> {
        self.evaluations += 1;
        let decoded = self.encoder.decode(x)?;
        let key = CacheKey::from_values(&decoded);
        if let Some(score) = self.cache.get(&key) {
            return Ok(score);
        }

        self.apply_to_model(&decoded)?;
        self.model.run()?;
        let score = self.objective.score(self.model.results())?;
        self.cache.put(key, score);
        Ok(score)
    }

    fn apply_to_model(&mut self, decoded: &[ParamValue]) -> AgResult<()> {
        for (variable, value) in self.variables.iter().zip(decoded) {
            let values: Vec<(String, ParamValue)> = variable
                .fields
                .iter()
                .map(|(name, field)| match field {
                    FieldValue::Free => (name.clone(), value.clone()),
                    FieldValue::Fixed(fixed) => (name.clone(), fixed.clone()),
                })
                .collect();
            self.model.apply(&variable.path, &values)?;
        }
        Ok(())
    }
}

/// Score a whole candidate batch, fanning out across the given evaluators.
///
/// Candidates are dealt round-robin; each evaluator works its share on its
/// own model handle, cache, and counter, so nothing is shared mutably. With
/// a single evaluator this degenerates to a plain sequential loop.
pub(crate) fn evaluate_batch<M: SimulationModel + Send>(
    evaluators: &mut [Evaluator<'_, M>],
    candidates: &[Vec<f64>],
) -> AgResult<Vec<f64>> {
    debug_assert!(!evaluators.is_empty());
    if evaluators.len() == 1 {
        let evaluator = &mut evaluators[0];
        return candidates.iter().map(|x| evaluator.score(x)).collect();
    }

    let workers = evaluators.len();
    let mut assignments: Vec<Vec<usize>> = vec![Vec::new(); workers];
    for idx in 0..candidates.len() {
        assignments[idx % workers].push(idx);
    }

    let partials: AgResult<Vec<Vec<(usize, f64)>>> = evaluators
        .par_iter_mut()
        .zip(assignments)
        .map(|(evaluator, indices)| {
            indices
                .into_iter()
                .map(|idx| evaluator.score(&candidates[idx]).map(|score| (idx, score)))
                .collect()
        })
        .collect();

    let mut scores = vec![0.0; candidates.len()];
    for part in partials? {
        for (idx, score) in part {
            scores[idx] = score;
        }
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{Control, VariableKind};
    use crate::test_util::StubModel;

    fn one_var_spec() -> ProblemSpec {
        let mut spec = ProblemSpec::new();
        spec.add_control(
            Control::new(".paddock.sow", VariableKind::Continuous)
                .free("Amount")
                .bounds(0.0, 300.0)
                .start(100.0),
        )
        .unwrap();
        spec
    }

    #[test]
    fn metric_objective_scores_table_column() {
        let mut table = ResultsTable::new(vec!["Yield".into()]);
        table.push_row(vec![3.0]);
        table.push_row(vec![4.0]);

        let objective = Objective::metric(Metric::Rmse, vec![0.0, 0.0], "Yield");
        let score = objective.score(&table).unwrap();
        assert!((score - 3.5355339059327378).abs() < 1e-9);
    }

    #[test]
    fn missing_column_fails() {
        let table = ResultsTable::new(vec!["Yield".into()]);
        let objective = Objective::metric(Metric::Rmse, vec![1.0], "Biomass");
        match objective.score(&table).unwrap_err() {
            ag_types::AgError::Model(ModelError::MissingColumn { column }) => {
                assert_eq!(column, "Biomass");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn evaluator_applies_decoded_and_fixed_fields() {
        let mut spec = ProblemSpec::new();
        spec.add_control(
            Control::new(".paddock.soil", VariableKind::Continuous)
                .free("Carbon")
                .fixed("FBiom", 0.03)
                .bounds(0.0, 2.0),
        )
        .unwrap();
        let encoder = Encoder::new(spec.variables());
        let objective = Objective::custom(|_| Ok(0.0));
        let mut evaluator = Evaluator::new(&spec, &encoder, &objective, StubModel::new());

        evaluator.score(&[1.25]).unwrap();
        assert_eq!(evaluator.model.numeric("Carbon"), Some(1.25));
        assert_eq!(evaluator.model.numeric("FBiom"), Some(0.03));
    }

    #[test]
    fn evaluator_applies_categorical_labels_as_text() {
        let mut spec = ProblemSpec::new();
        spec.add_control(
            Control::new(".paddock.sow", VariableKind::Categorical)
                .free("CultivarName")
                .categories(["early", "medium", "late"]),
        )
        .unwrap();
        let encoder = Encoder::new(spec.variables());
        let objective = Objective::custom(|_| Ok(0.0));
        let mut evaluator = Evaluator::new(&spec, &encoder, &objective, StubModel::new());

        evaluator.score(&[2.0]).unwrap();
        assert_eq!(evaluator.model.text("CultivarName"), Some("late"));
    }

    #[test]
    fn cached_coordinates_skip_the_model() {
        let spec = one_var_spec();
        let encoder = Encoder::new(spec.variables());
        let objective =
            Objective::custom(|t| Ok((t.column_mean("Amount").unwrap_or(f64::NAN) - 7.0).powi(2)));
        let mut evaluator = Evaluator::new(&spec, &encoder, &objective, StubModel::new());

        let first = evaluator.score(&[120.0]).unwrap();
        assert_eq!(evaluator.model.runs, 1);

        let second = evaluator.score(&[120.0]).unwrap();
        assert_eq!(second, first);
        // The external model was not invoked a second time.
        assert_eq!(evaluator.model.runs, 1);
        assert_eq!(evaluator.evaluations(), 2);
        assert_eq!(evaluator.cache_stats().hits, 1);
    }

    #[test]
    fn encodings_with_float_noise_share_a_slot() {
        let spec = one_var_spec();
        let encoder = Encoder::new(spec.variables());
        let objective = Objective::custom(|_| Ok(1.0));
        let mut evaluator = Evaluator::new(&spec, &encoder, &objective, StubModel::new());

        evaluator.score(&[120.000_04]).unwrap();
        evaluator.score(&[120.000_01]).unwrap();
        // Both decode to 120.0 at 1e-4 precision: one model run only.
        assert_eq!(evaluator.model.runs, 1);
    }

    #[test]
    fn model_errors_propagate_unwrapped() {
        let mut spec = ProblemSpec::new();
        spec.add_control(
            Control::new(".missing.node", VariableKind::Continuous)
                .free("Amount")
                .bounds(0.0, 10.0),
        )
        .unwrap();
        let encoder = Encoder::new(spec.variables());
        let objective = Objective::custom(|_| Ok(0.0));
        let mut evaluator = Evaluator::new(&spec, &encoder, &objective, StubModel::new());

        match evaluator.score(&[1.0]).unwrap_err() {
            ag_types::AgError::Model(ModelError::NodeNotFound { path }) => {
                assert_eq!(path, ".missing.node");
            }
            other => panic!("expected NodeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn batch_evaluation_matches_sequential() {
        let spec = one_var_spec();
        let encoder = Encoder::new(spec.variables());
        let objective =
            Objective::custom(|t| Ok((t.column_mean("Amount").unwrap_or(f64::NAN) - 7.0).powi(2)));

        let candidates: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64 * 10.0]).collect();

        let mut single = vec![Evaluator::new(
            &spec,
            &encoder,
            &objective,
            StubModel::new(),
        )];
        let sequential = evaluate_batch(&mut single, &candidates).unwrap();

        let mut pool = vec![
            Evaluator::new(&spec, &encoder, &objective, StubModel::new()),
            Evaluator::new(&spec, &encoder, &objective, StubModel::new()),
            Evaluator::new(&spec, &encoder, &objective, StubModel::new()),
        ];
        let parallel = evaluate_batch(&mut pool, &candidates).unwrap();

        assert_eq!(sequential, parallel);
        let total: u64 = pool.iter().map(|e| e.evaluations()).sum();
        assert_eq!(total, candidates.len() as u64);
    }
}
