use serde::{Deserialize, Serialize};

use crate::errors::AgResult;
use crate::value::ParamValue;

/// Tabular output of the last simulation run: one row per reported entity,
/// one column per output variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl ResultsTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append one row of values. The row must be as wide as `columns`.
    pub fn push_row(&mut self, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of the named column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Mean of the named column; `None` if the column is absent or empty.
    pub fn column_mean(&self, name: &str) -> Option<f64> {
        let values = self.column(name)?;
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Contract for the external simulation engine being calibrated.
///
/// The optimizer never inspects concrete model types: it edits attributes
/// through `apply`, triggers `run`, and reads the run's tabular output from
/// `results`. Every evaluation mutates the model in place, so independent
/// concurrent runs must each own an independent model instance.
pub trait SimulationModel {
    /// Set one or more attributes on the node at `path`. Fails with
    /// [`ModelError::NodeNotFound`](crate::ModelError::NodeNotFound) if the
    /// path does not resolve.
    fn apply(&mut self, path: &str, values: &[(String, ParamValue)]) -> AgResult<()>;

    /// Execute the simulation. May fail with a domain-specific runtime error,
    /// which propagates to the caller unwrapped.
    fn run(&mut self) -> AgResult<()>;

    /// Tabular output of the most recent `run`. Empty before the first run.
    fn results(&self) -> &ResultsTable;
}

impl<M: SimulationModel + ?Sized> SimulationModel for &mut M {
    fn apply(&mut self, path: &str, values: &[(String, ParamValue)]) -> AgResult<()> {
        (**self).apply(path, values)
    }

    fn run(&mut self) -> AgResult<()> {
        (**self).run()
    }

    fn results(&self) -> &ResultsTable {
        (**self).results()
    }
}
