//! Deterministic stand-in for the external crop model, used across the
//! crate's tests.

use std::collections::BTreeMap;

use ag_types::{AgResult, ModelError, ParamValue, ResultsTable, SimulationModel};

/// Records applied attribute values and, on `run`, echoes every numeric
/// input back as a one-row results table (one column per attribute). Tests
/// then shape arbitrary response surfaces through custom objectives.
///
/// Paths starting with `.missing` do not resolve; `fail_runs` makes `run`
/// fail with a simulation error.
pub(crate) struct StubModel {
    numeric: BTreeMap<String, f64>,
    text: BTreeMap<String, String>,
    pub runs: usize,
    pub fail_runs: bool,
    table: ResultsTable,
}

impl StubModel {
    pub fn new() -> Self {
        Self {
            numeric: BTreeMap::new(),
            text: BTreeMap::new(),
            runs: 0,
            fail_runs: false,
            table: ResultsTable::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_runs: true,
            ..Self::new()
        }
    }

    /// Last applied numeric value of `field`.
    pub fn numeric(&self, field: &str) -> Option<f64> {
        self.numeric.get(field).copied()
    }

    /// Last applied text value of `field`.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.text.get(field).map(String::as_str)
    }
}

impl SimulationModel for StubModel {
    fn apply(&mut self, path: &str, values: &[(String, ParamValue)]) -> AgResult<()> {
        if path.starts_with(".missing") {
            return Err(ModelError::NodeNotFound {
                path: path.to_string(),
            }
            .into());
        }
        for (name, value) in values {
            match value {
                // Numeric-looking text (a day-of-year category, say) lands in
                // the numeric table so objectives can score it.
                ParamValue::Text(s) => match s.parse::<f64>() {
                    Ok(v) => {
                        self.numeric.insert(name.clone(), v);
                    }
                    Err(_) => {
                        self.text.insert(name.clone(), s.clone());
                    }
                },
                other => {
                    // as_f64 is Some for every non-text value.
                    if let Some(v) = other.as_f64() {
                        self.numeric.insert(name.clone(), v);
                    }
                }
            }
        }
        Ok(())
    }

    fn run(&mut self) -> AgResult<()> {
        if self.fail_runs {
            return Err(ModelError::Simulation {
                message: "water balance diverged".to_string(),
            }
            .into());
        }
        self.runs += 1;
        let columns: Vec<String> = self.numeric.keys().cloned().collect();
        let row: Vec<f64> = columns.iter().map(|c| self.numeric[c]).collect();
        self.table = ResultsTable::new(columns);
        self.table.push_row(row);
        Ok(())
    }

    fn results(&self) -> &ResultsTable {
        &self.table
    }
}
