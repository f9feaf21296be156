//! Bidirectional mapping between the flat numeric vector the solvers
//! manipulate and decoded, typed parameter values.

use ag_types::{AgResult, ParamValue, ValidationError};

use crate::problem::{snap_to_step, DecisionVariable, Domain};

/// Decimal places kept when decoding continuous values. Stabilizes cache
/// keys against floating noise from the solvers.
const DECODE_DECIMALS: f64 = 1e4;

fn round4(v: f64) -> f64 {
    (v * DECODE_DECIMALS).round() / DECODE_DECIMALS
}

/// Encoder/decoder over the ordered variable list of a problem.
#[derive(Debug, Clone)]
pub struct Encoder {
    domains: Vec<Domain>,
    labels: Vec<String>,
}

impl Encoder {
    pub fn new(variables: &[DecisionVariable]) -> Self {
        Self {
            domains: variables.iter().map(|v| v.domain.clone()).collect(),
            labels: variables.iter().map(|v| v.label.clone()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Solver-space bounds, one pair per variable.
    pub fn solver_bounds(&self) -> Vec<(f64, f64)> {
        self.domains.iter().map(Domain::solver_bounds).collect()
    }

    fn check_len(&self, got: usize) -> AgResult<()> {
        if got != self.domains.len() {
            return Err(ValidationError::VectorLength {
                expected: self.domains.len(),
                got,
            }
            .into());
        }
        Ok(())
    }

    fn numeric(&self, idx: usize, value: &ParamValue) -> AgResult<f64> {
        value.as_f64().ok_or_else(|| {
            ValidationError::TypeMismatch {
                label: self.labels[idx].clone(),
                expected: "numeric".to_string(),
                got: value.type_name().to_string(),
            }
            .into()
        })
    }

    /// Map decoded values into solver space: continuous/integer pass through,
    /// categorical becomes the index of the label in its choice list,
    /// quantized snaps onto its step grid.
    pub fn encode(&self, values: &[ParamValue]) -> AgResult<Vec<f64>> {
        self.check_len(values.len())?;
        let mut out = Vec::with_capacity(values.len());
        for (idx, (domain, value)) in self.domains.iter().zip(values).enumerate() {
            let encoded = match domain {
                Domain::Continuous { .. } | Domain::Integer { .. } => self.numeric(idx, value)?,
                Domain::Categorical { choices } => match value {
                    ParamValue::Text(s) => {
                        choices.iter().position(|c| c == s).ok_or_else(|| {
                            ValidationError::UnknownCategory {
                                label: self.labels[idx].clone(),
                                value: s.clone(),
                            }
                        })? as f64
                    }
                    other => {
                        return Err(ValidationError::TypeMismatch {
                            label: self.labels[idx].clone(),
                            expected: "text".to_string(),
                            got: other.type_name().to_string(),
                        }
                        .into())
                    }
                },
                Domain::Quantized { lo, hi, step } => {
                    snap_to_step(*lo, *hi, *step, self.numeric(idx, value)?)
                }
            };
            out.push(encoded);
        }
        Ok(out)
    }

    /// Map a solver vector back to typed values: continuous rounds to four
    /// decimals, integer rounds to the nearest whole number, categorical
    /// clamps the index into range before looking up the label, quantized
    /// snaps onto its grid.
    pub fn decode(&self, vector: &[f64]) -> AgResult<Vec<ParamValue>> {
        self.check_len(vector.len())?;
        let decoded = self
            .domains
            .iter()
            .zip(vector)
            .map(|(domain, &v)| match domain {
                Domain::Continuous { .. } => ParamValue::Float(round4(v)),
                Domain::Integer { .. } => ParamValue::Int(v.round() as i64),
                Domain::Categorical { choices } => {
                    let idx = (v.round() as i64).clamp(0, choices.len() as i64 - 1) as usize;
                    ParamValue::Text(choices[idx].clone())
                }
                Domain::Quantized { lo, hi, step } => {
                    ParamValue::Float(round4(snap_to_step(*lo, *hi, *step, v)))
                }
            })
            .collect();
        Ok(decoded)
    }
}
