//! Decision-variable declarations and the ordered problem registry.

use serde::{Deserialize, Serialize};

use ag_types::{AgError, AgResult, ParamValue, ValidationError};

/// Default evaluation-cache capacity for a problem.
pub const DEFAULT_CACHE_CAPACITY: usize = 400;

/// Marks one model attribute in a registration: either the single free
/// parameter the optimizer searches over, or a fixed companion value applied
/// verbatim on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Free,
    Fixed(ParamValue),
}

/// The kind of search domain a decision variable declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Continuous,
    Integer,
    Categorical,
    Quantized,
}

impl VariableKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Integer => "integer",
            Self::Categorical => "categorical",
            Self::Quantized => "quantized",
        }
    }
}

impl std::str::FromStr for VariableKind {
    type Err = AgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "continuous" => Ok(Self::Continuous),
            "integer" => Ok(Self::Integer),
            "categorical" => Ok(Self::Categorical),
            "quantized" => Ok(Self::Quantized),
            other => Err(AgError::UnsupportedVariableKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Validated search domain of a decision variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Domain {
    Continuous { lo: f64, hi: f64 },
    Integer { lo: i64, hi: i64 },
    Categorical { choices: Vec<String> },
    Quantized { lo: f64, hi: f64, step: f64 },
}

impl Domain {
    pub fn kind(&self) -> VariableKind {
        match self {
            Self::Continuous { .. } => VariableKind::Continuous,
            Self::Integer { .. } => VariableKind::Integer,
            Self::Categorical { .. } => VariableKind::Categorical,
            Self::Quantized { .. } => VariableKind::Quantized,
        }
    }

    /// Numeric bounds of this domain in solver space. Categorical domains get
    /// the surrogate index range `(0, len - 1)`.
    pub fn solver_bounds(&self) -> (f64, f64) {
        match self {
            Self::Continuous { lo, hi } | Self::Quantized { lo, hi, .. } => (*lo, *hi),
            Self::Integer { lo, hi } => (*lo as f64, *hi as f64),
            Self::Categorical { choices } => (0.0, (choices.len() - 1) as f64),
        }
    }

    /// Deterministic default start value: the domain midpoint, or the first
    /// category.
    pub fn default_start(&self) -> ParamValue {
        match self {
            Self::Continuous { lo, hi } => ParamValue::Float((lo + hi) / 2.0),
            Self::Integer { lo, hi } => ParamValue::Int(lo + (hi - lo) / 2),
            Self::Categorical { choices } => ParamValue::Text(choices[0].clone()),
            Self::Quantized { lo, hi, step } => {
                ParamValue::Float(snap_to_step(*lo, *hi, *step, (lo + hi) / 2.0))
            }
        }
    }
}

/// Nearest multiple of `step` (anchored at `lo`) that stays inside `[lo, hi]`.
pub(crate) fn snap_to_step(lo: f64, hi: f64, step: f64, value: f64) -> f64 {
    let k_max = ((hi - lo) / step).floor();
    let k = ((value - lo) / step).round().clamp(0.0, k_max);
    lo + k * step
}

/// A control-variable registration request.
///
/// Loosely typed on purpose: bounds, categories, and step are all optional
/// here so that malformed declarations are caught by [`ProblemSpec::add_control`]
/// with a precise [`ValidationError`] instead of being unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Control {
    pub path: String,
    pub fields: Vec<(String, FieldValue)>,
    pub kind: VariableKind,
    pub bounds: Option<(f64, f64)>,
    pub categories: Option<Vec<String>>,
    pub step: Option<f64>,
    pub start: Option<ParamValue>,
}

impl Control {
    pub fn new(path: impl Into<String>, kind: VariableKind) -> Self {
        Self {
            path: path.into(),
            fields: Vec::new(),
            kind,
            bounds: None,
            categories: None,
            step: None,
            start: None,
        }
    }

    /// Mark `field` as the free parameter to optimize.
    pub fn free(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldValue::Free));
        self
    }

    /// Apply `field = value` verbatim on every evaluation.
    pub fn fixed(mut self, field: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.fields.push((field.into(), FieldValue::Fixed(value.into())));
        self
    }

    pub fn bounds(mut self, lo: f64, hi: f64) -> Self {
        self.bounds = Some((lo, hi));
        self
    }

    pub fn categories<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn start(mut self, value: impl Into<ParamValue>) -> Self {
        self.start = Some(value.into());
        self
    }

    fn validate(self) -> AgResult<DecisionVariable> {
        let free_count = self
            .fields
            .iter()
            .filter(|(_, v)| matches!(v, FieldValue::Free))
            .count();
        if free_count != 1 {
            return Err(ValidationError::FreeMarkerCount {
                path: self.path,
                count: free_count,
            }
            .into());
        }

        let domain = match self.kind {
            VariableKind::Categorical => {
                if self.bounds.is_some() {
                    return Err(ValidationError::UnexpectedBounds { path: self.path }.into());
                }
                let choices = self.categories.ok_or_else(|| {
                    ValidationError::MissingCategories {
                        path: self.path.clone(),
                    }
                })?;
                if choices.is_empty() {
                    return Err(ValidationError::EmptyCategories { path: self.path }.into());
                }
                Domain::Categorical { choices }
            }
            kind => {
                if self.categories.is_some() {
                    return Err(ValidationError::UnexpectedCategories {
                        path: self.path,
                        kind: kind.name().to_string(),
                    }
                    .into());
                }
                let (lo, hi) = self.bounds.ok_or_else(|| ValidationError::MissingBounds {
                    path: self.path.clone(),
                    kind: kind.name().to_string(),
                })?;
                if lo >= hi {
                    return Err(ValidationError::InvalidBounds {
                        path: self.path,
                        lo,
                        hi,
                    }
                    .into());
                }
                match kind {
                    VariableKind::Continuous => Domain::Continuous { lo, hi },
                    VariableKind::Integer => Domain::Integer {
                        lo: lo.round() as i64,
                        hi: hi.round() as i64,
                    },
                    VariableKind::Quantized => {
                        let step =
                            self.step
                                .ok_or_else(|| ValidationError::MissingStep {
                                    path: self.path.clone(),
                                })?;
                        if step <= 0.0 {
                            return Err(ValidationError::InvalidStep {
                                path: self.path,
                                step,
                            }
                            .into());
                        }
                        Domain::Quantized { lo, hi, step }
                    }
                    VariableKind::Categorical => unreachable!(),
                }
            }
        };

        let label = self
            .fields
            .iter()
            .find(|(_, v)| matches!(v, FieldValue::Free))
            .map(|(name, _)| name.clone())
            .unwrap_or_default();

        let start = match self.start {
            Some(value) => {
                validate_start(&label, &domain, &value)?;
                value
            }
            None => domain.default_start(),
        };

        Ok(DecisionVariable {
            path: self.path,
            label,
            fields: self.fields,
            domain,
            start,
        })
    }
}

fn validate_start(label: &str, domain: &Domain, start: &ParamValue) -> AgResult<()> {
    match domain {
        Domain::Categorical { choices } => match start {
            ParamValue::Text(s) if choices.contains(s) => Ok(()),
            ParamValue::Text(s) => Err(ValidationError::UnknownCategory {
                label: label.to_string(),
                value: s.clone(),
            }
            .into()),
            other => Err(ValidationError::TypeMismatch {
                label: label.to_string(),
                expected: "text".to_string(),
                got: other.type_name().to_string(),
            }
            .into()),
        },
        _ => match start.as_f64() {
            Some(_) => Ok(()),
            None => Err(ValidationError::TypeMismatch {
                label: label.to_string(),
                expected: "numeric".to_string(),
                got: start.type_name().to_string(),
            }
            .into()),
        },
    }
}

/// A validated, immutable decision variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionVariable {
    /// Where in the external model the decoded value is applied.
    pub path: String,
    /// Name of the free field; used for labeling throughout.
    pub label: String,
    /// All fields applied at `path`: the free one plus fixed companions.
    pub fields: Vec<(String, FieldValue)>,
    pub domain: Domain,
    pub start: ParamValue,
}

/// The ordered set of decision variables plus evaluation-cache sizing.
///
/// Registration order is significant: it defines the vector-index ↔ variable
/// correspondence used by the encoder, the solvers, and result labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpec {
    variables: Vec<DecisionVariable>,
    cache_capacity: usize,
}

impl ProblemSpec {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Register a control variable. Re-registering the same path + free field
    /// replaces the prior entry in place, keeping its position.
    pub fn add_control(&mut self, control: Control) -> AgResult<&mut Self> {
        let variable = control.validate()?;
        let existing = self
            .variables
            .iter()
            .position(|v| v.path == variable.path && v.label == variable.label);
        match existing {
            Some(idx) => self.variables[idx] = variable,
            None => self.variables.push(variable),
        }
        Ok(self)
    }

    pub fn variables(&self) -> &[DecisionVariable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Ordered human-readable variable names.
    pub fn labels(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.label.clone()).collect()
    }

    /// Ordered solver-space bounds, one pair per variable.
    pub fn bounds(&self) -> Vec<(f64, f64)> {
        self.variables
            .iter()
            .map(|v| v.domain.solver_bounds())
            .collect()
    }

    /// Ordered start values, one per variable.
    pub fn start_values(&self) -> Vec<ParamValue> {
        self.variables.iter().map(|v| v.start.clone()).collect()
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }
}

impl Default for ProblemSpec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fertiliser() -> Control {
        Control::new(
            ".Simulations.Simulation.Field.Fertilise at sowing",
            VariableKind::Continuous,
        )
        .free("Amount")
        .bounds(50.0, 300.0)
        .start(100.0)
    }

    #[test]
    fn registers_a_continuous_control() {
        let mut spec = ProblemSpec::new();
        spec.add_control(fertiliser()).unwrap();
        assert_eq!(spec.len(), 1);
        assert_eq!(spec.labels(), vec!["Amount"]);
        assert_eq!(spec.bounds(), vec![(50.0, 300.0)]);
        assert_eq!(spec.start_values(), vec![ParamValue::Float(100.0)]);
    }

    #[test]
    fn two_free_markers_are_rejected() {
        let control = Control::new(".Field.Sow", VariableKind::Continuous)
            .free("Population")
            .free("RowSpacing")
            .bounds(2.0, 15.0);
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::FreeMarkerCount { count: 2, .. }) => (),
            other => panic!("expected FreeMarkerCount, got {other:?}"),
        }
    }

    #[test]
    fn zero_free_markers_are_rejected() {
        let control = Control::new(".Field.Sow", VariableKind::Continuous)
            .fixed("Population", 5.0)
            .bounds(2.0, 15.0);
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::FreeMarkerCount { count: 0, .. }) => (),
            other => panic!("expected FreeMarkerCount, got {other:?}"),
        }
    }

    #[test]
    fn categorical_with_bounds_is_rejected() {
        let control = Control::new(".Field.Sow", VariableKind::Categorical)
            .free("CultivarName")
            .bounds(0.0, 3.0);
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::UnexpectedBounds { .. }) => (),
            other => panic!("expected UnexpectedBounds, got {other:?}"),
        }
    }

    #[test]
    fn categorical_without_categories_is_rejected() {
        let control = Control::new(".Field.Sow", VariableKind::Categorical).free("CultivarName");
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::MissingCategories { .. }) => (),
            other => panic!("expected MissingCategories, got {other:?}"),
        }
    }

    #[test]
    fn continuous_without_bounds_is_rejected() {
        let control = Control::new(".Field.Sow", VariableKind::Continuous).free("Population");
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::MissingBounds { .. }) => (),
            other => panic!("expected MissingBounds, got {other:?}"),
        }
    }

    #[test]
    fn quantized_requires_a_positive_step() {
        let base = || {
            Control::new(".Field.Sow", VariableKind::Quantized)
                .free("RowSpacing")
                .bounds(400.0, 1200.0)
        };
        match ProblemSpec::new().add_control(base()).unwrap_err() {
            AgError::Validation(ValidationError::MissingStep { .. }) => (),
            other => panic!("expected MissingStep, got {other:?}"),
        }
        match ProblemSpec::new().add_control(base().step(-50.0)).unwrap_err() {
            AgError::Validation(ValidationError::InvalidStep { .. }) => (),
            other => panic!("expected InvalidStep, got {other:?}"),
        }
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let control = Control::new(".Field.Sow", VariableKind::Continuous)
            .free("Population")
            .bounds(15.0, 2.0);
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::InvalidBounds { .. }) => (),
            other => panic!("expected InvalidBounds, got {other:?}"),
        }
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let mut spec = ProblemSpec::new();
        spec.add_control(fertiliser()).unwrap();
        spec.add_control(
            Control::new(".Field.Sow", VariableKind::Integer)
                .free("Population")
                .bounds(2.0, 15.0),
        )
        .unwrap();

        // Same path + free field, new bounds: replaces slot 0.
        spec.add_control(fertiliser().bounds(10.0, 200.0)).unwrap();
        assert_eq!(spec.len(), 2);
        assert_eq!(spec.bounds()[0], (10.0, 200.0));
        assert_eq!(spec.labels(), vec!["Amount", "Population"]);
    }

    #[test]
    fn categorical_surrogate_bounds() {
        let mut spec = ProblemSpec::new();
        spec.add_control(
            Control::new(".Field.Sow", VariableKind::Categorical)
                .free("CultivarName")
                .categories(["early", "medium", "late"]),
        )
        .unwrap();
        assert_eq!(spec.bounds(), vec![(0.0, 2.0)]);
    }

    #[test]
    fn default_start_values_are_deterministic() {
        let mut spec = ProblemSpec::new();
        spec.add_control(
            Control::new(".A", VariableKind::Continuous)
                .free("x")
                .bounds(0.0, 10.0),
        )
        .unwrap();
        spec.add_control(
            Control::new(".B", VariableKind::Integer)
                .free("n")
                .bounds(2.0, 15.0),
        )
        .unwrap();
        spec.add_control(
            Control::new(".C", VariableKind::Categorical)
                .free("c")
                .categories(["early", "late"]),
        )
        .unwrap();
        spec.add_control(
            Control::new(".D", VariableKind::Quantized)
                .free("q")
                .bounds(400.0, 1200.0)
                .step(100.0),
        )
        .unwrap();

        assert_eq!(
            spec.start_values(),
            vec![
                ParamValue::Float(5.0),
                ParamValue::Int(8),
                ParamValue::Text("early".into()),
                ParamValue::Float(800.0),
            ]
        );
    }

    #[test]
    fn categorical_start_must_be_a_known_choice() {
        let control = Control::new(".Field.Sow", VariableKind::Categorical)
            .free("CultivarName")
            .categories(["early", "late"])
            .start("mid-season");
        let err = ProblemSpec::new().add_control(control).unwrap_err();
        match err {
            AgError::Validation(ValidationError::UnknownCategory { .. }) => (),
            other => panic!("expected UnknownCategory, got {other:?}"),
        }
    }

    #[test]
    fn kind_parses_from_string() {
        assert_eq!(
            "quantized".parse::<VariableKind>().unwrap(),
            VariableKind::Quantized
        );
        match "gaussian".parse::<VariableKind>().unwrap_err() {
            AgError::UnsupportedVariableKind { kind } => assert_eq!(kind, "gaussian"),
            other => panic!("expected UnsupportedVariableKind, got {other:?}"),
        }
    }

    #[test]
    fn spec_serde_round_trip() {
        let mut spec = ProblemSpec::new().with_cache_capacity(64);
        spec.add_control(fertiliser()).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        let back: ProblemSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
