use thiserror::Error;

/// Main error type for the AgroCal system
#[derive(Error, Debug)]
pub enum AgError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported variable kind: {kind}")]
    UnsupportedVariableKind { kind: String },

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Registration-time errors: a control variable declaration that cannot be
/// turned into a well-formed decision variable.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("expected exactly one free field marker at '{path}', found {count}")]
    FreeMarkerCount { path: String, count: usize },

    #[error("variable at '{path}' is declared {kind} but has no bounds")]
    MissingBounds { path: String, kind: String },

    #[error("categorical variable at '{path}' has no categories")]
    MissingCategories { path: String },

    #[error("categorical variable at '{path}' takes categories, not bounds")]
    UnexpectedBounds { path: String },

    #[error("categorical variable at '{path}' has an empty category set")]
    EmptyCategories { path: String },

    #[error("{kind} variable at '{path}' takes bounds, not categories")]
    UnexpectedCategories { path: String, kind: String },

    #[error("quantized variable at '{path}' requires a step")]
    MissingStep { path: String },

    #[error("quantized variable at '{path}' has non-positive step {step}")]
    InvalidStep { path: String, step: f64 },

    #[error("variable at '{path}' has invalid bounds: lo {lo} >= hi {hi}")]
    InvalidBounds { path: String, lo: f64, hi: f64 },

    #[error("variable '{label}' expected a {expected} value, got {got}")]
    TypeMismatch {
        label: String,
        expected: String,
        got: String,
    },

    #[error("variable '{label}' has no category named '{value}'")]
    UnknownCategory { label: String, value: String },

    #[error("vector length {got} does not match the {expected} registered variables")]
    VectorLength { expected: usize, got: usize },

    #[error("no decision variables registered")]
    NoVariables,
}

/// Metric computation errors
#[derive(Error, Debug)]
pub enum MetricError {
    #[error("sequence length mismatch: reference has {expected} values, predicted has {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("{metric} needs at least {needed} data pairs, got {got}")]
    InsufficientData {
        metric: String,
        needed: usize,
        got: usize,
    },

    #[error("unknown metric '{name}'")]
    UnknownMetric { name: String },
}

/// Errors raised by the external simulation model collaborator.
///
/// These propagate through the evaluation pipeline unwrapped: a failing
/// `apply` or `run` aborts the solver run with the original error.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no model node found at path '{path}'")]
    NodeNotFound { path: String },

    #[error("simulation run failed: {message}")]
    Simulation { message: String },

    #[error("results table has no column named '{column}'")]
    MissingColumn { column: String },
}

/// Result type alias for AgroCal operations
pub type AgResult<T> = Result<T, AgError>;
