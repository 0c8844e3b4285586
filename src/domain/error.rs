// Recoverable conditions raised by the normalization pipeline
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("malformed timestamp '{value}' (expected format '{format}')")]
    MalformedTimestamp { value: String, format: String },

    #[error("invalid range '{start}' - '{end}': {reason}")]
    InvalidRange {
        start: String,
        end: String,
        reason: String,
    },

    #[error("variable set {set} has {actual} entries, base table has {expected}")]
    VariableTableLengthMismatch {
        set: usize,
        expected: usize,
        actual: usize,
    },

    #[error("unknown bucket kind '{0}'")]
    UnknownBucketKind(String),

    #[error("fetch failed for source '{source_id}': {message}")]
    FetchFailure { source_id: String, message: String },

    #[error("expression evaluation failed: {0}")]
    Eval(String),
}

impl PipelineError {
    pub fn malformed(value: impl Into<String>, format: impl Into<String>) -> Self {
        Self::MalformedTimestamp {
            value: value.into(),
            format: format.into(),
        }
    }

    /// Short condition name used to tag progress entries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedTimestamp { .. } => "MalformedTimestamp",
            Self::InvalidRange { .. } => "InvalidRange",
            Self::VariableTableLengthMismatch { .. } => "VariableTableLengthMismatch",
            Self::UnknownBucketKind(_) => "UnknownBucketKind",
            Self::FetchFailure { .. } => "FetchFailure",
            Self::Eval(_) => "EvalError",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
