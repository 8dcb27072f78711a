use thiserror::Error;

/// Failure taxonomy of the IRI pipeline.
///
/// None of these escape the `compute*` entry points: the assembler turns
/// them into a result with `success = false` and the display string as message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IriError {
    /// Input could not be read or parsed as CSV.
    #[error("Failed to load data: {0}")]
    Load(String),

    /// Required columns are absent or parameters are out of range.
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient data points (minimum {required} required, got {found})")]
    InsufficientData { required: usize, found: usize },

    /// Numeric failure inside the pipeline (degenerate sampling rate, NaN distances, ...).
    #[error("Computation failed: {0}")]
    Computation(String),
}

impl IriError {
    pub fn missing_columns(columns: &[&str]) -> Self {
        IriError::Validation(format!("Missing required columns: {}", columns.join(", ")))
    }

    /// Short machine-friendly kind, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            IriError::Load(_) => "load",
            IriError::Validation(_) => "validation",
            IriError::InsufficientData { .. } => "insufficient_data",
            IriError::Computation(_) => "computation",
        }
    }
}

impl From<std::io::Error> for IriError {
    fn from(e: std::io::Error) -> Self {
        IriError::Load(e.to_string())
    }
}

impl From<csv::Error> for IriError {
    fn from(e: csv::Error) -> Self {
        IriError::Load(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IriError>;
