//! Error types for dataset handling.

use thiserror::Error;

/// Errors raised by the dataset model and the grid converter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataDictError {
    /// One or more structural invariants are violated.
    ///
    /// All violations found in a single validation pass are collected here.
    #[error("invalid data structure:\n{}", format_violations(.0))]
    Structural(Vec<String>),

    /// A referenced field does not exist.
    #[error("no field '{0}' present")]
    FieldNotFound(String),

    /// Two datasets (or a dataset and new data) do not share a structure.
    #[error("incompatible data structures: {0}")]
    Incompatible(String),

    /// Tabular <-> grid conversion is ambiguous or impossible.
    #[error("grid conversion failed: {0}")]
    Conversion(String),

    /// An array could not be brought into the requested shape.
    #[error("shape error: {0}")]
    Shape(String),

    /// An argument is not usable (duplicate order index, empty input, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The structure shorthand could not be parsed.
    #[error("failed to parse structure description: {0}")]
    Parse(String),
}

impl DataDictError {
    /// Create a Conversion error.
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// Create an Incompatible error.
    pub fn incompatible(msg: impl Into<String>) -> Self {
        Self::Incompatible(msg.into())
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// The individual violations of a Structural error, empty otherwise.
    pub fn violations(&self) -> &[String] {
        match self {
            Self::Structural(v) => v,
            _ => &[],
        }
    }
}

impl From<ndarray::ShapeError> for DataDictError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Shape(err.to_string())
    }
}

fn format_violations(violations: &[String]) -> String {
    violations
        .iter()
        .map(|v| format!(" * {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DataDictError>;
