//! Error types for the anomaly and masking pipeline.

use thiserror::Error;

/// Result type alias using TerraError.
pub type TerraResult<T> = Result<T, TerraError>;

/// Primary error type for field, mask and statistics operations.
#[derive(Debug, Error)]
pub enum TerraError {
    // === Structural Errors ===
    #[error("Shape mismatch in {context}: expected {expected}, found {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error("Axis not found: {0}")]
    AxisNotFound(String),

    #[error("Invalid axis layout: {0}")]
    InvalidAxisLayout(String),

    #[error("Coordinate system mismatch: {0}")]
    CoordinateSystemMismatch(String),

    // === Geometry Errors ===
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Empty region set: at least one polygon is required")]
    EmptyRegionSet,

    // === Data Errors ===
    #[error("Empty baseline: no timestamps fall in baseline years {years:?}")]
    EmptyBaseline { years: Vec<i32> },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Storage Errors ===
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TerraError {
    /// Build a ShapeMismatch from anything printable.
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        TerraError::ShapeMismatch {
            context: context.into(),
            expected: format!("{:?}", expected),
            actual: format!("{:?}", actual),
        }
    }

    /// Build an InvalidParameter error.
    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        TerraError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Short stable name of the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            TerraError::ShapeMismatch { .. } => "ShapeMismatch",
            TerraError::AxisNotFound(_) => "AxisNotFound",
            TerraError::InvalidAxisLayout(_) => "InvalidAxisLayout",
            TerraError::CoordinateSystemMismatch(_) => "CoordinateSystemMismatch",
            TerraError::InvalidGeometry(_) => "InvalidGeometry",
            TerraError::EmptyRegionSet => "EmptyRegionSet",
            TerraError::EmptyBaseline { .. } => "EmptyBaseline",
            TerraError::InsufficientData(_) => "InsufficientData",
            TerraError::InvalidParameter { .. } => "InvalidParameter",
            TerraError::Storage(_) => "Storage",
            TerraError::Serialization(_) => "Serialization",
        }
    }

    /// Whether the error reflects malformed input rather than sparse data.
    ///
    /// Structural errors abort the operation that raised them; a pipeline
    /// over many events should not try to continue past them for the same
    /// input.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TerraError::ShapeMismatch { .. }
                | TerraError::AxisNotFound(_)
                | TerraError::InvalidAxisLayout(_)
                | TerraError::CoordinateSystemMismatch(_)
                | TerraError::InvalidGeometry(_)
                | TerraError::EmptyRegionSet
                | TerraError::EmptyBaseline { .. }
        )
    }
}

// Conversion from common error types
impl From<std::io::Error> for TerraError {
    fn from(err: std::io::Error) -> Self {
        TerraError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for TerraError {
    fn from(err: serde_json::Error) -> Self {
        TerraError::Serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_classification() {
        assert!(TerraError::EmptyRegionSet.is_structural());
        assert!(TerraError::EmptyBaseline { years: vec![2010] }.is_structural());
        assert!(!TerraError::InsufficientData("empty".into()).is_structural());
        assert!(!TerraError::Storage("disk".into()).is_structural());
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = TerraError::shape_mismatch("field 'lst'", [2, 3, 4], 20);
        assert_eq!(err.kind(), "ShapeMismatch");
        assert!(err.to_string().contains("[2, 3, 4]"));
        assert!(err.to_string().contains("20"));
    }
}
