//! Custom error types for the cleaning pipeline.
//!
//! Data-quality defects are never errors here: they are measured by the
//! quality checker and remediated by the cleaner. The variants below cover
//! the conditions that actually stop a run (unreadable input, a schema that
//! lacks a required column, a cleaned table that breaks its invariants, an
//! output file that cannot be replaced).
//!
//! Errors are serializable as `{ code, message }` so a run report or an
//! embedding application can surface them without string matching.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Pipeline was cancelled through its cancellation token.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// A required raw column was not found in the source.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The raw source could not be read or normalized.
    #[error("Failed to load raw dataset: {0}")]
    LoadFailed(String),

    /// Volume/coverage profiling failed.
    #[error("Failed to profile dataset: {0}")]
    ProfilingFailed(String),

    /// One of the quality sub-audits failed or did not reduce to one row.
    #[error("Quality check failed: {0}")]
    QualityCheckFailed(String),

    /// Catalog, grid, aggregation or join pass failed.
    #[error("Failed to clean data: {0}")]
    CleaningFailed(String),

    /// The cleaned table broke one of its structural invariants.
    #[error("Cleaned table violates {count} invariant(s): {summary}")]
    InvariantViolated { count: usize, summary: String },

    /// The output table could not be written or replaced.
    #[error("Failed to write output '{path}': {reason}")]
    OutputWriteFailed { path: String, reason: String },

    /// Report generation failed.
    #[error("Failed to generate report: {0}")]
    ReportGenerationFailed(String),

    /// Internal error (e.g., thread join failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, preserved through [`with_context`](Self::with_context).
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::LoadFailed(_) => "LOAD_FAILED",
            Self::ProfilingFailed(_) => "PROFILING_FAILED",
            Self::QualityCheckFailed(_) => "QUALITY_CHECK_FAILED",
            Self::CleaningFailed(_) => "CLEANING_FAILED",
            Self::InvariantViolated { .. } => "INVARIANT_VIOLATED",
            Self::OutputWriteFailed { .. } => "OUTPUT_WRITE_FAILED",
            Self::ReportGenerationFailed(_) => "REPORT_GENERATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(PipelineError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            PipelineError::ColumnNotFound("population".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            PipelineError::InvariantViolated {
                count: 2,
                summary: "duplicate keys".to_string()
            }
            .error_code(),
            "INVARIANT_VIOLATED"
        );
    }

    #[test]
    fn test_is_cancelled_through_context() {
        assert!(PipelineError::Cancelled.is_cancelled());
        assert!(
            PipelineError::Cancelled
                .with_context("During cleaning")
                .is_cancelled()
        );
        assert!(!PipelineError::Internal("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::ColumnNotFound("stringency_index".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("stringency_index"));
    }

    #[test]
    fn test_with_context() {
        let error =
            PipelineError::ColumnNotFound("date".to_string()).with_context("During loading");
        assert!(error.to_string().contains("During loading"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_polars_result_context() {
        let result: std::result::Result<(), polars::error::PolarsError> = Err(
            polars::error::PolarsError::ComputeError("boom".into()),
        );
        let error = result.context("Joining grid").unwrap_err();
        assert_eq!(error.error_code(), "POLARS_ERROR");
        assert!(error.to_string().starts_with("Joining grid"));
    }
}
