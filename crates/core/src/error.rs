//! Error types for Planscope.
//!
//! A single error enum covers every failure category of the ingestion
//! pipeline. Cleaning and chunking are total by construction, so most
//! variants describe collaborator failures (source, extraction, embedding,
//! storage) or configuration problems.

use thiserror::Error;

/// Unified error type for Planscope.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source document is missing, unreadable or not a valid PDF
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Text extraction failed on an otherwise readable source
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A text segment could not be reduced below the token ceiling
    #[error("Oversized segment: {0}")]
    OversizedSegment(String),

    /// Embedding provider or vector store failure
    #[error("Downstream unavailable: {0}")]
    DownstreamUnavailable(String),

    /// A collaborator call exceeded its time budget
    #[error("Timed out after {seconds}s during {operation}")]
    Timeout { operation: String, seconds: u64 },

    /// Tokenizer initialisation or decoding errors
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error came from an optional downstream collaborator.
    pub fn is_downstream(&self) -> bool {
        matches!(self, AppError::DownstreamUnavailable(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
