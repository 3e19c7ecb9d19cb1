//! Error types for the workspace reconciler

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the workspace reconciler
#[derive(Debug, Error)]
pub enum Error {
    // Desired config errors (1000-1999)
    #[error("Desired config is invalid: {0}")]
    InvalidDesiredConfig(String),

    #[error("Desired config generation failed for workspace {workspace_id}: {reason}")]
    DesiredConfigGenerationFailed { workspace_id: i64, reason: String },

    // Serialization errors (2000-2999)
    #[error("JSON error: {0}")]
    Json(String),

    #[error("YAML error: {0}")]
    Yaml(String),
}

impl Error {
    /// Get the error code
    pub fn code(&self) -> u32 {
        match self {
            // Desired config errors (1000-1999)
            Error::InvalidDesiredConfig(_) => 1001,
            Error::DesiredConfigGenerationFailed { .. } => 1002,

            // Serialization errors (2000-2999)
            Error::Json(_) => 2001,
            Error::Yaml(_) => 2002,
        }
    }
}

// Implement From for common error types
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err.to_string())
    }
}
