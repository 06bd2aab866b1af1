//! Error types for the Anima core

use thiserror::Error;

/// Main error type for Anima operations
#[derive(Debug, Error)]
pub enum AnimaError {
    /// Database operation error (from sqlx)
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    /// Database operation error (custom message)
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A memory/opinion/desire formation collaborator failed to produce a
    /// usable result (empty answer or unparseable output)
    #[error("Formation error: {0}")]
    Formation(String),

    /// Tool invocation failed inside a planned action step
    #[error("Tool error: {0}")]
    Tool(String),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(String),

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A blocking wait was interrupted by a shutdown signal
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Not found error (generic)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using AnimaError
pub type Result<T> = std::result::Result<T, AnimaError>;

impl AnimaError {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        AnimaError::Database(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        AnimaError::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        AnimaError::Validation(msg.into())
    }

    /// Create a formation error
    pub fn formation(msg: impl Into<String>) -> Self {
        AnimaError::Formation(msg.into())
    }

    /// Create a tool error
    pub fn tool(msg: impl Into<String>) -> Self {
        AnimaError::Tool(msg.into())
    }

    /// Create a template error
    pub fn template(msg: impl Into<String>) -> Self {
        AnimaError::Template(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        AnimaError::Timeout(msg.into())
    }

    /// Create an interrupted error
    pub fn interrupted(msg: impl Into<String>) -> Self {
        AnimaError::Interrupted(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        AnimaError::NotFound(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        AnimaError::Other(msg.into())
    }

    /// Whether this error came from a cancelled wait
    pub fn is_interrupted(&self) -> bool {
        matches!(self, AnimaError::Interrupted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AnimaError::formation("empty opinion list");
        assert_eq!(err.to_string(), "Formation error: empty opinion list");

        let err = AnimaError::tool("web_search unavailable");
        assert_eq!(err.to_string(), "Tool error: web_search unavailable");
    }

    #[test]
    fn test_interrupted_is_distinguishable() {
        assert!(AnimaError::interrupted("shutdown").is_interrupted());
        assert!(!AnimaError::timeout("poll").is_interrupted());
    }

    #[test]
    fn test_serde_error_conversion() {
        fn parse() -> Result<serde_json::Value> {
            Ok(serde_json::from_str("{not json")?)
        }

        assert!(matches!(parse(), Err(AnimaError::Serialization(_))));
    }
}
