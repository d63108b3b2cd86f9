//! # VRS Error Types
//!
//! Centralized error handling for the VRS core library.

use thiserror::Error;

/// Result type alias for VRS operations
pub type Result<T> = std::result::Result<T, VrsError>;

/// Core error types for VRS
#[derive(Error, Debug)]
pub enum VrsError {
    /// Configuration errors (missing or invalid required settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Remote vector index unreachable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding/index dimension disagreement
    #[error(
        "Embedding dimension mismatch: configured dim={configured}, got {observed} from model '{model}'. \
         Set the configured dimension to match the model, recreate the index, \
         or enable EMBED_DIM_COERCE=true to auto-adjust."
    )]
    DimensionMismatch {
        configured: usize,
        observed: usize,
        model: String,
    },

    /// Remote upsert failed
    #[error("Upsert error: {0}")]
    Upsert(String),

    /// Remote query failed
    #[error("Query error: {0}")]
    Query(String),

    /// AI/LLM errors
    #[error("AI error: {0}")]
    Ai(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VrsError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Create an upsert error
    pub fn upsert(msg: impl Into<String>) -> Self {
        Self::Upsert(msg.into())
    }

    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create an AI error
    pub fn ai(msg: impl Into<String>) -> Self {
        Self::Ai(msg.into())
    }

    /// Whether the caller can retry the failed operation as-is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VrsError::Connection(_) | VrsError::Http(_) | VrsError::Upsert(_) | VrsError::Query(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message_names_both_dims() {
        let err = VrsError::DimensionMismatch {
            configured: 3072,
            observed: 1536,
            model: "text-embedding-3-small".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("3072"));
        assert!(msg.contains("1536"));
        assert!(msg.contains("text-embedding-3-small"));
        assert!(msg.contains("EMBED_DIM_COERCE"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(VrsError::connection("index down").is_retryable());
        assert!(!VrsError::configuration("missing VECTOR_INDEX_URL").is_retryable());
    }
}
