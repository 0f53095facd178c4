//! Error handling for the RAG core

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, RagError>;

/// Main error type for the RAG pipeline
#[derive(Error, Debug)]
pub enum RagError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("chunking exceeded max_chunks_per_document ({limit}) for document {document_name}")]
    ChunkExplosion { document_name: String, limit: usize },

    #[error("chunk missing embedding: {0}")]
    InvalidChunk(String),

    #[error("document produced zero chunks: {0}")]
    EmptyDocument(String),

    #[error("upstream {backend} timed out")]
    UpstreamTimeout { backend: String },

    #[error("upstream model error: {0}")]
    UpstreamModelError(String),

    #[error("upstream model rejected the request: {0}")]
    UpstreamModelInvalid(String),

    #[error("upstream vector backend error: {0}")]
    UpstreamVectorError(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("error answering question: {0}")]
    AnswerError(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RagError {
    /// Whether a caller may usefully retry the operation that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::UpstreamTimeout { .. }
                | RagError::UpstreamModelError(_)
                | RagError::UpstreamVectorError(_)
                | RagError::Http(_)
        )
    }

    /// Short tag for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            RagError::InvalidInput(_) => "invalid_input",
            RagError::ChunkExplosion { .. } => "chunk_explosion",
            RagError::InvalidChunk(_) => "invalid_chunk",
            RagError::EmptyDocument(_) => "empty_document",
            RagError::UpstreamTimeout { .. } => "upstream_timeout",
            RagError::UpstreamModelError(_) => "upstream_model_error",
            RagError::UpstreamModelInvalid(_) => "upstream_model_invalid",
            RagError::UpstreamVectorError(_) => "upstream_vector_error",
            RagError::Cancelled => "cancelled",
            RagError::AnswerError(_) => "answer_error",
            RagError::Config(_) => "config",
            RagError::Io(_) => "io",
            RagError::Serialization(_) => "serialization",
            RagError::Http(_) => "http",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let timeout = RagError::UpstreamTimeout {
            backend: "qdrant".to_string(),
        };
        assert!(timeout.is_retryable());

        let invalid = RagError::InvalidInput("blank question".to_string());
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn test_error_category() {
        let err = RagError::ChunkExplosion {
            document_name: "runbook.md".to_string(),
            limit: 5000,
        };
        assert_eq!(err.category(), "chunk_explosion");
    }
}
