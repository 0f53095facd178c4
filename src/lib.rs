//! Retrieval-augmented generation core for answering payment-ops runbook
//! questions: a deterministic pipeline that chunks documents, embeds and
//! indexes them, retrieves similar chunks for a question, and asks a
//! language model to synthesize a grounded, cited answer.
//!
//! The pipeline is pluggable across vector backends ([`vector`]) and model
//! providers ([`llm`]); the core (chunking, ingest, retrieval, answer
//! assembly, guardrail) is backend-agnostic.

pub mod answer;
pub mod api;
pub mod chunker;
pub mod config;
pub mod error;
pub mod guardrail;
pub mod ingest;
pub mod llm;
pub mod retrieve;
pub mod types;
pub mod vector;

pub use answer::Answerer;
pub use chunker::{Chunker, ChunkerConfig};
pub use config::AppConfig;
pub use error::{RagError, Result};
pub use guardrail::{Guardrail, GuardrailVerdict, Severity};
pub use ingest::Ingestor;
pub use llm::{ChatModel, Embedder, ProviderFactory, ProviderSettings, ProviderTag};
pub use retrieve::Retriever;
pub use types::{AskResponse, Chunk, Citation, Document, RetrievedChunk};
pub use vector::{VectorBackendKind, VectorIndex};

/// Crate version, matching `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_numeric() {
        assert!(VERSION.starts_with(char::is_numeric));
    }
}
