//! Pluggable vector-index backends.
//!
//! Every backend implements cosine-similarity search over (chunk, embedding)
//! records and normalizes its native score (distance or inner product) to
//! "higher = more similar" at this boundary, so the rest of the crate never
//! deals with backend-specific score semantics.

pub mod memory;
pub mod azure_search;
pub mod opensearch;
pub mod postgres;
pub mod qdrant;
pub mod redis;

use crate::error::Result;
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use uuid::Uuid;

pub use memory::InMemoryVectorIndex;

/// Backend selection tag, matching the provider enumeration in the external
/// configuration surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackendKind {
    InMemory,
    Qdrant,
    AzureAiSearch,
    Postgres,
    Redis,
    OpenSearch,
}

/// Cosine-similarity vector store contract shared by every backend.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Idempotently create the backing collection/index for vector dimension
    /// `dimension`, configured for cosine distance.
    async fn initialize(&self, dimension: usize) -> Result<()>;

    /// Insert or replace chunks by `id`. Empty input is a no-op. A chunk
    /// missing its embedding fails the whole batch with
    /// [`crate::error::RagError::InvalidChunk`].
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return up to `top_k` chunks ordered by descending similarity to
    /// `query_vector`. When `min_score` is set, results strictly below it are
    /// dropped.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>>;

    /// List all documents, aggregated by `document_id`.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Fetch a single document by id.
    async fn get_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Fetch a document's chunks in ascending `index` order, embeddings
    /// stripped.
    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>>;
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` for
/// mismatched lengths or a zero-norm vector, matching the reference backend's
/// defensive convention.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let a = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &a), 1.0);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn mismatched_lengths_return_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }
}
