//! In-memory reference [`VectorIndex`], used by the test suite and local runs.
//!
//! Computes cosine similarity by brute-force scan; conformance tests written
//! against this backend apply to every other backend in this module.

use super::{cosine_similarity, VectorIndex};
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryVectorIndex {
    chunks: RwLock<HashMap<Uuid, Chunk>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn initialize(&self, _dimension: usize) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(RagError::InvalidChunk(format!(
                    "chunk {} for document {} has no embedding",
                    chunk.id, chunk.document_name
                )));
            }
        }
        let mut store = self.chunks.write().expect("vector index lock poisoned");
        for chunk in chunks {
            store.insert(chunk.id, chunk.clone());
        }
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let store = self.chunks.read().expect("vector index lock poisoned");
        let mut scored: Vec<RetrievedChunk> = store
            .values()
            .map(|chunk| RetrievedChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vector, &chunk.embedding),
            })
            .filter(|retrieved| min_score.map_or(true, |floor| retrieved.score >= floor))
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let store = self.chunks.read().expect("vector index lock poisoned");
        let mut aggregates: HashMap<Uuid, Document> = HashMap::new();
        for chunk in store.values() {
            aggregates
                .entry(chunk.document_id)
                .and_modify(|doc| {
                    doc.chunk_count += 1;
                    doc.total_size_bytes += chunk.text.chars().count();
                    if chunk.created_utc < doc.created_utc {
                        doc.created_utc = chunk.created_utc;
                    }
                })
                .or_insert_with(|| Document {
                    id: chunk.document_id,
                    name: chunk.document_name.clone(),
                    source_path: None,
                    created_utc: chunk.created_utc,
                    chunk_count: 1,
                    total_size_bytes: chunk.text.chars().count(),
                });
        }
        Ok(aggregates.into_values().collect())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
    }

    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>> {
        let store = self.chunks.read().expect("vector index lock poisoned");
        let mut chunks: Vec<Chunk> = store
            .values()
            .filter(|chunk| chunk.document_id == id)
            .map(|chunk| {
                let mut stripped = chunk.clone();
                stripped.embedding = Vec::new();
                stripped
            })
            .collect();
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }
}
