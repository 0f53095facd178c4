//! Embeds a query and returns the top-K similar chunks.

use crate::config::RetrieverConfig;
use crate::error::Result;
use crate::llm::Embedder;
use crate::types::RetrievedChunk;
use crate::vector::VectorIndex;
use std::sync::Arc;
use tracing::debug;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    vector_index: Arc<dyn VectorIndex>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vector_index: Arc<dyn VectorIndex>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            vector_index,
            config,
        }
    }

    /// Embed `query` and return up to `top_k` chunks ordered by descending
    /// similarity. An empty result is a valid, expected outcome.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let embedded = self.embedder.embed(query).await?;
        debug!("retrieving top {} chunks for query", top_k);
        self.vector_index
            .search(&embedded.embedding, top_k, self.config.min_similarity_score)
            .await
    }

    /// `retrieve` using the configured default `top_k`.
    pub async fn retrieve_default(&self, query: &str) -> Result<Vec<RetrievedChunk>> {
        self.retrieve(query, self.config.default_top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{EmbeddingResponse, ProviderTag};
    use crate::types::Chunk;
    use crate::vector::InMemoryVectorIndex;
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn provider_tag(&self) -> ProviderTag {
            ProviderTag::OpenAi
        }

        async fn embed(&self, _text: &str) -> Result<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                embedding: vec![1.0, 0.0, 0.0],
                model: "stub".to_string(),
            })
        }
    }

    async fn seeded_index() -> Arc<InMemoryVectorIndex> {
        let index = Arc::new(InMemoryVectorIndex::new());
        let document_id = Uuid::new_v4();
        let chunk = Chunk::new(
            document_id,
            "runbook.md".to_string(),
            0,
            "payout retry steps".to_string(),
            Utc::now(),
        )
        .with_embedding(vec![1.0, 0.0, 0.0]);
        index.upsert(&[chunk]).await.unwrap();
        index
    }

    #[tokio::test]
    async fn retrieve_returns_matching_chunk() {
        let index = seeded_index().await;
        let retriever = Retriever::new(Arc::new(StubEmbedder), index, RetrieverConfig::default());
        let results = retriever.retrieve("how do I retry a payout", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_name, "runbook.md");
    }

    #[tokio::test]
    async fn retrieve_on_empty_index_returns_empty_vec() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let retriever = Retriever::new(Arc::new(StubEmbedder), index, RetrieverConfig::default());
        let results = retriever.retrieve("anything", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn min_similarity_score_floor_excludes_weak_matches() {
        let index = seeded_index().await;
        let mut config = RetrieverConfig::default();
        config.min_similarity_score = Some(2.0); // unreachable cosine similarity
        let retriever = Retriever::new(Arc::new(StubEmbedder), index, config);
        let results = retriever.retrieve("anything", 5).await.unwrap();
        assert!(results.is_empty());
    }
}
