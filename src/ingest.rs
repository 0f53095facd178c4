//! Orchestrates chunk → embed → upsert with bounded batching.

use crate::chunker::Chunker;
use crate::config::IngestConfig;
use crate::error::{RagError, Result};
use crate::llm::Embedder;
use crate::types::{Chunk, Document};
use crate::vector::VectorIndex;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Ingestor {
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    vector_index: Arc<dyn VectorIndex>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn Embedder>,
        vector_index: Arc<dyn VectorIndex>,
        config: IngestConfig,
    ) -> Self {
        Self {
            chunker,
            embedder,
            vector_index,
            config,
        }
    }

    /// Chunk, embed, and upsert `text` as a new document.
    pub async fn ingest_text(
        &self,
        doc_name: &str,
        text: &str,
        source_path: Option<String>,
    ) -> Result<Document> {
        if doc_name.trim().is_empty() {
            return Err(RagError::InvalidInput(
                "document name must not be blank".to_string(),
            ));
        }

        let document_id = Uuid::new_v4();
        let created_utc = Utc::now();

        let chunks = self
            .chunker
            .chunk(text, document_id, doc_name, created_utc)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument(doc_name.to_string()));
        }

        let mut stored = 0usize;
        for embedding_group in chunks.chunks(self.config.embedding_batch_size) {
            let texts: Vec<String> = embedding_group.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;

            let embedded: Vec<Chunk> = embedding_group
                .iter()
                .cloned()
                .zip(embeddings.into_iter())
                .map(|(chunk, response)| chunk.with_embedding(response.embedding))
                .collect();

            for upsert_group in embedded.chunks(self.config.vector_store_batch_size) {
                self.vector_index.upsert(upsert_group).await?;
                stored += upsert_group.len();
            }
        }

        info!("ingested '{}' into {} chunks", doc_name, stored);

        Ok(Document {
            id: document_id,
            name: doc_name.to_string(),
            source_path,
            created_utc,
            chunk_count: stored,
            total_size_bytes: text.chars().count(),
        })
    }

    /// Ingest a batch of files, skipping (and logging) any that are missing,
    /// oversize, or of a disallowed extension. Continues past per-file
    /// failures and returns whichever documents were ingested successfully.
    pub async fn ingest_files(&self, paths: &[impl AsRef<Path>]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let path_display = path.display().to_string();

            let extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_lowercase());
            let allowed = extension
                .as_ref()
                .map(|ext| self.config.allowed_extensions.iter().any(|a| a == ext))
                .unwrap_or(false);
            if !allowed {
                warn!("skipping {}: disallowed file extension", path_display);
                continue;
            }

            let metadata = match std::fs::metadata(path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("skipping {}: {}", path_display, e);
                    continue;
                }
            };
            if metadata.len() > self.config.max_file_size_bytes {
                warn!(
                    "skipping {}: {} bytes exceeds max_file_size_bytes",
                    path_display,
                    metadata.len()
                );
                continue;
            }

            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    warn!("skipping {}: {}", path_display, e);
                    continue;
                }
            };

            let doc_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&path_display)
                .to_string();

            match self
                .ingest_text(&doc_name, &text, Some(path_display.clone()))
                .await
            {
                Ok(document) => documents.push(document),
                Err(e) => warn!("failed to ingest {}: {}", path_display, e),
            }
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkerConfig;
    use crate::llm::{EmbeddingResponse, ProviderTag};
    use crate::vector::InMemoryVectorIndex;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubEmbedder {
        dimension: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn provider_tag(&self) -> ProviderTag {
            ProviderTag::OpenAi
        }

        async fn embed(&self, _text: &str) -> Result<EmbeddingResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(EmbeddingResponse {
                embedding: vec![0.1; self.dimension],
                model: "stub".to_string(),
            })
        }
    }

    fn ingestor(embedding_batch_size: usize, vector_store_batch_size: usize) -> Ingestor {
        Ingestor::new(
            Chunker::new(ChunkerConfig::default()),
            Arc::new(StubEmbedder {
                dimension: 4,
                calls: AtomicUsize::new(0),
            }),
            Arc::new(InMemoryVectorIndex::new()),
            IngestConfig {
                embedding_batch_size,
                vector_store_batch_size,
                max_file_size_bytes: 10 * 1024 * 1024,
                allowed_extensions: vec!["txt".to_string(), "md".to_string()],
            },
        )
    }

    #[tokio::test]
    async fn ingest_text_produces_document_with_chunk_count() {
        let ingestor = ingestor(100, 50);
        let text = "Sentence one. Sentence two. Sentence three.";
        let doc = ingestor.ingest_text("runbook.md", text, None).await.unwrap();
        assert_eq!(doc.name, "runbook.md");
        assert!(doc.chunk_count >= 1);
        assert_eq!(doc.total_size_bytes, text.chars().count());
    }

    #[tokio::test]
    async fn empty_text_fails_with_empty_document() {
        let ingestor = ingestor(100, 50);
        let err = ingestor.ingest_text("empty.md", "   \n  ", None).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn blank_doc_name_fails_with_invalid_input() {
        let ingestor = ingestor(100, 50);
        let err = ingestor.ingest_text("  ", "some text", None).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn small_batches_still_ingest_all_chunks() {
        let ingestor = ingestor(1, 1);
        let text = "a".repeat(3000);
        let doc = ingestor.ingest_text("big.txt", &text, None).await.unwrap();
        assert!(doc.chunk_count > 1);
    }

    #[tokio::test]
    async fn ingest_files_skips_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("notes.exe");
        std::fs::write(&file_path, "hello").unwrap();

        let ingestor = ingestor(100, 50);
        let docs = ingestor.ingest_files(&[file_path]).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn ingest_files_skips_missing_file_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let present = dir.path().join("present.txt");
        std::fs::write(&present, "Runbook content here.").unwrap();

        let ingestor = ingestor(100, 50);
        let docs = ingestor.ingest_files(&[missing, present]).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "present.txt");
    }
}
