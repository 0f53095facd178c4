//! Postgres-backed [`VectorIndex`] using the `pgvector` extension.

use super::VectorIndex;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

pub struct PostgresVectorIndex {
    pool: PgPool,
}

impl PostgresVectorIndex {
    pub async fn connect(database_url: &str, timeout_secs: u64) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorIndex for PostgresVectorIndex {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        debug!("ensuring chunks table exists with dimension {dimension}");
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let create = format!(
            "CREATE TABLE IF NOT EXISTS chunks (
                id UUID PRIMARY KEY,
                document_id UUID NOT NULL,
                document_name TEXT NOT NULL,
                index BIGINT NOT NULL,
                text TEXT NOT NULL,
                hash TEXT NOT NULL,
                embedding vector({dimension}) NOT NULL,
                created_utc TIMESTAMPTZ NOT NULL
            )"
        );
        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(RagError::InvalidChunk(format!(
                    "chunk {} missing embedding",
                    chunk.id
                )));
            }
            let vector = Vector::from(chunk.embedding.clone());
            sqlx::query(
                "INSERT INTO chunks (id, document_id, document_name, index, text, hash, embedding, created_utc)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (id) DO UPDATE SET
                    document_id = EXCLUDED.document_id,
                    document_name = EXCLUDED.document_name,
                    index = EXCLUDED.index,
                    text = EXCLUDED.text,
                    hash = EXCLUDED.hash,
                    embedding = EXCLUDED.embedding,
                    created_utc = EXCLUDED.created_utc",
            )
            .bind(chunk.id)
            .bind(chunk.document_id)
            .bind(&chunk.document_name)
            .bind(chunk.index as i64)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vector)
            .bind(chunk.created_utc)
            .execute(&self.pool)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
        }
        info!("upserted {} chunks to postgres", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let vector = Vector::from(query_vector.to_vec());
        let rows = sqlx::query(
            "SELECT id, document_id, document_name, index, text, hash, created_utc,
                    1.0 - (embedding <=> $1) AS similarity
             FROM chunks
             ORDER BY embedding <=> $1
             LIMIT $2",
        )
        .bind(vector)
        .bind(top_k as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let score: f64 = row.try_get("similarity").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            let score = score as f32;
            if let Some(floor) = min_score {
                if score < floor {
                    continue;
                }
            }
            let text: String = row.try_get("text").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            let index: i64 = row.try_get("index").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            let created_utc: DateTime<Utc> = row.try_get("created_utc").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            results.push(RetrievedChunk {
                chunk: Chunk {
                    id: row.try_get("id").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                    document_id: row.try_get("document_id").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                    document_name: row.try_get("document_name").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                    index: index as usize,
                    snippet: crate::types::make_snippet(&text),
                    text,
                    hash: row.try_get("hash").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                    embedding: Vec::new(),
                    created_utc,
                },
                score,
            });
        }
        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT document_id, document_name, COUNT(*) AS chunk_count,
                    MIN(created_utc) AS created_utc, SUM(char_length(text)) AS total_size
             FROM chunks
             GROUP BY document_id, document_name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let chunk_count: i64 = row.try_get("chunk_count").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            let total_size: i64 = row.try_get("total_size").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            docs.push(Document {
                id: row.try_get("document_id").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                name: row.try_get("document_name").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                source_path: None,
                created_utc: row.try_get("created_utc").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                chunk_count: chunk_count as usize,
                total_size_bytes: total_size as usize,
            });
        }
        Ok(docs)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
    }

    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, document_name, index, text, hash, created_utc
             FROM chunks WHERE document_id = $1 ORDER BY index ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let mut chunks = Vec::with_capacity(rows.len());
        for row in rows {
            let text: String = row.try_get("text").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            let index: i64 = row.try_get("index").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
            chunks.push(Chunk {
                id: row.try_get("id").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                document_id: row.try_get("document_id").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                document_name: row.try_get("document_name").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                index: index as usize,
                snippet: crate::types::make_snippet(&text),
                text,
                hash: row.try_get("hash").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
                embedding: Vec::new(),
                created_utc: row.try_get("created_utc").map_err(|e| RagError::UpstreamVectorError(e.to_string()))?,
            });
        }
        Ok(chunks)
    }
}
