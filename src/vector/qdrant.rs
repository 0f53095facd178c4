//! Qdrant-backed [`VectorIndex`] over Qdrant's REST API.

use super::VectorIndex;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub base_url: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

pub struct QdrantVectorIndex {
    client: Client,
    config: QdrantConfig,
}

impl QdrantVectorIndex {
    pub fn new(config: QdrantConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build qdrant http client");
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/collections/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.collection,
            path
        )
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Walk the collection's scroll cursor to completion, optionally filtered
    /// to a single `document_id`, returning every matching point's payload.
    async fn scroll_all(&self, document_id: Option<Uuid>) -> Result<Vec<ScrollPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<serde_json::Value> = None;
        let filter = document_id.map(|id| {
            json!({
                "must": [{ "key": "document_id", "match": { "value": id.to_string() } }]
            })
        });

        loop {
            let mut body = json!({
                "limit": 256,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }

            let resp = self
                .auth(self.client.post(self.url("/points/scroll")))
                .json(&body)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(RagError::UpstreamVectorError(format!(
                    "qdrant scroll failed: {}",
                    resp.status()
                )));
            }

            #[derive(Deserialize)]
            struct ScrollPage {
                result: ScrollPageResult,
            }
            #[derive(Deserialize)]
            struct ScrollPageResult {
                points: Vec<ScrollPoint>,
                next_page_offset: Option<serde_json::Value>,
            }

            let page: ScrollPage = resp.json().await?;
            let exhausted = page.result.points.is_empty();
            points.extend(page.result.points);

            match page.result.next_page_offset {
                Some(next) if !next.is_null() && !exhausted => offset = Some(next),
                _ => break,
            }
        }
        Ok(points)
    }
}

#[derive(Serialize)]
struct PointPayload {
    document_id: String,
    document_name: String,
    index: usize,
    text: String,
    hash: String,
    created_utc: DateTime<Utc>,
}

#[derive(Serialize)]
struct UpsertPoint {
    id: Uuid,
    vector: Vec<f32>,
    payload: PointPayload,
}

#[derive(Deserialize)]
struct SearchResponseEnvelope {
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    payload: SearchHitPayload,
    score: f32,
}

#[derive(Deserialize)]
struct SearchHitPayload {
    document_id: Uuid,
    document_name: String,
    index: usize,
    text: String,
    hash: String,
    created_utc: DateTime<Utc>,
}

#[derive(Deserialize)]
struct ScrollPoint {
    id: serde_json::Value,
    payload: SearchHitPayload,
}

impl ScrollPoint {
    fn chunk_id(&self) -> Uuid {
        self.id
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4)
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        debug!("ensuring qdrant collection {} exists", self.config.collection);
        let body = json!({
            "vectors": { "size": dimension, "distance": "Cosine" }
        });
        let resp = self
            .auth(self.client.put(self.url("")))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() && resp.status().as_u16() != 409 {
            return Err(RagError::UpstreamVectorError(format!(
                "qdrant collection create failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut points = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(RagError::InvalidChunk(format!(
                    "chunk {} missing embedding",
                    chunk.id
                )));
            }
            points.push(UpsertPoint {
                id: chunk.id,
                vector: chunk.embedding.clone(),
                payload: PointPayload {
                    document_id: chunk.document_id.to_string(),
                    document_name: chunk.document_name.clone(),
                    index: chunk.index,
                    text: chunk.text.clone(),
                    hash: chunk.hash.clone(),
                    created_utc: chunk.created_utc,
                },
            });
        }

        let resp = self
            .auth(self.client.put(self.url("/points")))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "qdrant upsert failed: {}",
                resp.status()
            )));
        }
        info!("upserted {} chunks to qdrant", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let resp = self
            .auth(self.client.post(self.url("/points/search")))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "qdrant search failed: {}",
                resp.status()
            )));
        }
        let envelope: SearchResponseEnvelope = resp.json().await?;
        let results = envelope
            .result
            .into_iter()
            .filter(|hit| min_score.map_or(true, |floor| hit.score >= floor))
            .map(|hit| RetrievedChunk {
                chunk: Chunk {
                    id: Uuid::new_v4(),
                    document_id: hit.payload.document_id,
                    document_name: hit.payload.document_name,
                    index: hit.payload.index,
                    text: hit.payload.text.clone(),
                    snippet: crate::types::make_snippet(&hit.payload.text),
                    hash: hit.payload.hash,
                    embedding: Vec::new(),
                    created_utc: hit.payload.created_utc,
                },
                score: hit.score,
            })
            .collect();
        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let points = self.scroll_all(None).await?;
        let mut aggregates: std::collections::HashMap<Uuid, Document> =
            std::collections::HashMap::new();
        for point in points {
            let payload = &point.payload;
            aggregates
                .entry(payload.document_id)
                .and_modify(|doc| {
                    doc.chunk_count += 1;
                    doc.total_size_bytes += payload.text.chars().count();
                    if payload.created_utc < doc.created_utc {
                        doc.created_utc = payload.created_utc;
                    }
                })
                .or_insert_with(|| Document {
                    id: payload.document_id,
                    name: payload.document_name.clone(),
                    source_path: None,
                    created_utc: payload.created_utc,
                    chunk_count: 1,
                    total_size_bytes: payload.text.chars().count(),
                });
        }
        Ok(aggregates.into_values().collect())
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
    }

    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>> {
        let points = self.scroll_all(Some(id)).await?;
        let mut chunks: Vec<Chunk> = points
            .into_iter()
            .map(|point| Chunk {
                id: point.chunk_id(),
                document_id: point.payload.document_id,
                document_name: point.payload.document_name,
                index: point.payload.index,
                snippet: crate::types::make_snippet(&point.payload.text),
                text: point.payload.text,
                hash: point.payload.hash,
                embedding: Vec::new(),
                created_utc: point.payload.created_utc,
            })
            .collect();
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }
}
