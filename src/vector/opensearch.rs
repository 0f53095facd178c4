//! OpenSearch-backed [`VectorIndex`] using its k-NN plugin.

use super::VectorIndex;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    pub base_url: String,
    pub index_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
}

pub struct OpenSearchVectorIndex {
    client: Client,
    config: OpenSearchConfig,
}

impl OpenSearchVectorIndex {
    pub fn new(config: OpenSearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build opensearch http client");
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.index_name,
            path
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(u), Some(p)) => builder.basic_auth(u, Some(p)),
            _ => builder,
        }
    }
}

#[async_trait]
impl VectorIndex for OpenSearchVectorIndex {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        debug!("ensuring opensearch index {} exists (dim {})", self.config.index_name, dimension);
        let body = json!({
            "settings": { "index": { "knn": true } },
            "mappings": {
                "properties": {
                    "embedding": {
                        "type": "knn_vector",
                        "dimension": dimension,
                        "method": { "name": "hnsw", "space_type": "cosinesimil", "engine": "nmslib" }
                    }
                }
            }
        });
        let resp = self
            .request(self.client.put(self.url("")))
            .json(&body)
            .send()
            .await?;
        if !resp.status().is_success() && resp.status().as_u16() != 400 {
            return Err(RagError::UpstreamVectorError(format!(
                "opensearch index create failed: {}",
                resp.status()
            )));
        }
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
            let resp = self
                .request(self.client.put(self.url(&format!("/_doc/{}", chunk.id))))
                .json(&json!({
                    "document_id": chunk.document_id,
                    "document_name": chunk.document_name,
                    "index": chunk.index,
                    "text": chunk.text,
                    "hash": chunk.hash,
                    "created_utc": chunk.created_utc.to_rfc3339(),
                    "embedding": chunk.embedding,
                }))
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(RagError::UpstreamVectorError(format!(
                    "opensearch upsert failed: {}",
                    resp.status()
                )));
            }
        }
        info!("upserted {} chunks to opensearch", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let resp = self
            .request(self.client.post(self.url("/_search")))
            .json(&json!({
                "size": top_k,
                "query": { "knn": { "embedding": { "vector": query_vector, "k": top_k } } }
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "opensearch query failed: {}",
                resp.status()
            )));
        }
        let envelope: OpenSearchResponse = resp.json().await?;
        let results = envelope
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.into_retrieved_chunk())
            .filter(|retrieved| min_score.map_or(true, |floor| retrieved.score >= floor))
            .collect();
        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let resp = self
            .request(self.client.post(self.url("/_search")))
            .json(&json!({
                "size": 0,
                "aggs": {
                    "by_document": {
                        "terms": { "field": "document_id.keyword", "size": 10_000 },
                        "aggs": {
                            "document_name": { "terms": { "field": "document_name.keyword", "size": 1 } },
                            "min_created_utc": {
                                "min": { "field": "created_utc", "format": "date_optional_time" }
                            }
                        }
                    }
                }
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "opensearch aggregation failed: {}",
                resp.status()
            )));
        }
        let envelope: OpenSearchAggResponse = resp.json().await?;
        let mut docs = Vec::with_capacity(envelope.aggregations.by_document.buckets.len());
        for bucket in envelope.aggregations.by_document.buckets {
            let Ok(id) = Uuid::parse_str(&bucket.key) else {
                continue;
            };
            let name = bucket
                .document_name
                .buckets
                .into_iter()
                .next()
                .map(|b| b.key)
                .unwrap_or_default();
            docs.push(Document {
                id,
                name,
                source_path: None,
                created_utc: bucket
                    .min_created_utc
                    .value_as_string
                    .parse()
                    .unwrap_or_else(|_| Utc::now()),
                chunk_count: bucket.doc_count,
                total_size_bytes: 0,
            });
        }
        Ok(docs)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
    }

    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>> {
        let resp = self
            .request(self.client.post(self.url("/_search")))
            .json(&json!({
                "size": 10_000,
                "query": { "term": { "document_id.keyword": id.to_string() } }
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "opensearch term query failed: {}",
                resp.status()
            )));
        }
        let envelope: OpenSearchResponse = resp.json().await?;
        let mut chunks: Vec<Chunk> = envelope
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.into_retrieved_chunk())
            .map(|retrieved| retrieved.chunk)
            .collect();
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }
}

#[derive(Deserialize)]
struct OpenSearchAggResponse {
    aggregations: OpenSearchAggregations,
}

#[derive(Deserialize)]
struct OpenSearchAggregations {
    by_document: OpenSearchTermsAgg,
}

#[derive(Deserialize)]
struct OpenSearchTermsAgg {
    buckets: Vec<OpenSearchDocumentBucket>,
}

#[derive(Deserialize)]
struct OpenSearchDocumentBucket {
    key: String,
    doc_count: usize,
    document_name: OpenSearchTermsAgg2,
    min_created_utc: OpenSearchMinAgg,
}

#[derive(Deserialize)]
struct OpenSearchTermsAgg2 {
    buckets: Vec<OpenSearchNameBucket>,
}

#[derive(Deserialize)]
struct OpenSearchNameBucket {
    key: String,
}

#[derive(Deserialize)]
struct OpenSearchMinAgg {
    #[serde(default)]
    value_as_string: String,
}

#[derive(Deserialize)]
struct OpenSearchResponse {
    hits: OpenSearchHits,
}

#[derive(Deserialize)]
struct OpenSearchHits {
    hits: Vec<OpenSearchHit>,
}

#[derive(Deserialize)]
struct OpenSearchHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: f32,
    #[serde(rename = "_source")]
    source: OpenSearchSource,
}

#[derive(Deserialize)]
struct OpenSearchSource {
    document_id: Uuid,
    document_name: String,
    index: usize,
    text: String,
    hash: String,
    created_utc: String,
}

impl OpenSearchHit {
    fn into_retrieved_chunk(self) -> Option<RetrievedChunk> {
        let id = Uuid::parse_str(&self.id).ok()?;
        let created_utc = self.source.created_utc.parse().ok()?;
        Some(RetrievedChunk {
            chunk: Chunk {
                id,
                document_id: self.source.document_id,
                document_name: self.source.document_name,
                index: self.source.index,
                snippet: crate::types::make_snippet(&self.source.text),
                text: self.source.text,
                hash: self.source.hash,
                embedding: Vec::new(),
                created_utc,
            },
            score: self.score,
        })
    }
}
