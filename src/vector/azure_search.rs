//! Azure AI Search-backed [`VectorIndex`], using its vector-field REST API.

use super::VectorIndex;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AzureAiSearchConfig {
    pub endpoint: String,
    pub index_name: String,
    pub api_key: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for AzureAiSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            index_name: String::new(),
            api_key: String::new(),
            api_version: "2023-11-01".to_string(),
            timeout_secs: 120,
        }
    }
}

pub struct AzureAiSearchVectorIndex {
    client: Client,
    config: AzureAiSearchConfig,
}

impl AzureAiSearchVectorIndex {
    pub fn new(config: AzureAiSearchConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to build azure search http client");
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.index_name,
            path,
            self.config.api_version
        )
    }
}

#[async_trait]
impl VectorIndex for AzureAiSearchVectorIndex {
    async fn initialize(&self, _dimension: usize) -> Result<()> {
        debug!("assuming azure ai search index {} is pre-provisioned", self.config.index_name);
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut docs = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(RagError::InvalidChunk(format!(
                    "chunk {} missing embedding",
                    chunk.id
                )));
            }
            docs.push(json!({
                "@search.action": "mergeOrUpload",
                "id": chunk.id.to_string(),
                "documentId": chunk.document_id.to_string(),
                "documentName": chunk.document_name,
                "index": chunk.index,
                "text": chunk.text,
                "hash": chunk.hash,
                "createdUtc": chunk.created_utc.to_rfc3339(),
                "embedding": chunk.embedding,
            }));
        }

        let resp = self
            .client
            .post(self.url("/docs/index"))
            .header("api-key", &self.config.api_key)
            .json(&json!({ "value": docs }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "azure ai search upsert failed: {}",
                resp.status()
            )));
        }
        info!("upserted {} chunks to azure ai search", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let resp = self
            .client
            .post(self.url("/docs/search"))
            .header("api-key", &self.config.api_key)
            .json(&json!({
                "vectorQueries": [{
                    "kind": "vector",
                    "vector": query_vector,
                    "k": top_k,
                    "fields": "embedding",
                }]
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "azure ai search query failed: {}",
                resp.status()
            )));
        }
        let envelope: AzureSearchResponse = resp.json().await?;
        let results = envelope
            .value
            .into_iter()
            .filter_map(|doc| doc.into_retrieved_chunk())
            .filter(|retrieved| min_score.map_or(true, |floor| retrieved.score >= floor))
            .collect();
        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let resp = self
            .client
            .post(self.url("/docs/search"))
            .header("api-key", &self.config.api_key)
            .json(&json!({
                "search": "*",
                "top": 0,
                "facets": ["documentId,count:10000"],
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "azure ai search facet query failed: {}",
                resp.status()
            )));
        }
        let envelope: AzureFacetResponse = resp.json().await?;
        let facets = envelope.facets.document_id;

        let mut docs = Vec::with_capacity(facets.len());
        for facet in facets {
            let Ok(id) = Uuid::parse_str(&facet.value) else {
                continue;
            };
            if let Some(mut chunks) = self.fetch_document_filter(id, 1).await? {
                let first = chunks.remove(0);
                docs.push(Document {
                    id,
                    name: first.document_name,
                    source_path: None,
                    created_utc: first.created_utc,
                    chunk_count: facet.count,
                    total_size_bytes: 0,
                });
            }
        }
        Ok(docs)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
    }

    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>> {
        let mut chunks = self.fetch_document_filter(id, 10_000).await?.unwrap_or_default();
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }
}

impl AzureAiSearchVectorIndex {
    /// Filter query for chunks belonging to `document_id`, returning `None`
    /// when nothing matched.
    async fn fetch_document_filter(&self, document_id: Uuid, top: usize) -> Result<Option<Vec<Chunk>>> {
        let resp = self
            .client
            .post(self.url("/docs/search"))
            .header("api-key", &self.config.api_key)
            .json(&json!({
                "search": "*",
                "filter": format!("documentId eq '{document_id}'"),
                "top": top,
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RagError::UpstreamVectorError(format!(
                "azure ai search filter query failed: {}",
                resp.status()
            )));
        }
        let envelope: AzureSearchResponse = resp.json().await?;
        if envelope.value.is_empty() {
            return Ok(None);
        }
        let chunks = envelope
            .value
            .into_iter()
            .filter_map(|doc| doc.into_retrieved_chunk())
            .map(|retrieved| retrieved.chunk)
            .collect();
        Ok(Some(chunks))
    }
}

#[derive(Deserialize)]
struct AzureFacetResponse {
    #[serde(rename = "@search.facets")]
    facets: AzureFacets,
}

#[derive(Deserialize)]
struct AzureFacets {
    #[serde(rename = "documentId")]
    document_id: Vec<AzureFacetValue>,
}

#[derive(Deserialize)]
struct AzureFacetValue {
    value: String,
    count: usize,
}

#[derive(Deserialize)]
struct AzureSearchResponse {
    value: Vec<AzureSearchDoc>,
}

#[derive(Deserialize)]
struct AzureSearchDoc {
    id: String,
    #[serde(rename = "documentId")]
    document_id: String,
    #[serde(rename = "documentName")]
    document_name: String,
    index: usize,
    text: String,
    hash: String,
    #[serde(rename = "createdUtc")]
    created_utc: String,
    #[serde(rename = "@search.score")]
    search_score: f32,
}

impl AzureSearchDoc {
    fn into_retrieved_chunk(self) -> Option<RetrievedChunk> {
        let id = Uuid::parse_str(&self.id).ok()?;
        let document_id = Uuid::parse_str(&self.document_id).ok()?;
        let created_utc = self.created_utc.parse().ok()?;
        Some(RetrievedChunk {
            chunk: Chunk {
                id,
                document_id,
                document_name: self.document_name,
                index: self.index,
                snippet: crate::types::make_snippet(&self.text),
                text: self.text,
                hash: self.hash,
                embedding: Vec::new(),
                created_utc,
            },
            score: self.search_score,
        })
    }
}
