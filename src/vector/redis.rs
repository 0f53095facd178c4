//! Redis-backed [`VectorIndex`] using RediSearch's `FT.SEARCH ... KNN`.

use super::VectorIndex;
use crate::error::{RagError, Result};
use crate::types::{Chunk, Document, RetrievedChunk};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct RedisVectorIndex {
    manager: ConnectionManager,
    index_name: String,
    key_prefix: String,
}

impl RedisVectorIndex {
    pub async fn connect(redis_url: &str, index_name: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
        Ok(Self {
            manager,
            index_name: index_name.to_string(),
            key_prefix: "chunk:".to_string(),
        })
    }

    fn key(&self, id: Uuid) -> String {
        format!("{}{}", self.key_prefix, id)
    }

    fn embedding_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Escape a value for interpolation into a RediSearch TAG filter.
    fn escape_tag(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            if matches!(
                c,
                '-' | '{' | '}' | '(' | ')' | '[' | ']' | '|' | '@' | ':' | '"' | ' ' | '.'
            ) {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        escaped
    }
}

#[async_trait]
impl VectorIndex for RedisVectorIndex {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        debug!(
            "assuming RediSearch index {} (dim {}) is pre-provisioned via FT.CREATE",
            self.index_name, dimension
        );
        Ok(())
    }

    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(RagError::InvalidChunk(format!(
                    "chunk {} missing embedding",
                    chunk.id
                )));
            }
            let fields: Vec<(&str, Vec<u8>)> = vec![
                ("document_id", chunk.document_id.to_string().into_bytes()),
                ("document_name", chunk.document_name.clone().into_bytes()),
                ("index", chunk.index.to_string().into_bytes()),
                ("text", chunk.text.clone().into_bytes()),
                ("hash", chunk.hash.clone().into_bytes()),
                ("created_utc", chunk.created_utc.to_rfc3339().into_bytes()),
                ("embedding", Self::embedding_bytes(&chunk.embedding)),
            ];
            let _: () = conn
                .hset_multiple(self.key(chunk.id), &fields)
                .await
                .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;
        }
        info!("upserted {} chunks to redis", chunks.len());
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        min_score: Option<f32>,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut conn = self.manager.clone();
        let blob = Self::embedding_bytes(query_vector);
        let query = format!("*=>[KNN {top_k} @embedding $vec AS score]");
        let raw: redis::Value = redis::cmd("FT.SEARCH")
            .arg(&self.index_name)
            .arg(&query)
            .arg("PARAMS")
            .arg(2)
            .arg("vec")
            .arg(blob)
            .arg("SORTBY")
            .arg("score")
            .arg("DIALECT")
            .arg(2)
            .query_async(&mut conn)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let results = parse_ft_search(raw, min_score);
        Ok(results)
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let mut conn = self.manager.clone();
        let raw: redis::Value = redis::cmd("FT.AGGREGATE")
            .arg(&self.index_name)
            .arg("*")
            .arg("GROUPBY")
            .arg(2)
            .arg("@document_id")
            .arg("@document_name")
            .arg("REDUCE")
            .arg("COUNT")
            .arg(0)
            .arg("AS")
            .arg("chunk_count")
            .arg("REDUCE")
            .arg("MIN")
            .arg(1)
            .arg("@created_utc")
            .arg("AS")
            .arg("created_utc")
            .query_async(&mut conn)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let rows = parse_ft_aggregate(raw);
        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.get("document_id").and_then(|s| Uuid::parse_str(s).ok()) else {
                continue;
            };
            let name = row.get("document_name").cloned().unwrap_or_default();
            let chunk_count: usize = row
                .get("chunk_count")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let created_utc: DateTime<Utc> = row
                .get("created_utc")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(Utc::now);
            docs.push(Document {
                id,
                name,
                source_path: None,
                created_utc,
                chunk_count,
                total_size_bytes: 0,
            });
        }
        Ok(docs)
    }

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.list_documents().await?.into_iter().find(|d| d.id == id))
    }

    async fn get_document_chunks(&self, id: Uuid) -> Result<Vec<Chunk>> {
        let mut conn = self.manager.clone();
        let query = format!("@document_id:{{{}}}", Self::escape_tag(&id.to_string()));
        let raw: redis::Value = redis::cmd("FT.SEARCH")
            .arg(&self.index_name)
            .arg(&query)
            .arg("LIMIT")
            .arg(0)
            .arg(10_000)
            .query_async(&mut conn)
            .await
            .map_err(|e| RagError::UpstreamVectorError(e.to_string()))?;

        let mut chunks: Vec<Chunk> = parse_ft_search_rows(raw)
            .into_iter()
            .filter_map(|row| map_to_chunk(&row))
            .collect();
        chunks.sort_by_key(|chunk| chunk.index);
        Ok(chunks)
    }
}

/// Parse a RediSearch `FT.SEARCH` reply into retrieved chunks. The reply
/// shape is `[count, key, [field, value, field, value, ...], key, [...], ...]`.
fn parse_ft_search(raw: redis::Value, min_score: Option<f32>) -> Vec<RetrievedChunk> {
    let mut results = Vec::new();
    for map in parse_ft_search_rows(raw) {
        if let Some(chunk) = map_to_retrieved_chunk(&map) {
            if min_score.map_or(true, |floor| chunk.score >= floor) {
                results.push(chunk);
            }
        }
    }
    results
}

/// Parse a `FT.SEARCH` reply into one field map per matched document,
/// skipping the leading result-count element.
fn parse_ft_search_rows(raw: redis::Value) -> Vec<HashMap<String, String>> {
    let redis::Value::Array(items) = raw else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    let mut i = 1; // skip the leading count
    while i + 1 < items.len() {
        if let redis::Value::Array(fields) = &items[i + 1] {
            rows.push(fields_to_map(fields));
        }
        i += 2;
    }
    rows
}

/// Parse a `FT.AGGREGATE` reply into one field map per result row. Unlike
/// `FT.SEARCH`, aggregate replies have no leading count and no document keys.
fn parse_ft_aggregate(raw: redis::Value) -> Vec<HashMap<String, String>> {
    let redis::Value::Array(items) = raw else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            redis::Value::Array(fields) => Some(fields_to_map(fields)),
            _ => None,
        })
        .collect()
}

fn fields_to_map(fields: &[redis::Value]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut j = 0;
    while j + 1 < fields.len() {
        if let (redis::Value::BulkString(k), redis::Value::BulkString(v)) =
            (&fields[j], &fields[j + 1])
        {
            map.insert(
                String::from_utf8_lossy(k).to_string(),
                String::from_utf8_lossy(v).to_string(),
            );
        }
        j += 2;
    }
    map
}

/// RediSearch's `KNN` query over a `COSINE`-metric field returns a cosine
/// *distance* in `score` (lower = more similar). Invert it to a similarity
/// (`1 - d`) so it matches this crate's "higher = more similar" contract.
fn map_to_retrieved_chunk(map: &HashMap<String, String>) -> Option<RetrievedChunk> {
    let chunk = map_to_chunk(map)?;
    let distance: f32 = map.get("score")?.parse().ok()?;
    Some(RetrievedChunk {
        chunk,
        score: 1.0 - distance,
    })
}

fn map_to_chunk(map: &HashMap<String, String>) -> Option<Chunk> {
    let document_id = Uuid::parse_str(map.get("document_id")?).ok()?;
    let document_name = map.get("document_name")?.clone();
    let index: usize = map.get("index")?.parse().ok()?;
    let text = map.get("text")?.clone();
    let hash = map.get("hash")?.clone();
    let created_utc: DateTime<Utc> = map.get("created_utc")?.parse().ok()?;
    Some(Chunk {
        id: Uuid::new_v4(),
        document_id,
        document_name,
        index,
        snippet: crate::types::make_snippet(&text),
        text,
        hash,
        embedding: Vec::new(),
        created_utc,
    })
}
