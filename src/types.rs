//! Core data model: documents, chunks, citations, and the ask response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Maximum length of a chunk's preview snippet, in characters.
pub const SNIPPET_MAX_CHARS: usize = 240;

/// A document that has been fully ingested into the vector index.
///
/// Never mutated after creation; deleted only by removing all of its chunks,
/// which is outside this crate's scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub source_path: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub chunk_count: usize,
    /// Character count of the original ingested text, not a byte count.
    pub total_size_bytes: usize,
}

/// A bounded, indexed slice of a document, embedded and ready for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub document_name: String,
    pub index: usize,
    pub text: String,
    pub snippet: String,
    pub hash: String,
    pub embedding: Vec<f32>,
    pub created_utc: DateTime<Utc>,
}

impl Chunk {
    /// Build a chunk, deriving `snippet` and `hash` from `text`. The embedding
    /// is attached later, once the Ingestor has called the Embedder.
    pub fn new(
        document_id: Uuid,
        document_name: String,
        index: usize,
        text: String,
        created_utc: DateTime<Utc>,
    ) -> Self {
        let snippet = make_snippet(&text);
        let hash = hash_text(&text);
        Self {
            id: Uuid::new_v4(),
            document_id,
            document_name,
            index,
            text,
            snippet,
            hash,
            embedding: Vec::new(),
            created_utc,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

/// First [`SNIPPET_MAX_CHARS`] characters of `text`, with a trailing ellipsis
/// if truncation occurred.
pub fn make_snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_MAX_CHARS {
        return text.to_string();
    }
    let mut snippet: String = text.chars().take(SNIPPET_MAX_CHARS).collect();
    snippet.push_str("...");
    snippet
}

/// Lowercase hex SHA-256 of `text`.
pub fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// A `[docName:chunkIndex]` marker parsed out of a model's answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub document_name: String,
    pub chunk_index: usize,
    pub snippet: String,
    pub score: Option<f32>,
}

/// A stored [`Chunk`] plus the similarity score the vector backend assigned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The result of a single `Ask` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub answer_markdown: String,
    pub citations: Vec<Citation>,
    pub retrieved: Vec<RetrievedChunk>,
    pub elapsed_ms: u64,
    pub tokens_used: Option<u32>,
}

impl AskResponse {
    pub fn empty(answer_markdown: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            answer_markdown: answer_markdown.into(),
            citations: Vec::new(),
            retrieved: Vec::new(),
            elapsed_ms,
            tokens_used: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_under_limit_is_unchanged() {
        assert_eq!(make_snippet("short text"), "short text");
    }

    #[test]
    fn snippet_over_limit_is_truncated_with_ellipsis() {
        let text: String = std::iter::repeat('a').take(300).collect();
        let snippet = make_snippet(&text);
        assert_eq!(snippet.chars().count(), SNIPPET_MAX_CHARS + 3);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_text("hello"), hash_text("hello"));
        assert_ne!(hash_text("hello"), hash_text("world"));
    }

    #[test]
    fn hash_is_lowercase_hex_and_64_chars() {
        let hash = hash_text("payment-ops");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
