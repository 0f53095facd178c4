//! Deterministic, bounded, overlapping text chunking.

use crate::error::{RagError, Result};
use crate::types::Chunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Window within which the chunker looks for a sentence boundary to snap to.
const SENTENCE_SNAP_WINDOW: usize = 100;

/// Configuration for [`Chunker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkerConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_max_chunks")]
    pub max_chunks_per_document: usize,
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    150
}
fn default_max_chunks() -> usize {
    5000
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
            max_chunks_per_document: default_max_chunks(),
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::Config("chunk_size must be > 0".to_string()));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::Config(
                "overlap must be strictly less than chunk_size".to_string(),
            ));
        }
        if self.max_chunks_per_document == 0 {
            return Err(RagError::Config(
                "max_chunks_per_document must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Splits normalized UTF-8 text into a deterministic sequence of overlapping,
/// indexed windows.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Normalize text before chunking: CRLF -> LF, collapse runs of
    /// horizontal whitespace to a single space (preserving LF), trim ends.
    pub fn normalize(text: &str) -> String {
        let unified = text.replace("\r\n", "\n");
        let mut out = String::with_capacity(unified.len());
        let mut prev_was_hspace = false;
        for c in unified.chars() {
            let is_hspace = matches!(c, ' ' | '\t' | '\x0c' | '\x0b');
            if is_hspace {
                if !prev_was_hspace {
                    out.push(' ');
                }
                prev_was_hspace = true;
            } else {
                out.push(c);
                prev_was_hspace = false;
            }
        }
        out.trim().to_string()
    }

    /// Chunk `text` belonging to `document_id`/`document_name`, returning
    /// chunks in ascending `index` order with embeddings left empty.
    pub fn chunk(
        &self,
        text: &str,
        document_id: Uuid,
        document_name: &str,
        created_utc: DateTime<Utc>,
    ) -> Result<Vec<Chunk>> {
        let normalized = Self::normalize(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let bytes_len = normalized.len();
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        let mut index = 0usize;

        while start < bytes_len {
            let mut end = Self::floor_char_boundary(&normalized, (start + chunk_size).min(bytes_len));
            if end <= start {
                end = Self::ceil_char_boundary(&normalized, start + 1).min(bytes_len);
            }

            if end < bytes_len {
                if let Some(boundary) = Self::find_sentence_boundary(&normalized, start, end) {
                    end = boundary + 1;
                }
            }

            let window = normalized[start..end].trim();
            if !window.is_empty() {
                if chunks.len() >= self.config.max_chunks_per_document {
                    return Err(RagError::ChunkExplosion {
                        document_name: document_name.to_string(),
                        limit: self.config.max_chunks_per_document,
                    });
                }
                chunks.push(Chunk::new(
                    document_id,
                    document_name.to_string(),
                    index,
                    window.to_string(),
                    created_utc,
                ));
                index += 1;
            }

            if end == bytes_len {
                break;
            }

            let advance_target = Self::floor_char_boundary(&normalized, end.saturating_sub(overlap));
            start = advance_target.max(Self::ceil_char_boundary(&normalized, start + 1));
        }

        Ok(chunks)
    }

    /// Largest char boundary in `s` at or before `index`.
    fn floor_char_boundary(s: &str, mut index: usize) -> usize {
        if index >= s.len() {
            return s.len();
        }
        while index > 0 && !s.is_char_boundary(index) {
            index -= 1;
        }
        index
    }

    /// Smallest char boundary in `s` at or after `index`.
    fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
        if index >= s.len() {
            return s.len();
        }
        while index < s.len() && !s.is_char_boundary(index) {
            index += 1;
        }
        index
    }

    /// Within `text[start..end]`, search the last [`SENTENCE_SNAP_WINDOW`]
    /// characters of the window (bounded below by `start`) for the rightmost
    /// `.` or `\n`. Accept it only if it lies at or past the window's
    /// midpoint, per the half-window acceptance rule.
    fn find_sentence_boundary(text: &str, start: usize, end: usize) -> Option<usize> {
        let raw_search_start = end.saturating_sub(SENTENCE_SNAP_WINDOW).max(start);
        let search_start = Self::floor_char_boundary(text, raw_search_start).max(start);
        let search_slice = &text[search_start..end];

        let boundary = search_slice
            .rfind(|c: char| c == '.' || c == '\n')
            .map(|pos| search_start + pos)?;

        let half_window = ((end - start) / 2).max(1);
        let threshold = start + half_window;
        if boundary >= threshold {
            Some(boundary)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunker(chunk_size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig {
            chunk_size,
            overlap,
            max_chunks_per_document: 5000,
        })
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let c = chunker(1000, 150);
        let out = c.chunk("   \n  ", Uuid::new_v4(), "doc", Utc::now()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let c = chunker(1000, 150);
        let out = c
            .chunk("This is a short runbook note.", Uuid::new_v4(), "doc", Utc::now())
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 0);
    }

    #[test]
    fn indices_are_dense_and_ascending() {
        let c = chunker(50, 10);
        let text = "This is sentence one. This is sentence two. This is sentence three. This is sentence four. This is sentence five.";
        let out = c.chunk(text, Uuid::new_v4(), "doc", Utc::now()).unwrap();
        for (i, chunk) in out.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }

    #[test]
    fn chunk_completeness_covers_every_nonwhitespace_char() {
        let c = chunker(50, 10);
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu nu xi omicron pi.";
        let out = c.chunk(text, Uuid::new_v4(), "doc", Utc::now()).unwrap();
        let normalized = Chunker::normalize(text);
        let concatenated: String = out.iter().map(|c| c.text.clone()).collect::<Vec<_>>().join("");
        for ch in normalized.chars().filter(|c| !c.is_whitespace()) {
            assert!(concatenated.contains(ch), "missing character {ch:?}");
        }
    }

    #[test]
    fn chunk_bound_is_at_most_chunk_size_plus_window() {
        let c = chunker(1000, 150);
        let text: String = std::iter::repeat("word ").take(1000).collect();
        let out = c.chunk(&text, Uuid::new_v4(), "doc", Utc::now()).unwrap();
        for chunk in &out {
            assert!(chunk.text.len() <= 1000 + SENTENCE_SNAP_WINDOW);
        }
    }

    #[test]
    fn hash_determinism_across_reruns() {
        let c = chunker(50, 10);
        let text = "This is sentence one. This is sentence two. This is sentence three.";
        let first = c.chunk(text, Uuid::new_v4(), "doc", Utc::now()).unwrap();
        let second = c.chunk(text, Uuid::new_v4(), "doc", Utc::now()).unwrap();
        let first_hashes: Vec<_> = first.iter().map(|c| c.hash.clone()).collect();
        let second_hashes: Vec<_> = second.iter().map(|c| c.hash.clone()).collect();
        assert_eq!(first_hashes, second_hashes);
    }

    #[test]
    fn chunking_determinism_scenario() {
        // Scenario 6: 3000 chars, chunkSize=1000, overlap=150.
        let text: String = std::iter::repeat('x').take(3000).collect();
        let c = chunker(1000, 150);
        let out = c.chunk(&text, Uuid::new_v4(), "doc", Utc::now()).unwrap();
        assert!(out.len() <= 4);
        for chunk in &out {
            assert!(chunk.text.len() <= 1100);
        }
        for i in 0..out.len() {
            assert_eq!(out[i].index, i);
        }
    }

    #[test]
    fn max_chunks_per_document_raises_chunk_explosion() {
        let c = Chunker::new(ChunkerConfig {
            chunk_size: 10,
            overlap: 1,
            max_chunks_per_document: 2,
        });
        let text: String = std::iter::repeat("word ").take(200).collect();
        let err = c.chunk(&text, Uuid::new_v4(), "doc", Utc::now()).unwrap_err();
        assert!(matches!(err, RagError::ChunkExplosion { .. }));
    }

    #[test]
    fn normalize_collapses_horizontal_whitespace_and_crlf() {
        let normalized = Chunker::normalize("a\r\nb\t\tc   d\n");
        assert_eq!(normalized, "a\nb c d");
    }
}
