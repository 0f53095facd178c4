//! Aggregate application configuration: pipeline tunables plus the backend
//! and provider selection, loaded from JSON/TOML/YAML.

use crate::chunker::ChunkerConfig;
use crate::error::{RagError, Result};
use crate::llm::ProviderSettings;
use crate::vector::VectorBackendKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub answerer: AnswererConfig,
    pub vector_backend: VectorBackendConfig,
    pub model_provider: ProviderSettings,
    #[serde(default = "default_vector_dimension")]
    pub vector_dimension: usize,
}

fn default_vector_dimension() -> usize {
    1536
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestConfig {
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,
    #[serde(default = "default_vector_store_batch_size")]
    pub vector_store_batch_size: usize,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_embedding_batch_size() -> usize {
    100
}
fn default_vector_store_batch_size() -> usize {
    50
}
fn default_max_file_size_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_allowed_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            embedding_batch_size: default_embedding_batch_size(),
            vector_store_batch_size: default_vector_store_batch_size(),
            max_file_size_bytes: default_max_file_size_bytes(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.embedding_batch_size == 0 {
            return Err(RagError::Config(
                "embedding_batch_size must be > 0".to_string(),
            ));
        }
        if self.vector_store_batch_size == 0 {
            return Err(RagError::Config(
                "vector_store_batch_size must be > 0".to_string(),
            ));
        }
        if self.max_file_size_bytes == 0 {
            return Err(RagError::Config(
                "max_file_size_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieverConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default)]
    pub min_similarity_score: Option<f32>,
}

fn default_top_k() -> usize {
    5
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            min_similarity_score: None,
        }
    }
}

impl RetrieverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_top_k == 0 {
            return Err(RagError::Config("default_top_k must be > 0".to_string()));
        }
        if let Some(score) = self.min_similarity_score {
            if !(-1.0..=1.0).contains(&score) {
                return Err(RagError::Config(
                    "min_similarity_score must be within [-1.0, 1.0]".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswererConfig {
    #[serde(default = "default_max_question_length")]
    pub max_question_length: usize,
    #[serde(default = "default_answerer_temperature")]
    pub temperature: f32,
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
}

fn default_max_question_length() -> usize {
    2000
}
fn default_answerer_temperature() -> f32 {
    0.1
}
fn default_chat_timeout_secs() -> u64 {
    120
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            max_question_length: default_max_question_length(),
            temperature: default_answerer_temperature(),
            chat_timeout_secs: default_chat_timeout_secs(),
        }
    }
}

impl AnswererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_question_length == 0 {
            return Err(RagError::Config(
                "max_question_length must be > 0".to_string(),
            ));
        }
        if self.chat_timeout_secs == 0 {
            return Err(RagError::Config(
                "chat_timeout_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Vector backend selection plus the connection details each backend needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VectorBackendConfig {
    InMemory,
    #[serde(rename_all = "camelCase")]
    Qdrant {
        base_url: String,
        collection_name: String,
        api_key: Option<String>,
        #[serde(default = "default_chat_timeout_secs")]
        timeout_secs: u64,
    },
    #[serde(rename_all = "camelCase")]
    AzureAiSearch {
        base_url: String,
        index_name: String,
        api_key: String,
        #[serde(default = "default_chat_timeout_secs")]
        timeout_secs: u64,
    },
    #[serde(rename_all = "camelCase")]
    Postgres {
        connection_string: String,
        table_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Redis {
        connection_string: String,
        index_name: String,
    },
    #[serde(rename_all = "camelCase")]
    OpenSearch {
        base_url: String,
        index_name: String,
        username: Option<String>,
        password: Option<String>,
        #[serde(default = "default_chat_timeout_secs")]
        timeout_secs: u64,
    },
}

impl VectorBackendConfig {
    pub fn kind(&self) -> VectorBackendKind {
        match self {
            VectorBackendConfig::InMemory => VectorBackendKind::InMemory,
            VectorBackendConfig::Qdrant { .. } => VectorBackendKind::Qdrant,
            VectorBackendConfig::AzureAiSearch { .. } => VectorBackendKind::AzureAiSearch,
            VectorBackendConfig::Postgres { .. } => VectorBackendKind::Postgres,
            VectorBackendConfig::Redis { .. } => VectorBackendKind::Redis,
            VectorBackendConfig::OpenSearch { .. } => VectorBackendKind::OpenSearch,
        }
    }
}

impl AppConfig {
    /// Load configuration from a file, dispatching on extension.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        let config = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| RagError::Config(format!("invalid toml config: {e}")))?,
            Some("yaml") | Some("yml") => serde_yml::from_str(&content)
                .map_err(|e| RagError::Config(format!("invalid yaml config: {e}")))?,
            other => {
                return Err(RagError::Config(format!(
                    "unsupported config file extension: {other:?}"
                )))
            }
        };
        Ok(config)
    }

    /// Persist configuration to a file, dispatching on extension.
    pub fn to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = match path.as_ref().extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)
                .map_err(|e| RagError::Config(format!("cannot serialize toml config: {e}")))?,
            Some("yaml") | Some("yml") => serde_yml::to_string(self)
                .map_err(|e| RagError::Config(format!("cannot serialize yaml config: {e}")))?,
            other => {
                return Err(RagError::Config(format!(
                    "unsupported config file extension: {other:?}"
                )))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        self.ingest.validate()?;
        self.retriever.validate()?;
        self.answerer.validate()?;

        if self.vector_dimension == 0 {
            return Err(RagError::Config("vector_dimension must be > 0".to_string()));
        }

        if self.model_provider.tag == crate::llm::ProviderTag::Anthropic
            && self.model_provider.embedding_model.is_some()
        {
            return Err(RagError::Config(
                "anthropic does not support embeddings; remove embedding_model or pick another model_provider for embeddings".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_config() -> AppConfig {
        AppConfig {
            chunker: ChunkerConfig::default(),
            ingest: IngestConfig::default(),
            retriever: RetrieverConfig::default(),
            answerer: AnswererConfig::default(),
            vector_backend: VectorBackendConfig::InMemory,
            model_provider: ProviderSettings {
                tag: crate::llm::ProviderTag::OpenAi,
                api_key: Some("test-key".to_string()),
                base_url: None,
                chat_model: "gpt-test".to_string(),
                embedding_model: Some("embed-test".to_string()),
                max_tokens: 4096,
                temperature: 0.1,
                timeout_secs: 120,
                options: json!({}),
            },
            vector_dimension: 1536,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn anthropic_with_embedding_model_fails_validation() {
        let mut config = valid_config();
        config.model_provider.tag = crate::llm::ProviderTag::Anthropic;
        config.model_provider.embedding_model = Some("whatever".to_string());
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn zero_vector_dimension_fails_validation() {
        let mut config = valid_config();
        config.vector_dimension = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn backend_kind_matches_config_variant() {
        assert_eq!(
            VectorBackendConfig::InMemory.kind(),
            VectorBackendKind::InMemory
        );
    }
}
