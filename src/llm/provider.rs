//! Capability traits and the provider tag used to select an implementation.

use crate::error::Result;
use crate::llm::{EmbeddingResponse, GenerationResponse, Message};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Selects which concrete provider backs a `ChatModel`/`Embedder` pair.
///
/// Capability is structural, not runtime-checked: `Anthropic` implements only
/// `ChatModel`. A configuration that asks for an `Anthropic` embedder fails at
/// [`crate::llm::factory::ProviderFactory::build_embedder`], before any
/// network call is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    OpenAi,
    Google,
    Microsoft,
    Amazon,
    Anthropic,
    Mistral,
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderTag::OpenAi => "openai",
            ProviderTag::Google => "google",
            ProviderTag::Microsoft => "microsoft",
            ProviderTag::Amazon => "amazon",
            ProviderTag::Anthropic => "anthropic",
            ProviderTag::Mistral => "mistral",
        };
        write!(f, "{name}")
    }
}

/// Settings resolved for a single provider instance. Construction is the
/// only place capability/configuration mismatches are allowed to surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub tag: ProviderTag,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub chat_model: String,
    pub embedding_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Provider-specific extras (e.g. Azure deployment name, Bedrock region).
    #[serde(default)]
    pub options: serde_json::Value,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

/// A language model capable of chat-style generation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn provider_tag(&self) -> ProviderTag;
    fn name(&self) -> &str;

    async fn generate(&self, system: &str, messages: &[Message]) -> Result<GenerationResponse>;
}

/// A language model capable of producing fixed-dimensional embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn provider_tag(&self) -> ProviderTag;

    /// Embed a single piece of text.
    async fn embed(&self, text: &str) -> Result<EmbeddingResponse>;

    /// Embed a batch, preserving input order. The default loops over
    /// [`Embedder::embed`]; providers with a native batch endpoint should
    /// override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResponse>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tag_display_matches_wire_name() {
        assert_eq!(ProviderTag::OpenAi.to_string(), "openai");
        assert_eq!(ProviderTag::Microsoft.to_string(), "microsoft");
    }
}
