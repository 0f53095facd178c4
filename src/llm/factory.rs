//! Builds concrete `ChatModel`/`Embedder` instances from [`ProviderSettings`].
//!
//! Capability mismatches (asking an `Anthropic` tag for an embedder) fail
//! here, at construction, rather than at the first call.

use crate::error::{RagError, Result};
use crate::llm::provider::{ChatModel, Embedder, ProviderSettings, ProviderTag};
use crate::llm::providers::{
    anthropic::AnthropicChatModel,
    azure_openai::AzureOpenAiProvider,
    bedrock::BedrockProvider,
    google::GoogleProvider,
    mistral::MistralProvider,
    openai::OpenAiProvider,
};
use std::sync::Arc;

pub struct ProviderFactory;

impl ProviderFactory {
    pub fn build_chat_model(settings: &ProviderSettings) -> Result<Arc<dyn ChatModel>> {
        match settings.tag {
            ProviderTag::OpenAi => Ok(Arc::new(OpenAiProvider::new(settings.clone())?)),
            ProviderTag::Microsoft => Ok(Arc::new(AzureOpenAiProvider::new(settings.clone())?)),
            ProviderTag::Mistral => Ok(Arc::new(MistralProvider::new(settings.clone())?)),
            ProviderTag::Anthropic => Ok(Arc::new(AnthropicChatModel::new(settings.clone())?)),
            ProviderTag::Google => Ok(Arc::new(GoogleProvider::new(settings.clone())?)),
            ProviderTag::Amazon => Ok(Arc::new(BedrockProvider::new(settings.clone())?)),
        }
    }

    pub fn build_embedder(settings: &ProviderSettings) -> Result<Arc<dyn Embedder>> {
        match settings.tag {
            ProviderTag::OpenAi => Ok(Arc::new(OpenAiProvider::new(settings.clone())?)),
            ProviderTag::Microsoft => Ok(Arc::new(AzureOpenAiProvider::new(settings.clone())?)),
            ProviderTag::Mistral => Ok(Arc::new(MistralProvider::new(settings.clone())?)),
            ProviderTag::Google => Ok(Arc::new(GoogleProvider::new(settings.clone())?)),
            ProviderTag::Amazon => Ok(Arc::new(BedrockProvider::new(settings.clone())?)),
            ProviderTag::Anthropic => Err(RagError::Config(format!(
                "provider '{}' does not support embeddings",
                settings.tag
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(tag: ProviderTag) -> ProviderSettings {
        ProviderSettings {
            tag,
            api_key: Some("test-key".to_string()),
            base_url: Some("https://example.com".to_string()),
            chat_model: "chat-model".to_string(),
            embedding_model: Some("embed-model".to_string()),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 30,
            options: json!({}),
        }
    }

    #[test]
    fn anthropic_embedder_fails_at_construction() {
        let err = ProviderFactory::build_embedder(&settings(ProviderTag::Anthropic)).unwrap_err();
        assert!(matches!(err, RagError::Config(_)));
    }

    #[test]
    fn anthropic_chat_model_builds_fine() {
        assert!(ProviderFactory::build_chat_model(&settings(ProviderTag::Anthropic)).is_ok());
    }

    #[test]
    fn openai_embedder_builds_fine() {
        assert!(ProviderFactory::build_embedder(&settings(ProviderTag::OpenAi)).is_ok());
    }
}
