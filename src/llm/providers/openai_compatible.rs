//! Shared implementation for providers that speak the OpenAI chat-completions
//! and embeddings wire format: OpenAI itself, Azure OpenAI, and Mistral.

use crate::error::{RagError, Result};
use crate::llm::provider::{ChatModel, Embedder, ProviderSettings, ProviderTag};
use crate::llm::providers::base::{HttpProviderClient, OpenAiCompatible};
use crate::llm::{EmbeddingResponse, GenerationResponse, Message, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: OpenAiMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageInfo {
    pub total_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingResponseData {
    pub data: Vec<EmbeddingData>,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
}

/// Adapts any [`OpenAiCompatible`] wire format to the `ChatModel`/`Embedder`
/// capability traits.
pub struct OpenAiCompatibleProvider<A: OpenAiCompatible> {
    adapter: A,
    client: HttpProviderClient,
    settings: ProviderSettings,
}

impl<A: OpenAiCompatible> OpenAiCompatibleProvider<A> {
    pub fn new(adapter: A, settings: ProviderSettings) -> Self {
        let client = HttpProviderClient::new(settings.timeout_secs);
        Self {
            adapter,
            client,
            settings,
        }
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .adapter
            .auth_headers()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        headers
    }
}

#[async_trait]
impl<A: OpenAiCompatible> ChatModel for OpenAiCompatibleProvider<A> {
    fn provider_tag(&self) -> ProviderTag {
        self.settings.tag
    }

    fn name(&self) -> &str {
        &self.settings.chat_model
    }

    async fn generate(&self, system: &str, messages: &[Message]) -> Result<GenerationResponse> {
        debug!("generating with {} ({} messages)", self.name(), messages.len());

        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            wire_messages.push(OpenAiMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        wire_messages.extend(messages.iter().map(OpenAiMessage::from));

        let request = ChatCompletionRequest {
            model: self.settings.chat_model.clone(),
            messages: wire_messages,
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            stream: false,
        };

        let url = self.adapter.build_url("chat/completions");
        let headers = self.headers();
        let borrowed: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let response: ChatCompletionResponse =
            self.client.post_json(&url, &request, borrowed).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::UpstreamModelInvalid("no choices in response".to_string()))?;

        let tokens_used = response.usage.map(|u| u.total_tokens);
        info!("generated {} tokens with {}", tokens_used.unwrap_or(0), response.model);

        Ok(GenerationResponse {
            text: choice.message.content,
            tokens_used,
            model: response.model,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl<A: OpenAiCompatible> Embedder for OpenAiCompatibleProvider<A> {
    fn provider_tag(&self) -> ProviderTag {
        self.settings.tag
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingResponse> {
        let embedding_model = self.settings.embedding_model.as_ref().ok_or_else(|| {
            RagError::Config(format!("{} has no embedding_model configured", self.settings.tag))
        })?;

        let request = EmbeddingRequest {
            model: embedding_model.clone(),
            input: text.to_string(),
        };

        let url = self.adapter.build_url("embeddings");
        let headers = self.headers();
        let borrowed: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

        let response: EmbeddingResponseData =
            self.client.post_json(&url, &request, borrowed).await?;

        let data = response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| RagError::UpstreamModelInvalid("no embeddings in response".to_string()))?;

        Ok(EmbeddingResponse {
            embedding: data.embedding,
            model: response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct TestAdapter {
        base_url: String,
        api_key: Option<String>,
    }

    impl OpenAiCompatible for TestAdapter {
        fn base_url(&self) -> &str {
            &self.base_url
        }
        fn api_key(&self) -> Option<&str> {
            self.api_key.as_deref()
        }
    }

    fn test_settings() -> ProviderSettings {
        ProviderSettings {
            tag: ProviderTag::OpenAi,
            api_key: Some("test-key".to_string()),
            base_url: Some("https://api.example.com/v1".to_string()),
            chat_model: "gpt-test".to_string(),
            embedding_model: Some("embed-test".to_string()),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 30,
            options: json!({}),
        }
    }

    #[test]
    fn message_conversion_maps_role_names() {
        let msg = Message {
            role: Role::User,
            content: "hello".to_string(),
        };
        let wire = OpenAiMessage::from(&msg);
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content, "hello");
    }

    #[test]
    fn provider_exposes_configured_tag_and_name() {
        let adapter = TestAdapter {
            base_url: "https://api.example.com/v1".to_string(),
            api_key: Some("test-key".to_string()),
        };
        let provider = OpenAiCompatibleProvider::new(adapter, test_settings());
        assert_eq!(provider.provider_tag(), ProviderTag::OpenAi);
        assert_eq!(ChatModel::name(&provider), "gpt-test");
    }
}
