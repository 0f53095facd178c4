//! Anthropic Claude provider. Chat-only: Anthropic does not expose a native
//! embeddings endpoint, so this type implements `ChatModel` and nothing else.

use crate::error::{RagError, Result};
use crate::llm::provider::{ChatModel, ProviderSettings, ProviderTag};
use crate::llm::providers::base::HttpProviderClient;
use crate::llm::{GenerationResponse, Message, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

impl From<&Message> for AnthropicMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
                Role::System => "user".to_string(),
            },
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub messages: Vec<AnthropicMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: UsageInfo,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

pub struct AnthropicChatModel {
    client: HttpProviderClient,
    settings: ProviderSettings,
}

impl AnthropicChatModel {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = HttpProviderClient::new(settings.timeout_secs);
        Ok(Self { client, settings })
    }

    fn base_url(&self) -> String {
        self.settings
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.anthropic.com".to_string())
    }

    fn headers(&self) -> Vec<(&str, String)> {
        let mut headers = vec![
            ("Content-Type", "application/json".to_string()),
            ("anthropic-version", "2023-06-01".to_string()),
        ];
        if let Some(api_key) = &self.settings.api_key {
            headers.push(("x-api-key", api_key.clone()));
        }
        headers
    }
}

#[async_trait]
impl ChatModel for AnthropicChatModel {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Anthropic
    }

    fn name(&self) -> &str {
        &self.settings.chat_model
    }

    async fn generate(&self, system: &str, messages: &[Message]) -> Result<GenerationResponse> {
        debug!("generating with anthropic using {} messages", messages.len());

        let anthropic_messages: Vec<AnthropicMessage> =
            messages.iter().map(AnthropicMessage::from).collect();
        if anthropic_messages.is_empty() {
            return Err(RagError::InvalidInput("no messages to send".to_string()));
        }

        let request = AnthropicRequest {
            model: self.settings.chat_model.clone(),
            messages: anthropic_messages,
            max_tokens: self.settings.max_tokens,
            system: if system.is_empty() {
                None
            } else {
                Some(system.to_string())
            },
            temperature: Some(self.settings.temperature),
        };

        let url = format!("{}/v1/messages", self.base_url().trim_end_matches('/'));
        let headers = self.headers();
        let borrowed: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let response: AnthropicResponse = self.client.post_json(&url, &request, borrowed).await?;

        if response.content.is_empty() {
            return Err(RagError::UpstreamModelInvalid(
                "no content in response".to_string(),
            ));
        }

        let text = response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let total_tokens = response.usage.input_tokens + response.usage.output_tokens;

        info!("generated {} tokens with {}", total_tokens, response.model);

        Ok(GenerationResponse {
            text,
            tokens_used: Some(total_tokens),
            model: response.model,
            finish_reason: response.stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_settings() -> ProviderSettings {
        ProviderSettings {
            tag: ProviderTag::Anthropic,
            api_key: Some("test-key".to_string()),
            base_url: Some("https://api.anthropic.com".to_string()),
            chat_model: "claude-3-opus-20240229".to_string(),
            embedding_model: None,
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 60,
            options: json!({}),
        }
    }

    #[test]
    fn message_conversion_folds_system_into_user() {
        let msg = Message {
            role: Role::System,
            content: "be terse".to_string(),
        };
        assert_eq!(AnthropicMessage::from(&msg).role, "user");
    }

    #[test]
    fn chat_model_reports_anthropic_tag() {
        let model = AnthropicChatModel::new(test_settings()).unwrap();
        assert_eq!(model.provider_tag(), ProviderTag::Anthropic);
        assert_eq!(model.name(), "claude-3-opus-20240229");
    }
}
