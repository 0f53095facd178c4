//! Amazon Bedrock provider. Talks to the Bedrock Runtime `invoke-model` and
//! `invoke-model` (titan-embed) HTTP surface directly via `reqwest`, the same
//! way the other REST-based providers in this module do it, rather than
//! pulling in the full AWS SDK for a single call shape.

use crate::error::{RagError, Result};
use crate::llm::provider::{ChatModel, Embedder, ProviderSettings, ProviderTag};
use crate::llm::providers::base::HttpProviderClient;
use crate::llm::{EmbeddingResponse, GenerationResponse, Message, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct BedrockMessage {
    role: String,
    content: String,
}

impl From<&Message> for BedrockMessage {
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
struct ConverseRequest {
    messages: Vec<BedrockMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
    #[serde(default)]
    usage: Option<ConverseUsage>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConverseOutput {
    message: ConverseOutputMessage,
}

#[derive(Debug, Deserialize)]
struct ConverseOutputMessage {
    content: Vec<ConverseContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ConverseContentBlock {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ConverseUsage {
    total_tokens: u32,
}

#[derive(Debug, Serialize)]
struct TitanEmbedRequest {
    #[serde(rename = "inputText")]
    input_text: String,
}

#[derive(Debug, Deserialize)]
struct TitanEmbedResponse {
    embedding: Vec<f32>,
}

pub struct BedrockProvider {
    client: HttpProviderClient,
    settings: ProviderSettings,
    region: String,
}

impl BedrockProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = HttpProviderClient::new(settings.timeout_secs);
        let region = settings
            .options
            .get("region")
            .and_then(|v| v.as_str())
            .unwrap_or("us-east-1")
            .to_string();
        Ok(Self {
            client,
            settings,
            region,
        })
    }

    fn base_url(&self) -> String {
        self.settings.base_url.clone().unwrap_or_else(|| {
            format!("https://bedrock-runtime.{}.amazonaws.com", self.region)
        })
    }

    fn headers(&self) -> Vec<(&str, String)> {
        let mut headers = vec![("Content-Type", "application/json".to_string())];
        if let Some(key) = &self.settings.api_key {
            headers.push(("Authorization", format!("Bearer {key}")));
        }
        headers
    }
}

#[async_trait]
impl ChatModel for BedrockProvider {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Amazon
    }

    fn name(&self) -> &str {
        &self.settings.chat_model
    }

    async fn generate(&self, system: &str, messages: &[Message]) -> Result<GenerationResponse> {
        debug!("generating with bedrock model {}", self.settings.chat_model);

        let bedrock_messages: Vec<BedrockMessage> =
            messages.iter().map(BedrockMessage::from).collect();
        if bedrock_messages.is_empty() {
            return Err(RagError::InvalidInput("no messages to send".to_string()));
        }

        let request = ConverseRequest {
            messages: bedrock_messages,
            system: if system.is_empty() {
                None
            } else {
                Some(system.to_string())
            },
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let url = format!(
            "{}/model/{}/converse",
            self.base_url().trim_end_matches('/'),
            self.settings.chat_model
        );
        let headers = self.headers();
        let borrowed: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let response: ConverseResponse = self.client.post_json(&url, &request, borrowed).await?;

        let text = response
            .output
            .message
            .content
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return Err(RagError::UpstreamModelInvalid(
                "bedrock response had no content blocks".to_string(),
            ));
        }

        let tokens_used = response.usage.map(|u| u.total_tokens);
        info!("generated {} tokens with bedrock", tokens_used.unwrap_or(0));

        Ok(GenerationResponse {
            text,
            tokens_used,
            model: self.settings.chat_model.clone(),
            finish_reason: response.stop_reason,
        })
    }
}

#[async_trait]
impl Embedder for BedrockProvider {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Amazon
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingResponse> {
        let embedding_model = self.settings.embedding_model.as_ref().ok_or_else(|| {
            RagError::Config("bedrock embedder requires embedding_model".to_string())
        })?;

        let request = TitanEmbedRequest {
            input_text: text.to_string(),
        };
        let url = format!(
            "{}/model/{}/invoke",
            self.base_url().trim_end_matches('/'),
            embedding_model
        );
        let headers = self.headers();
        let borrowed: Vec<(&str, &str)> =
            headers.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let response: TitanEmbedResponse =
            self.client.post_json(&url, &request, borrowed).await?;

        Ok(EmbeddingResponse {
            embedding: response.embedding,
            model: embedding_model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_settings() -> ProviderSettings {
        ProviderSettings {
            tag: ProviderTag::Amazon,
            api_key: Some("test-key".to_string()),
            base_url: None,
            chat_model: "anthropic.claude-3-sonnet".to_string(),
            embedding_model: Some("amazon.titan-embed-text-v1".to_string()),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 60,
            options: json!({"region": "us-west-2"}),
        }
    }

    #[test]
    fn base_url_falls_back_to_region_default() {
        let provider = BedrockProvider::new(test_settings()).unwrap();
        assert_eq!(
            provider.base_url(),
            "https://bedrock-runtime.us-west-2.amazonaws.com"
        );
    }

    #[test]
    fn provider_exposes_amazon_tag_for_both_capabilities() {
        let provider = BedrockProvider::new(test_settings()).unwrap();
        assert_eq!(ChatModel::provider_tag(&provider), ProviderTag::Amazon);
        assert_eq!(Embedder::provider_tag(&provider), ProviderTag::Amazon);
    }
}
