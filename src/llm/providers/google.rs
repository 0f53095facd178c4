//! Google Gemini provider: implements both `ChatModel` and `Embedder`.

use crate::error::{RagError, Result};
use crate::llm::provider::{ChatModel, Embedder, ProviderSettings, ProviderTag};
use crate::llm::providers::base::HttpProviderClient;
use crate::llm::{EmbeddingResponse, GenerationResponse, Message, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

impl From<&Message> for GeminiContent {
    fn from(msg: &Message) -> Self {
        Self {
            role: match msg.role {
                Role::User => "user".to_string(),
                Role::Assistant => "model".to_string(),
                Role::System => "user".to_string(),
            },
            parts: vec![GeminiPart {
                text: msg.content.clone(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: GeminiContent,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsageMetadata {
    pub total_token_count: u32,
}

#[derive(Debug, Serialize)]
pub struct GeminiEmbedRequest {
    pub content: GeminiContent,
}

#[derive(Debug, Deserialize)]
pub struct GeminiEmbedResponse {
    pub embedding: EmbeddingData,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingData {
    pub values: Vec<f32>,
}

pub struct GoogleProvider {
    client: HttpProviderClient,
    settings: ProviderSettings,
}

impl GoogleProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let client = HttpProviderClient::new(settings.timeout_secs);
        Ok(Self { client, settings })
    }

    fn base_url(&self) -> String {
        self.settings
            .base_url
            .clone()
            .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string())
    }

    fn api_key(&self) -> Result<&str> {
        self.settings
            .api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("google provider requires an api_key".to_string()))
    }
}

#[async_trait]
impl ChatModel for GoogleProvider {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Google
    }

    fn name(&self) -> &str {
        &self.settings.chat_model
    }

    async fn generate(&self, system: &str, messages: &[Message]) -> Result<GenerationResponse> {
        debug!("generating with google gemini using {} messages", messages.len());

        let mut contents: Vec<GeminiContent> = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            contents.push(GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: system.to_string(),
                }],
            });
        }
        contents.extend(messages.iter().map(GeminiContent::from));

        if contents.is_empty() {
            return Err(RagError::InvalidInput("no messages to send".to_string()));
        }

        let request = GeminiRequest {
            contents,
            generation_config: Some(GenerationConfig {
                temperature: self.settings.temperature,
                max_output_tokens: self.settings.max_tokens,
            }),
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url().trim_end_matches('/'),
            self.settings.chat_model,
            self.api_key()?
        );

        let response: GeminiResponse = self
            .client
            .post_json(&url, &request, vec![("Content-Type", "application/json")])
            .await?;

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| RagError::UpstreamModelInvalid("no candidates in response".to_string()))?;

        let text = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let tokens_used = response.usage_metadata.map(|u| u.total_token_count);

        info!(
            "generated {} tokens with {}",
            tokens_used.unwrap_or(0),
            self.settings.chat_model
        );

        Ok(GenerationResponse {
            text,
            tokens_used,
            model: self.settings.chat_model.clone(),
            finish_reason: candidate.finish_reason,
        })
    }
}

#[async_trait]
impl Embedder for GoogleProvider {
    fn provider_tag(&self) -> ProviderTag {
        ProviderTag::Google
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingResponse> {
        debug!("generating embedding with google for text length {}", text.len());

        let embedding_model = self.settings.embedding_model.as_ref().ok_or_else(|| {
            RagError::Config("google embedder requires embedding_model".to_string())
        })?;

        let request = GeminiEmbedRequest {
            content: GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: text.to_string(),
                }],
            },
        };

        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url().trim_end_matches('/'),
            embedding_model,
            self.api_key()?
        );

        let response: GeminiEmbedResponse = self
            .client
            .post_json(&url, &request, vec![("Content-Type", "application/json")])
            .await?;

        Ok(EmbeddingResponse {
            embedding: response.embedding.values,
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
            tag: ProviderTag::Google,
            api_key: Some("test-key".to_string()),
            base_url: None,
            chat_model: "gemini-1.5-pro".to_string(),
            embedding_model: Some("embedding-001".to_string()),
            max_tokens: 2048,
            temperature: 0.1,
            timeout_secs: 60,
            options: json!({}),
        }
    }

    #[test]
    fn message_conversion_maps_assistant_to_model_role() {
        let msg = Message {
            role: Role::Assistant,
            content: "hi".to_string(),
        };
        assert_eq!(GeminiContent::from(&msg).role, "model");
    }

    #[test]
    fn provider_exposes_both_capabilities() {
        let provider = GoogleProvider::new(test_settings()).unwrap();
        assert_eq!(ChatModel::provider_tag(&provider), ProviderTag::Google);
        assert_eq!(Embedder::provider_tag(&provider), ProviderTag::Google);
    }
}
