//! Mistral provider: OpenAI-wire-compatible chat and embeddings API.

use crate::error::Result;
use crate::llm::provider::ProviderSettings;
use crate::llm::providers::base::OpenAiCompatible;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;

pub struct MistralAdapter {
    base_url: String,
    api_key: Option<String>,
}

impl MistralAdapter {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or_else(|| "https://api.mistral.ai/v1".to_string()),
            api_key,
        }
    }
}

impl OpenAiCompatible for MistralAdapter {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

pub type MistralProvider = OpenAiCompatibleProvider<MistralAdapter>;

impl MistralProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let adapter = MistralAdapter::new(settings.api_key.clone(), settings.base_url.clone());
        Ok(OpenAiCompatibleProvider::new(adapter, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_defaults_to_public_api_base_url() {
        let adapter = MistralAdapter::new(Some("test-key".to_string()), None);
        assert_eq!(adapter.base_url(), "https://api.mistral.ai/v1");
    }
}
