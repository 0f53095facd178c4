//! Azure OpenAI provider: deployment-based routing over the OpenAI wire format.

use crate::error::Result;
use crate::llm::provider::ProviderSettings;
use crate::llm::providers::base::OpenAiCompatible;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;

pub struct AzureOpenAiAdapter {
    endpoint: String,
    api_key: Option<String>,
    api_version: String,
    deployment_name: String,
}

impl AzureOpenAiAdapter {
    pub fn new(
        endpoint: String,
        deployment_name: String,
        api_key: Option<String>,
        api_version: Option<String>,
    ) -> Self {
        Self {
            endpoint,
            api_key,
            api_version: api_version.unwrap_or_else(|| "2024-02-15-preview".to_string()),
            deployment_name,
        }
    }
}

impl OpenAiCompatible for AzureOpenAiAdapter {
    fn base_url(&self) -> &str {
        &self.endpoint
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn auth_headers(&self) -> Vec<(&str, String)> {
        let mut headers = Vec::new();
        if let Some(key) = self.api_key.as_ref() {
            headers.push(("api-key", key.clone()));
        }
        headers
    }

    fn transform_endpoint(&self, endpoint: &str) -> String {
        match endpoint {
            "chat/completions" => format!(
                "openai/deployments/{}/chat/completions?api-version={}",
                self.deployment_name, self.api_version
            ),
            "embeddings" => format!(
                "openai/deployments/{}/embeddings?api-version={}",
                self.deployment_name, self.api_version
            ),
            other => format!("{other}?api-version={}", self.api_version),
        }
    }
}

pub type AzureOpenAiProvider = OpenAiCompatibleProvider<AzureOpenAiAdapter>;

impl AzureOpenAiProvider {
    pub fn new(settings: ProviderSettings) -> Result<Self> {
        let deployment_name = settings
            .options
            .get("deployment_name")
            .and_then(|v| v.as_str())
            .unwrap_or(&settings.chat_model)
            .to_string();
        let api_version = settings
            .options
            .get("api_version")
            .and_then(|v| v.as_str())
            .map(String::from);
        let endpoint = settings
            .base_url
            .clone()
            .unwrap_or_else(|| "https://your-resource.openai.azure.com".to_string());

        let adapter = AzureOpenAiAdapter::new(
            endpoint,
            deployment_name,
            settings.api_key.clone(),
            api_version,
        );
        Ok(OpenAiCompatibleProvider::new(adapter, settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_transform_injects_deployment_and_api_version() {
        let adapter = AzureOpenAiAdapter::new(
            "https://my-resource.openai.azure.com".to_string(),
            "gpt-4-deployment".to_string(),
            Some("test-key".to_string()),
            Some("2024-02-15-preview".to_string()),
        );
        let chat_endpoint = adapter.transform_endpoint("chat/completions");
        assert!(chat_endpoint.contains("gpt-4-deployment"));
        assert!(chat_endpoint.contains("2024-02-15-preview"));
    }

    #[test]
    fn auth_uses_api_key_header_not_bearer() {
        let adapter = AzureOpenAiAdapter::new(
            "https://my-resource.openai.azure.com".to_string(),
            "gpt-4-deployment".to_string(),
            Some("test-key".to_string()),
            None,
        );
        let headers = adapter.auth_headers();
        assert_eq!(headers[0], ("api-key", "test-key".to_string()));
    }
}
