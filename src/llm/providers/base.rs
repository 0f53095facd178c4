//! Shared HTTP plumbing for REST-based model providers.

use crate::error::{RagError, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};

pub struct HttpProviderClient {
    client: Client,
    timeout: Duration,
}

impl HttpProviderClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build http client");
        Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &T,
        headers: Vec<(&str, &str)>,
    ) -> Result<R> {
        debug!("POST {}", url);
        let mut request = self.client.post(url).json(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RagError::UpstreamTimeout {
                backend: url.to_string(),
            })?
            .map_err(RagError::Http)?;

        self.handle_response(response).await
    }

    pub async fn get<R: DeserializeOwned>(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
    ) -> Result<R> {
        debug!("GET {}", url);
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RagError::UpstreamTimeout {
                backend: url.to_string(),
            })?
            .map_err(RagError::Http)?;

        self.handle_response(response).await
    }

    async fn handle_response<R: DeserializeOwned>(&self, response: Response) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| format!("HTTP {status}"));
            error!("provider API error ({}): {}", status, error_text);
            return Err(match status.as_u16() {
                401 | 403 => RagError::UpstreamModelInvalid(error_text),
                429 | 500..=599 => RagError::UpstreamModelError(error_text),
                _ => RagError::UpstreamModelInvalid(error_text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| RagError::UpstreamModelInvalid(e.to_string()))
    }
}

/// Adapter for providers that speak the OpenAI chat-completions / embeddings
/// wire format (OpenAI itself, Azure OpenAI, Mistral).
pub trait OpenAiCompatible: Send + Sync {
    fn base_url(&self) -> &str;
    fn api_key(&self) -> Option<&str>;

    fn auth_headers(&self) -> Vec<(&str, String)> {
        let mut headers = Vec::new();
        if let Some(key) = self.api_key() {
            headers.push(("Authorization", format!("Bearer {key}")));
        }
        headers
    }

    fn transform_endpoint(&self, endpoint: &str) -> String {
        endpoint.to_string()
    }

    fn build_url(&self, endpoint: &str) -> String {
        let base = self.base_url().trim_end_matches('/');
        let transformed = self.transform_endpoint(endpoint);
        let path = transformed.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn url_building_joins_base_and_endpoint() {
        let adapter = TestAdapter {
            base_url: "https://api.example.com/v1".to_string(),
            api_key: Some("test-key".to_string()),
        };
        assert_eq!(
            adapter.build_url("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn auth_headers_use_bearer_token() {
        let adapter = TestAdapter {
            base_url: "https://api.example.com".to_string(),
            api_key: Some("test-key".to_string()),
        };
        let headers = adapter.auth_headers();
        assert_eq!(headers[0], ("Authorization", "Bearer test-key".to_string()));
    }
}
