//! External API provider for OpenAI-compatible chat completion endpoints
//! (OpenAI, OpenRouter, Together, Ollama, or any custom server)

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::{ApiProvider, GenerationConfig, LLMProvider, ProviderInfo};
use crate::config::LlmSettings;

/// External API provider (simplified for reliability)
pub struct SimpleExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    max_retries: u32,
    client: Client,
}

impl SimpleExternalProvider {
    pub fn new(provider: ApiProvider, api_key: String, model: String) -> Result<Self> {
        Self::with_timeouts(provider, api_key, model, Duration::from_secs(15), Duration::from_secs(300), 2)
    }

    pub fn from_settings(settings: &LlmSettings, api_key: String) -> Result<Self> {
        Self::with_timeouts(
            settings.provider.clone(),
            api_key,
            settings.model.clone(),
            Duration::from_secs(settings.connect_timeout_secs),
            Duration::from_secs(settings.request_timeout_secs),
            settings.max_retries,
        )
    }

    fn with_timeouts(
        provider: ApiProvider,
        api_key: String,
        model: String,
        connect_timeout: Duration,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            provider = ?provider,
            model = %model,
            connect_timeout_secs = connect_timeout.as_secs(),
            max_retries,
            "Creating SimpleExternalProvider"
        );

        Ok(Self {
            provider,
            api_key,
            model,
            max_retries,
            client,
        })
    }

    fn request_body(&self, prompt: &str, config: &GenerationConfig) -> JsonValue {
        let mut request = json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "top_p": config.top_p,
            "stream": false
        });
        if !config.stop_sequences.is_empty() {
            request["stop"] = json!(config.stop_sequences);
        }
        request
    }

    async fn openai_compatible_generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let endpoint = self.provider.endpoint();
        tracing::debug!(
            endpoint = %endpoint,
            model = %self.model,
            max_tokens = config.max_tokens,
            prompt_len = prompt.len(),
            "Sending OpenAI-compatible request"
        );

        let mut request = self.client.post(endpoint).json(&self.request_body(prompt, config));
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(endpoint = %endpoint, "Request timed out (connect or response timeout)");
                anyhow!("Request to {} timed out, check whether the endpoint is reachable", endpoint)
            } else if e.is_connect() {
                tracing::error!(endpoint = %endpoint, error = %e, "Connection failed");
                anyhow!("Failed to connect to {}: {}", endpoint, e)
            } else {
                tracing::error!(endpoint = %endpoint, error = %e, "Request failed");
                anyhow!("Request to {} failed: {}", endpoint, e)
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;
        if !status.is_success() {
            tracing::error!(endpoint = %endpoint, status = %status, error = %body, "API returned error");
            return Err(anyhow!("API error ({}): {}", status, body));
        }

        let content = parse_completion(&body)
            .map_err(|e| anyhow!("Bad response from {} (HTTP {}): {}", endpoint, status, e))?;
        tracing::debug!("API response received, {} chars", content.len());
        Ok(content)
    }
}

/// Exponential backoff from one second, capped at a minute.
fn retry_delay(attempt: u32) -> Duration {
    let millis = 500u64.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(millis.min(60_000))
}

#[async_trait]
impl LLMProvider for SimpleExternalProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.openai_compatible_generate(prompt, config).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, max_retries = self.max_retries, error = %e, "Generation failed, retrying");
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.provider.name().to_string(),
            model: self.model.clone(),
            endpoint: self.provider.endpoint().to_string(),
            is_local: self.provider.is_local(),
        }
    }

    async fn is_ready(&self) -> bool {
        self.provider.is_local() || !self.api_key.is_empty()
    }
}

/// Extract the first choice's text from a chat completions response body.
///
/// HTML bodies (gateway error pages) are reported as such instead of as a JSON error.
fn parse_completion(body: &str) -> Result<String> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!("returned HTML instead of JSON: {}", preview));
    }

    let result: OpenAIResponse = serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        anyhow!("failed to parse JSON: {}. Response body: {}", e, preview)
    })?;

    result
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("No choices returned from API"))
}

/// Response structures
#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(7), Duration::from_secs(60));
        assert_eq!(retry_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_parse_completion_takes_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"structured"}},{"message":{"content":"semantic"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "structured");
    }

    #[test]
    fn test_parse_completion_errors() {
        let err = parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(err.to_string().contains("No choices"));

        let err = parse_completion("<html><body>502 Bad Gateway</body></html>").unwrap_err();
        assert!(err.to_string().contains("HTML"));

        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn test_request_body() {
        let provider =
            SimpleExternalProvider::new(ApiProvider::Ollama, String::new(), "llama3".into()).unwrap();
        let config = GenerationConfig {
            stop_sequences: vec!["\n".into()],
            ..GenerationConfig::default()
        };
        let body = provider.request_body("Query: hello", &config);
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["messages"][0]["content"], "Query: hello");
        assert_eq!(body["stream"], false);
        assert_eq!(body["stop"][0], "\n");

        let body = provider.request_body("x", &GenerationConfig::default());
        assert!(body.get("stop").is_none());
    }

    #[tokio::test]
    async fn test_info_and_readiness() {
        let local = SimpleExternalProvider::new(ApiProvider::Ollama, String::new(), "llama3".into()).unwrap();
        assert!(local.is_ready().await);
        assert_eq!(local.info().endpoint, "http://localhost:11434/v1/chat/completions");

        let remote = SimpleExternalProvider::new(ApiProvider::OpenAI, String::new(), "gpt-4o-mini".into()).unwrap();
        assert!(!remote.is_ready().await);
        assert_eq!(remote.info().name, "OpenAI");
    }
}
