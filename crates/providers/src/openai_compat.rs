//! OpenAI-compatible chat completions provider (`POST {base_url}/chat/completions`).
//!
//! Works with OpenAI, Groq, OpenRouter, Ollama and anything else speaking
//! the same wire format.

use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::trace,
};

use pelangi_config::ProviderEntry;

use crate::{
    error::{ProviderError, Result},
    model::{ChatMessage, GenerateRequest, LlmProvider},
};

pub struct OpenAiCompatProvider {
    id: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            max_tokens: 300,
            temperature: 0.3,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn from_entry(entry: &ProviderEntry) -> Self {
        let mut provider = Self::new(&entry.id, &entry.base_url, &entry.model);
        provider.api_key = entry.api_key.clone();
        provider.max_tokens = entry.max_tokens;
        provider.temperature = entry.temperature;
        provider.timeout = Duration::from_secs(entry.timeout_secs);
        provider
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(Secret::new(key.into()));
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: request.messages(),
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
        };
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.timeout)
            .json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key.expose_secret());
        }

        let resp = http
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e, timeout_ms))?;
        if !resp.status().is_success() {
            return Err(ProviderError::from_response(resp).await);
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::malformed("response has no message content"))?;

        trace!(provider = %self.id, chars = text.len(), "chat completion received");
        Ok(text)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn provider(url: &str) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("test", url, "tiny-model").with_api_key("sk-test")
    }

    #[tokio::test]
    async fn parses_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "tiny-model",
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}}]}"#)
            .create_async()
            .await;

        let text = provider(&server.url())
            .generate(&GenerateRequest::new("hi"))
            .await
            .unwrap();
        assert_eq!(text, "Hello!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limit_is_typed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate(&GenerateRequest::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::RateLimited {
            retry_after_secs: Some(7)
        });
    }

    #[tokio::test]
    async fn server_error_is_http() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate(&GenerateRequest::new("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Http {
            status: 503,
            body: "overloaded".into()
        });
    }

    #[tokio::test]
    async fn missing_content_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .generate(&GenerateRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_unreachable() {
        let err = provider("http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2))
            .generate(&GenerateRequest::new("hi"))
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ProviderError::Unreachable(_) | ProviderError::Timeout { .. }
            ),
            "{err:?}"
        );
    }
}
