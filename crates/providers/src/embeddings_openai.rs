/// OpenAI-compatible embeddings provider using `POST {base_url}/embeddings`.
use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use pelangi_config::EmbeddingEntry;

use crate::{
    error::{ProviderError, Result},
    model::{EmbeddingProvider, Embeddings},
};

pub struct OpenAiEmbeddingProvider {
    id: String,
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    model: String,
    timeout: Duration,
}

impl OpenAiEmbeddingProvider {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn from_entry(entry: &EmbeddingEntry) -> Self {
        let mut provider = Self::new(&entry.id, &entry.base_url, &entry.model);
        provider.api_key = entry.api_key.clone();
        provider.timeout = Duration::from_secs(entry.timeout_secs);
        provider
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let mut http = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .timeout(self.timeout)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            });
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
        let mut parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::malformed(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        Ok(Embeddings {
            provider_id: self.id.clone(),
            vectors: parsed.data.into_iter().map(|d| d.embedding).collect(),
        })
    }
}
