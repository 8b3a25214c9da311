//! Request/response types and the provider seam traits.

use std::time::Duration;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Prompt plus conversational context for one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub system: Option<String>,
    /// Earlier turns, oldest first.
    pub history: Vec<ChatMessage>,
    pub prompt: String,
    /// Overrides the provider's configured limit.
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Flatten into the chat-completions message list.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(self.prompt.clone()));
        messages
    }
}

/// Successful result of a chain generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub provider_id: String,
    pub latency_ms: u64,
}

/// One inference backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Per-attempt timeout applied by the chain.
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Anything that can turn a request into a [`Generation`]: the provider
/// chain in production, mocks in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<Generation>;
}

/// Vectors produced by a single embedding provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub provider_id: String,
    pub vectors: Vec<Vec<f32>>,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn id(&self) -> &str;

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Embed every text with the same provider, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings>;

    async fn embed(&self, text: &str) -> Result<Embeddings> {
        self.embed_batch(&[text.to_string()]).await
    }
}
