use pelangi_providers::ProviderError;

/// Internal failure of a single tier. Logged and treated as a non-match.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("embedding provider mismatch: corpus from {corpus}, query from {query}")]
    EmbeddingMismatch { corpus: String, query: String },

    #[error("unparseable generative reply: {0}")]
    Unparseable(String),
}

impl TierError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(e) => e.kind(),
            Self::EmbeddingMismatch { .. } => "embedding_mismatch",
            Self::Unparseable(_) => "unparseable",
        }
    }
}

pub type Result<T> = std::result::Result<T, TierError>;
