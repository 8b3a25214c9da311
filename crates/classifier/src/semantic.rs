//! Semantic-example tier: nearest labelled example by embedding similarity.
//!
//! Corpus vectors are cached per embedding provider. When the embedding
//! chain fails over, the query and corpus may come from different providers
//! (different vector spaces); the corpus is then re-embedded with whatever
//! provider answers, and the query is retried once if the two still differ.

use std::sync::Arc;

use {tokio::sync::RwLock, tracing::debug};

use {
    pelangi_config::SemanticTierConfig,
    pelangi_providers::{EmbeddingProvider, cosine_similarity},
};

use crate::error::{Result, TierError};

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticMatch {
    pub intent: String,
    pub score: f32,
    pub example: String,
}

struct CorpusCache {
    provider_id: String,
    vectors: Vec<Vec<f32>>,
}

pub struct SemanticTier {
    /// (intent, example text)
    examples: Vec<(String, String)>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: RwLock<Option<CorpusCache>>,
}

impl SemanticTier {
    pub fn new(config: &SemanticTierConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let examples = config
            .examples
            .iter()
            .flat_map(|(intent, list)| {
                list.iter()
                    .filter(|e| !e.trim().is_empty())
                    .map(move |e| (intent.clone(), e.clone()))
            })
            .collect();
        Self {
            examples,
            embedder,
            cache: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    async fn corpus_for(&self, provider_id: &str) -> Result<Option<Vec<Vec<f32>>>> {
        if let Some(cache) = self.cache.read().await.as_ref()
            && cache.provider_id == provider_id
        {
            return Ok(Some(cache.vectors.clone()));
        }

        let texts: Vec<String> = self.examples.iter().map(|(_, e)| e.clone()).collect();
        let corpus = self.embedder.embed_batch(&texts).await?;
        debug!(
            provider = %corpus.provider_id,
            examples = corpus.vectors.len(),
            "embedded semantic corpus"
        );
        let matches = corpus.provider_id == provider_id;
        let vectors = corpus.vectors.clone();
        *self.cache.write().await = Some(CorpusCache {
            provider_id: corpus.provider_id,
            vectors: corpus.vectors,
        });
        Ok(matches.then_some(vectors))
    }

    /// Nearest example to `text`, or `None` when the corpus is empty.
    pub async fn nearest(&self, text: &str) -> Result<Option<SemanticMatch>> {
        if self.examples.is_empty() {
            return Ok(None);
        }

        let mut query = self.embedder.embed(text).await?;
        let corpus = match self.corpus_for(&query.provider_id).await? {
            Some(corpus) => corpus,
            None => {
                // The chain switched providers between the two calls.
                query = self.embedder.embed(text).await?;
                self.corpus_for(&query.provider_id).await?.ok_or_else(|| {
                    TierError::EmbeddingMismatch {
                        corpus: "re-embedded corpus".into(),
                        query: query.provider_id.clone(),
                    }
                })?
            },
        };

        let Some(query_vector) = query.vectors.first() else {
            return Ok(None);
        };

        let best = corpus
            .iter()
            .zip(&self.examples)
            .map(|(vector, example)| (cosine_similarity(query_vector, vector), example))
            .max_by(|a, b| a.0.total_cmp(&b.0));

        Ok(best.map(|(score, (intent, example))| SemanticMatch {
            intent: intent.clone(),
            score: score.clamp(0.0, 1.0),
            example: example.clone(),
        }))
    }
}
