//! Offline embedder used when no remote embedding service answers.
//!
//! Features are normalized word unigrams plus character trigrams (padded with
//! spaces so word edges count), hashed with FNV-1a into a fixed number of
//! buckets and L2-normalized. Good enough to separate "where is the
//! bathroom" from "how much per night" without any network.

use async_trait::async_trait;

use pelangi_common::text::normalize;

use crate::{
    error::Result,
    model::{EmbeddingProvider, Embeddings},
};

pub const LOCAL_PROVIDER_ID: &str = "local-hashing";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(16),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed one text synchronously.
    #[must_use]
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let normalized = normalize(text);

        let mut add = |feature: &str, weight: f32| {
            let bucket = (fnv1a(feature.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += weight;
        };

        for word in normalized.split_whitespace() {
            add(&format!("w:{word}"), 1.0);
        }

        let padded: Vec<char> = format!(" {normalized} ").chars().collect();
        for window in padded.windows(3) {
            let gram: String = window.iter().collect();
            add(&format!("c:{gram}"), 0.5);
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn id(&self) -> &str {
        LOCAL_PROVIDER_ID
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
        Ok(Embeddings {
            provider_id: LOCAL_PROVIDER_ID.to_string(),
            vectors: texts.iter().map(|t| self.vectorize(t)).collect(),
        })
    }
}

/// Cosine similarity; `0.0` when either vector is zero or lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}
