//! Deterministic mock embedding provider.
//!
//! Produces a fixed-dimension unit vector derived from a hash of the
//! input text: equal texts always embed identically, and similar-but-
//! different texts land in different directions. Good enough for tests
//! and mock mode, where only determinism and dimension matter.

use async_trait::async_trait;

use super::provider::EmbeddingProvider;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub struct MockEmbedding {
    dimension: usize,
}

impl MockEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        let mut state = FNV_OFFSET;
        for byte in text.as_bytes() {
            state ^= u64::from(*byte);
            state = state.wrapping_mul(FNV_PRIME);
        }

        let mut vector = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            state ^= i as u64;
            state = state.wrapping_mul(FNV_PRIME);
            // Map the hash word into [-1.0, 1.0]
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            vector.push((unit * 2.0 - 1.0) as f32);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let normalized = self.normalize_text(text);
        Ok(self.hash_vector(&normalized))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}
