use std::fmt;
use sha2::{Digest, Sha256};
use nc_core::{EmbeddingProvider, EmbeddingVector, Error, Result};
use crate::{ProviderConfig, DEFAULT_HASHING_DIMENSIONS};

/// Offline embedder based on signed feature hashing of lowercase word tokens.
///
/// Texts sharing most of their vocabulary land close together, which is enough
/// for dry runs and tests. The output is L2-normalized, or all zeros for text
/// without any word characters.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl fmt::Debug for HashingEmbedder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashingEmbedder")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::Config("hashing embedder needs at least one dimension".to_string()));
        }
        Ok(Self { dimensions })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(config.dimensions.unwrap_or(DEFAULT_HASHING_DIMENSIONS))
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut index = [0u8; 8];
        index.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(index) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }

    fn embed_sync(&self, text: &str) -> EmbeddingVector {
        let mut embedding = vec![0.0f32; self.dimensions];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let (bucket, sign) = self.bucket(&token.to_lowercase());
            embedding[bucket] += sign;
        }

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        Ok(self.embed_sync(text))
    }
}
