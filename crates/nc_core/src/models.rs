use async_trait::async_trait;
use std::fmt;
use crate::types::EmbeddingVector;
use crate::Result;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Generate an embedding for a piece of text
    async fn embed(&self, text: &str) -> Result<EmbeddingVector>;
}
