use std::sync::Arc;
use nc_core::{EmbeddingProvider, Error, Result};
use crate::ProviderConfig;

pub mod hashing;
pub mod openai;

pub use hashing::HashingEmbedder;
pub use openai::OpenAiEmbedder;

pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.to_lowercase().as_str() {
        "hashing" => Arc::new(HashingEmbedder::from_config(config)?),
        "openai" => Arc::new(OpenAiEmbedder::from_config(config)?),
        _ => {
            return Err(Error::Config(format!(
                "Unknown embedding provider '{}'. Available providers: hashing, openai",
                config.provider
            )))
        }
    };
    tracing::debug!(provider = provider.name(), "embedding provider created");
    Ok(provider)
}
