use std::sync::Arc;
use nc_core::{EmbeddingProvider, EmbeddingVector, NewsItem, Result};

/// Characters of article body that go into the embedding text.
pub const MAX_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Clone)]
pub struct EmbeddingGenerator {
    provider: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingGenerator {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Title followed by the head of the body, whitespace collapsed.
    pub fn embedding_text(item: &NewsItem) -> String {
        let content: String = item.content.chars().take(MAX_CONTENT_CHARS).collect();
        let title = collapse_whitespace(&item.title);
        let content = collapse_whitespace(&content);
        if content.is_empty() {
            title
        } else {
            format!("{}\n{}", title, content)
        }
    }

    pub async fn generate_item_embedding(&self, item: &NewsItem) -> Result<EmbeddingVector> {
        self.provider.embed(&Self::embedding_text(item)).await
    }

    pub async fn generate_text_embedding(&self, text: &str) -> Result<EmbeddingVector> {
        self.provider.embed(text).await
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
