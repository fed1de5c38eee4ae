use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

pub type EmbeddingVector = Vec<f32>;

/// A fetched news story, prior to clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub source: String,
    #[serde(default)]
    pub url: Option<Url>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingVector>,
}

impl NewsItem {
    /// Stable identifier for a feed entry: digest of `source:title:url`.
    pub fn derive_id(source: &str, title: &str, url: Option<&Url>) -> String {
        let url = url.map(Url::as_str).unwrap_or("");
        digest_hex(&format!("{}:{}:{}", source, title, url), 32)
    }

    /// Length of the raw text in characters, used to rank representatives.
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// Hex SHA-256 of `input`, cut to at most `len` characters.
pub fn digest_hex(input: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(len);
    hex
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    pub left: String,
    pub right: String,
    pub score: f32,
}

/// A partition cell produced by the clustering engine. Members are sorted by
/// ascending identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub member_ids: Vec<String>,
}

impl Cluster {
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// What downstream classification and summarization stages consume: the
/// representative's content plus what every member contributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCluster {
    pub cluster_id: String,
    pub representative: NewsItem,
    pub member_ids: Vec<String>,
    pub sources: Vec<String>,
    pub alternate_titles: Vec<String>,
    pub urls: Vec<Url>,
}

impl MergedCluster {
    pub fn is_singleton(&self) -> bool {
        self.member_ids.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClusterWarning {
    EmbeddingFailed { item_id: String, reason: String },
    EmbeddingTimedOut { item_id: String },
    DimensionRejected { item_id: String, expected: usize, actual: usize },
    ScoreClamped { left: String, right: String, raw: f32, clamped: f32 },
    DuplicateItem { item_id: String },
}

impl ClusterWarning {
    /// Items named by a warning that were forced into singleton clusters.
    pub fn degraded_item(&self) -> Option<&str> {
        match self {
            Self::EmbeddingFailed { item_id, .. }
            | Self::EmbeddingTimedOut { item_id }
            | Self::DimensionRejected { item_id, .. } => Some(item_id),
            Self::ScoreClamped { .. } | Self::DuplicateItem { .. } => None,
        }
    }
}

impl fmt::Display for ClusterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmbeddingFailed { item_id, reason } => {
                write!(f, "embedding failed for {}: {}", item_id, reason)
            }
            Self::EmbeddingTimedOut { item_id } => {
                write!(f, "embedding timed out for {}", item_id)
            }
            Self::DimensionRejected { item_id, expected, actual } => write!(
                f,
                "embedding for {} has {} dimensions, expected {}",
                item_id, actual, expected
            ),
            Self::ScoreClamped { left, right, raw, clamped } => write!(
                f,
                "similarity {} between {} and {} clamped to {}",
                raw, left, right, clamped
            ),
            Self::DuplicateItem { item_id } => write!(f, "duplicate item id {}", item_id),
        }
    }
}

/// Result of one deduplication run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupReport {
    pub clusters: Vec<MergedCluster>,
    /// Pairs that scored above the threshold, ascending by `(left, right)`.
    #[serde(default)]
    pub edges: Vec<SimilarityEdge>,
    pub warnings: Vec<ClusterWarning>,
}

impl DedupReport {
    pub fn degraded_items(&self) -> Vec<&str> {
        self.warnings.iter().filter_map(ClusterWarning::degraded_item).collect()
    }
}
