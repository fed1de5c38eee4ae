pub mod config;
pub mod error;
pub mod models;
pub mod types;

pub use config::DedupConfig;
pub use error::{Error, Result};
pub use models::EmbeddingProvider;
pub use types::{
    digest_hex, Cluster, ClusterWarning, DedupReport, EmbeddingVector, MergedCluster, NewsItem,
    SimilarityEdge,
};
