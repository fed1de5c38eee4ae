//! Embedding-based deduplication of a daily news batch.
//!
//! Items are embedded, compared pairwise, grouped with a disjoint-set forest
//! whenever their cosine similarity exceeds the configured threshold, and each
//! group is collapsed into a single [`MergedCluster`](nc_core::MergedCluster).

pub mod cluster;
pub mod merge;
pub mod pipeline;
pub mod similarity;
pub mod union_find;

pub use cluster::{Clustering, ClusteringEngine};
pub use merge::MergeResolver;
pub use pipeline::DedupPipeline;
pub use similarity::cosine_similarity;

pub mod prelude {
    pub use super::{ClusteringEngine, DedupPipeline, MergeResolver};
    pub use nc_core::{DedupConfig, DedupReport, MergedCluster, NewsItem, Result, Error};
}
