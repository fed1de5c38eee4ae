use nc_core::{Cluster, ClusterWarning, Error, NewsItem, Result, SimilarityEdge};
use tracing::{debug, info, warn};

use crate::similarity::{clamp_score, cosine_similarity};
use crate::union_find::UnionFind;

/// Partition of one batch plus what was observed while building it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Clustering {
    /// Members ascending by id; clusters ordered by their smallest member id.
    pub clusters: Vec<Cluster>,
    /// Every pair that scored above the threshold, in visiting order.
    pub edges: Vec<SimilarityEdge>,
    pub warnings: Vec<ClusterWarning>,
}

/// Threshold-based single-linkage clustering over pairwise cosine similarity.
///
/// Any two items scoring above the threshold share a cluster, and membership
/// chains: if A~B and B~C pass, A, B and C end up together even when A~C does not.
#[derive(Debug, Clone, Copy)]
pub struct ClusteringEngine {
    threshold: f32,
}

impl ClusteringEngine {
    pub fn new(threshold: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Cluster items by the cosine similarity of their embeddings. Items without
    /// an embedding are never compared and end up as singletons.
    pub fn cluster(&self, items: &[NewsItem]) -> Result<Clustering> {
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        self.cluster_scored(&ids, |i, j| {
            match (items[i].embedding.as_deref(), items[j].embedding.as_deref()) {
                (Some(a), Some(b)) => cosine_similarity(a, b).map(Some),
                _ => Ok(None),
            }
        })
    }

    /// Cluster arbitrary ids with a caller-supplied pairwise score.
    ///
    /// `score(i, j)` receives indices into `ids` and returns `None` when the pair
    /// cannot be compared. Pairs are visited in ascending `(ids[i], ids[j])` order
    /// regardless of the order of `ids`.
    pub fn cluster_scored<F>(&self, ids: &[&str], mut score: F) -> Result<Clustering>
    where
        F: FnMut(usize, usize) -> Result<Option<f32>>,
    {
        let n = ids.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| ids[a].cmp(ids[b]));

        let mut sets = UnionFind::new(n);
        let mut edges = Vec::new();
        let mut warnings = Vec::new();
        let mut comparisons = 0usize;

        for p in 0..n {
            for q in (p + 1)..n {
                let (i, j) = (order[p], order[q]);
                let Some(raw) = score(i, j)? else {
                    continue;
                };
                comparisons += 1;

                let (similarity, anomaly) = clamp_score(raw);
                if let Some(anomaly) = anomaly {
                    warn!(
                        left = ids[i],
                        right = ids[j],
                        raw = anomaly.raw,
                        "similarity out of range, clamped to {}",
                        anomaly.clamped
                    );
                    warnings.push(ClusterWarning::ScoreClamped {
                        left: ids[i].to_string(),
                        right: ids[j].to_string(),
                        raw: anomaly.raw,
                        clamped: anomaly.clamped,
                    });
                }

                if similarity > self.threshold {
                    if sets.union(p, q) {
                        debug!(left = ids[i], right = ids[j], similarity, "merged clusters");
                    }
                    edges.push(SimilarityEdge {
                        left: ids[i].to_string(),
                        right: ids[j].to_string(),
                        score: similarity,
                    });
                }
            }
        }

        let clusters: Vec<Cluster> = sets
            .groups()
            .into_iter()
            .map(|group| Cluster {
                member_ids: group.into_iter().map(|p| ids[order[p]].to_string()).collect(),
            })
            .collect();

        info!(
            items = n,
            comparisons,
            clusters = clusters.len(),
            threshold = self.threshold,
            "clustering complete"
        );

        Ok(Clustering { clusters, edges, warnings })
    }
}
