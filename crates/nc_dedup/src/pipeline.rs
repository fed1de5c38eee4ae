use std::collections::HashSet;
use std::sync::Arc;
use std::future::Future;
use std::time::Instant as StdInstant;

use futures::future::join_all;
use nc_core::{
    ClusterWarning, DedupConfig, DedupReport, EmbeddingProvider, Error, NewsItem, Result,
};
use nc_inference::embeddings::EmbeddingGenerator;
use tokio::sync::Semaphore;
use tokio::time::error::Elapsed;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cluster::ClusteringEngine;
use crate::merge::MergeResolver;

/// Runs one batch through embedding, clustering and merge.
#[derive(Debug, Clone)]
pub struct DedupPipeline {
    generator: EmbeddingGenerator,
    engine: ClusteringEngine,
    resolver: MergeResolver,
    config: DedupConfig,
}

impl DedupPipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: DedupConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator: EmbeddingGenerator::new(provider),
            engine: ClusteringEngine::new(config.similarity_threshold)?,
            resolver: MergeResolver::new(),
            config,
        })
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Deduplicate a batch. Clusters come back ordered by representative id;
    /// per-item problems are reported in `warnings` instead of failing the run.
    pub async fn run(&self, items: Vec<NewsItem>) -> Result<DedupReport> {
        if items.is_empty() {
            info!("🗞️ Empty batch, nothing to cluster");
            return Ok(DedupReport::default());
        }

        let started = StdInstant::now();
        let mut warnings = Vec::new();
        let mut items = drop_duplicate_ids(items, &mut warnings);
        items.sort_by(|a, b| a.id.cmp(&b.id));
        info!("🗞️ Deduplicating {} news items", items.len());

        let items = self.attach_embeddings(items, &mut warnings).await;
        let embedded = items.iter().filter(|item| item.embedding.is_some()).count();
        info!(
            "🔢 Embeddings ready for {}/{} items in {:.2}s",
            embedded,
            items.len(),
            started.elapsed().as_secs_f64()
        );

        let clustering_started = StdInstant::now();
        let clustering = self.engine.cluster(&items)?;
        warnings.extend(clustering.warnings);

        let mut clusters = self.resolver.resolve_all(&clustering.clusters, &items)?;
        clusters.sort_by(|a, b| a.representative.id.cmp(&b.representative.id));
        info!(
            "✨ Created {} clusters from {} items in {:.2}s ({} warnings)",
            clusters.len(),
            items.len(),
            clustering_started.elapsed().as_secs_f64(),
            warnings.len()
        );

        Ok(DedupReport {
            clusters,
            edges: clustering.edges,
            warnings,
        })
    }

    /// Fetch missing embeddings concurrently, bounded by `max_concurrent` and the
    /// shared fetch deadline. Returns only once every fetch has settled; items and
    /// their warnings keep the incoming order.
    async fn attach_embeddings(&self, items: Vec<NewsItem>, warnings: &mut Vec<ClusterWarning>) -> Vec<NewsItem> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        // A timeout too large to represent means no deadline at all.
        let deadline = Instant::now().checked_add(self.config.fetch_timeout);
        if deadline.is_none() {
            debug!(timeout = ?self.config.fetch_timeout, "fetch timeout out of range, running without deadline");
        }

        let fetches = items.into_iter().map(|mut item| {
            let semaphore = semaphore.clone();
            let generator = &self.generator;
            async move {
                if item.embedding.is_some() {
                    debug!(item = %item.id, "embedding already attached");
                    return (item, None);
                }

                let outcome = within(deadline, async {
                    let _permit = semaphore.acquire().await.map_err(|e| Error::External(e.into()))?;
                    let embedding = generator.generate_item_embedding(&item).await?;
                    Ok::<_, Error>(embedding)
                })
                .await;

                let warning = match outcome {
                    Ok(Ok(embedding)) => {
                        item.embedding = Some(embedding);
                        None
                    }
                    Ok(Err(e)) => {
                        warn!(item = %item.id, "⚠️ Embedding failed: {}", e);
                        Some(ClusterWarning::EmbeddingFailed {
                            item_id: item.id.clone(),
                            reason: e.to_string(),
                        })
                    }
                    Err(_) => {
                        warn!(item = %item.id, "⚠️ Embedding timed out");
                        Some(ClusterWarning::EmbeddingTimedOut { item_id: item.id.clone() })
                    }
                };
                (item, warning)
            }
        });

        let mut items = Vec::new();
        for (mut item, warning) in join_all(fetches).await {
            warnings.extend(warning);
            if let Some(warning) = self.check_dimensions(&mut item) {
                warnings.push(warning);
            }
            items.push(item);
        }
        items
    }

    fn check_dimensions(&self, item: &mut NewsItem) -> Option<ClusterWarning> {
        let expected = self.config.expected_dimensions?;
        let actual = item.embedding.as_ref()?.len();
        if actual == expected {
            return None;
        }
        warn!(item = %item.id, expected, actual, "⚠️ Embedding has unexpected dimensions");
        item.embedding = None;
        Some(ClusterWarning::DimensionRejected {
            item_id: item.id.clone(),
            expected,
            actual,
        })
    }
}

async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> std::result::Result<F::Output, Elapsed> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut).await,
        None => Ok(fut.await),
    }
}

/// Keep the first item for every id. Duplicates are reported in id order.
fn drop_duplicate_ids(items: Vec<NewsItem>, warnings: &mut Vec<ClusterWarning>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    let kept = items
        .into_iter()
        .filter(|item| {
            if seen.insert(item.id.clone()) {
                true
            } else {
                warn!(item = %item.id, "⚠️ Duplicate item id, keeping first occurrence");
                duplicates.push(item.id.clone());
                false
            }
        })
        .collect();
    duplicates.sort();
    warnings.extend(duplicates.into_iter().map(|item_id| ClusterWarning::DuplicateItem { item_id }));
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nc_core::EmbeddingVector;
    use nc_inference::models::HashingEmbedder;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Looks embeddings up by item title, which is the first line of the text.
    #[derive(Debug, Default)]
    struct MockProvider {
        vectors: HashMap<String, EmbeddingVector>,
        slow: HashSet<String>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockProvider {
        fn with(mut self, title: &str, vector: Vec<f32>) -> Self {
            self.vectors.insert(title.to_string(), vector);
            self
        }

        fn slow(mut self, title: &str) -> Self {
            self.slow.insert(title.to_string());
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let title = text.lines().next().unwrap_or_default();
            if self.slow.contains(title) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            } else if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.vectors
                .get(title)
                .cloned()
                .ok_or_else(|| Error::Provider(format!("quota exceeded for '{}'", title)))
        }
    }

    fn item(id: &str, source: &str, content_len: usize) -> NewsItem {
        NewsItem {
            id: id.to_string(),
            title: id.to_uppercase(),
            source: source.to_string(),
            url: None,
            published_at: None,
            content: "x".repeat(content_len),
            embedding: None,
        }
    }

    fn pipeline(provider: MockProvider, config: DedupConfig) -> (DedupPipeline, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        (DedupPipeline::new(provider.clone(), config).unwrap(), provider)
    }

    fn abc_provider() -> MockProvider {
        // sim(A, B) = 0.9, sim(A, C) = 0.2, sim(B, C) < 0
        let b_y = (1.0f32 - 0.81).sqrt();
        let c_y = -(1.0f32 - 0.04).sqrt();
        MockProvider::default()
            .with("A", vec![1.0, 0.0])
            .with("B", vec![0.9, b_y])
            .with("C", vec![0.2, c_y])
    }

    fn member_sets(report: &DedupReport) -> Vec<Vec<String>> {
        report.clusters.iter().map(|c| c.member_ids.clone()).collect()
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (pipeline, provider) = pipeline(MockProvider::default(), DedupConfig::default());
        let report = pipeline.run(Vec::new()).await.unwrap();
        assert!(report.clusters.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_abc_scenario() {
        let (pipeline, _) = pipeline(abc_provider(), DedupConfig::default());
        let items = vec![item("a", "hn", 120), item("b", "techcrunch", 300), item("c", "arxiv", 80)];
        let report = pipeline.run(items).await.unwrap();

        assert!(report.warnings.is_empty());
        assert_eq!(member_sets(&report), vec![vec!["a", "b"], vec!["c"]]);

        let merged = &report.clusters[0];
        assert_eq!(merged.representative.id, "b");
        assert_eq!(merged.sources, vec!["hn", "techcrunch"]);
        assert_eq!(merged.alternate_titles, vec!["A", "B"]);
        assert!(report.clusters[1].is_singleton());

        assert_eq!(report.edges.len(), 1);
        assert_eq!((report.edges[0].left.as_str(), report.edges[0].right.as_str()), ("a", "b"));
        assert!(report.edges[0].score > 0.85);
    }

    #[tokio::test]
    async fn test_single_failed_item_becomes_singleton() {
        let (pipeline, _) = pipeline(MockProvider::default(), DedupConfig::default());
        let report = pipeline.run(vec![item("lonely", "hn", 10)]).await.unwrap();

        assert_eq!(member_sets(&report), vec![vec!["lonely"]]);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            ClusterWarning::EmbeddingFailed { item_id, .. } if item_id == "lonely"
        ));
        assert_eq!(report.degraded_items(), vec!["lonely"]);
    }

    #[tokio::test]
    async fn test_partial_failure_does_not_abort_batch() {
        let provider = abc_provider();
        let (pipeline, _) = pipeline(provider, DedupConfig::default());
        let items = vec![item("a", "hn", 10), item("b", "hn", 20), item("d", "hn", 5)];
        let report = pipeline.run(items).await.unwrap();

        assert_eq!(member_sets(&report), vec![vec!["a", "b"], vec!["d"]]);
        assert_eq!(report.degraded_items(), vec!["d"]);
    }

    #[tokio::test]
    async fn test_timeout_keeps_partial_results() {
        let provider = abc_provider().slow("C");
        let config = DedupConfig::default().with_fetch_timeout(Duration::from_millis(200));
        let (pipeline, _) = pipeline(provider, config);

        let items = vec![item("a", "hn", 10), item("b", "hn", 20), item("c", "hn", 5)];
        let report = pipeline.run(items).await.unwrap();

        assert_eq!(member_sets(&report), vec![vec!["a", "b"], vec!["c"]]);
        assert_eq!(
            report.warnings,
            vec![ClusterWarning::EmbeddingTimedOut { item_id: "c".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut provider = MockProvider::default().delay(Duration::from_millis(20));
        let mut items = Vec::new();
        for i in 0..8 {
            let id = format!("item{}", i);
            provider = provider.with(&id.to_uppercase(), vec![1.0, i as f32]);
            items.push(item(&id, "hn", 10));
        }
        let config = DedupConfig::default().with_max_concurrent(2);
        let (pipeline, provider) = pipeline(provider, config);

        let report = pipeline.run(items).await.unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 8);
        assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_attached_embeddings_skip_provider() {
        let (pipeline, provider) = pipeline(MockProvider::default(), DedupConfig::default());
        let mut a = item("a", "hn", 10);
        let mut b = item("b", "hn", 10);
        a.embedding = Some(vec![1.0, 0.0]);
        b.embedding = Some(vec![1.0, 0.01]);

        let report = pipeline.run(vec![a, b]).await.unwrap();
        assert_eq!(member_sets(&report), vec![vec!["a", "b"]]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unexpected_dimensions_are_rejected() {
        let provider = abc_provider().with("D", vec![1.0, 0.0, 0.0]);
        let config = DedupConfig::default().with_expected_dimensions(2);
        let (pipeline, _) = pipeline(provider, config);

        let report = pipeline.run(vec![item("a", "hn", 10), item("d", "hn", 10)]).await.unwrap();
        assert_eq!(member_sets(&report), vec![vec!["a"], vec!["d"]]);
        assert_eq!(
            report.warnings,
            vec![ClusterWarning::DimensionRejected { item_id: "d".to_string(), expected: 2, actual: 3 }]
        );
    }

    #[tokio::test]
    async fn test_mixed_dimensions_without_expectation_fail() {
        let provider = abc_provider().with("D", vec![1.0, 0.0, 0.0]);
        let (pipeline, _) = pipeline(provider, DedupConfig::default());
        let result = pipeline.run(vec![item("a", "hn", 10), item("d", "hn", 10)]).await;
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn test_duplicate_ids_keep_first() {
        let (pipeline, _) = pipeline(abc_provider(), DedupConfig::default());
        let mut dup = item("a", "other", 500);
        dup.title = "A".to_string();
        let report = pipeline.run(vec![item("a", "hn", 10), dup]).await.unwrap();

        assert_eq!(member_sets(&report), vec![vec!["a"]]);
        assert_eq!(report.clusters[0].sources, vec!["hn"]);
        assert_eq!(
            report.warnings,
            vec![ClusterWarning::DuplicateItem { item_id: "a".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_deterministic_across_input_order() {
        let items = vec![item("c", "arxiv", 80), item("a", "hn", 120), item("b", "techcrunch", 300)];
        let mut shuffled = items.clone();
        shuffled.rotate_left(1);

        let (pipeline, _) = pipeline(abc_provider(), DedupConfig::default());
        let first = pipeline.run(items).await.unwrap();
        let second = pipeline.run(shuffled).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_warnings_follow_id_order_across_input_orders() {
        // "e" and "d" fail, "f" has the wrong length, "a" is sent twice
        let provider = abc_provider().with("F", vec![1.0, 0.0, 0.0]);
        let config = DedupConfig::default().with_expected_dimensions(2);
        let (pipeline, _) = pipeline(provider, config);

        let items = vec![
            item("f", "hn", 10),
            item("e", "hn", 10),
            item("a", "hn", 10),
            item("d", "hn", 10),
            item("b", "hn", 20),
            item("a", "hn", 10),
        ];
        let mut reversed = items.clone();
        reversed.reverse();

        let first = pipeline.run(items).await.unwrap();
        let second = pipeline.run(reversed).await.unwrap();
        assert_eq!(first, second);

        assert!(matches!(&first.warnings[0], ClusterWarning::DuplicateItem { item_id } if item_id == "a"));
        assert_eq!(first.degraded_items(), vec!["d", "e", "f"]);
    }

    #[tokio::test]
    async fn test_unbounded_fetch_timeout_runs_without_deadline() {
        let provider = Arc::new(HashingEmbedder::new(8).unwrap());
        let config = DedupConfig::default().with_fetch_timeout(Duration::MAX);
        let pipeline = DedupPipeline::new(provider, config).unwrap();

        let report = pipeline.run(vec![item("a", "hn", 10)]).await.unwrap();
        assert_eq!(member_sets(&report), vec![vec!["a"]]);
        assert!(report.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_output_ordered_by_representative_id() {
        // the {a, b} cluster is represented by "b", so "a2" sorts first
        let provider = abc_provider().with("A2", vec![0.0, 1.0]);
        let (pipeline, _) = pipeline(provider, DedupConfig::default());
        let items = vec![item("a", "hn", 10), item("b", "hn", 50), item("a2", "hn", 10)];
        let report = pipeline.run(items).await.unwrap();

        let reps: Vec<&str> = report.clusters.iter().map(|c| c.representative.id.as_str()).collect();
        assert_eq!(reps, vec!["a2", "b"]);
    }

    #[tokio::test]
    async fn test_hashing_embedder_groups_near_duplicates() {
        let provider = Arc::new(HashingEmbedder::new(512).unwrap());
        let pipeline = DedupPipeline::new(provider, DedupConfig::default().with_threshold(0.8)).unwrap();

        let story = |id: &str, source: &str, title: &str, content: &str| NewsItem {
            id: id.to_string(),
            title: title.to_string(),
            source: source.to_string(),
            url: None,
            published_at: None,
            content: content.to_string(),
            embedding: None,
        };
        let items = vec![
            story("1", "hn", "OpenAI releases GPT model", "OpenAI today released a new GPT model for developers"),
            story("2", "techcrunch", "OpenAI releases GPT model", "OpenAI today released a new GPT model for developers and teams"),
            story("3", "arxiv", "Sparse attention for long context", "We study sparse attention kernels"),
        ];

        let report = pipeline.run(items).await.unwrap();
        assert_eq!(member_sets(&report), vec![vec!["1", "2"], vec!["3"]]);
        assert_eq!(report.clusters[0].representative.id, "2");
        assert_eq!(report.clusters[0].sources, vec!["hn", "techcrunch"]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(MockProvider::default());
        let result = DedupPipeline::new(provider, DedupConfig::default().with_threshold(2.0));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
