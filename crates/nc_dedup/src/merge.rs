use std::cmp::Ordering;
use std::collections::HashMap;

use nc_core::{digest_hex, Cluster, Error, MergedCluster, NewsItem, Result};
use url::Url;

const CLUSTER_ID_LEN: usize = 16;

/// Picks one representative per cluster and folds member metadata into it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MergeResolver;

impl MergeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve every cluster against the items it was built from.
    pub fn resolve_all(&self, clusters: &[Cluster], items: &[NewsItem]) -> Result<Vec<MergedCluster>> {
        let by_id: HashMap<&str, &NewsItem> = items.iter().map(|item| (item.id.as_str(), item)).collect();
        clusters.iter().map(|cluster| self.resolve(cluster, &by_id)).collect()
    }

    pub fn resolve(&self, cluster: &Cluster, items: &HashMap<&str, &NewsItem>) -> Result<MergedCluster> {
        let mut member_ids = cluster.member_ids.clone();
        member_ids.sort();

        let members = member_ids
            .iter()
            .map(|id| items.get(id.as_str()).copied().ok_or_else(|| Error::UnknownItem(id.clone())))
            .collect::<Result<Vec<&NewsItem>>>()?;

        let representative = members
            .iter()
            .copied()
            .min_by(|a, b| representative_order(a, b))
            .ok_or_else(|| Error::UnknownItem("empty cluster".to_string()))?;

        let mut sources: Vec<String> = Vec::new();
        let mut alternate_titles: Vec<String> = Vec::new();
        let mut urls: Vec<Url> = Vec::new();
        for member in &members {
            push_distinct(&mut sources, &member.source);
            push_distinct(&mut alternate_titles, &member.title);
            if let Some(url) = &member.url {
                push_distinct(&mut urls, url);
            }
        }

        let mut representative = representative.clone();
        representative.embedding = None;

        Ok(MergedCluster {
            cluster_id: digest_hex(&member_ids.join("\n"), CLUSTER_ID_LEN),
            representative,
            member_ids,
            sources,
            alternate_titles,
            urls,
        })
    }
}

/// `Less` means `a` is the better representative: longer text, then earlier
/// publication (undated last), then smaller id.
pub fn representative_order(a: &NewsItem, b: &NewsItem) -> Ordering {
    b.content_len()
        .cmp(&a.content_len())
        .then_with(|| match (a.published_at, b.published_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.id.cmp(&b.id))
}

fn push_distinct<T: PartialEq + Clone>(list: &mut Vec<T>, value: &T) {
    if !list.contains(value) {
        list.push(value.clone());
    }
}
