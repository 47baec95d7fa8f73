//! Groups fetched articles into clusters of likely-duplicate stories.
//!
//! The grouping key comes from a [`SimilarityStrategy`]. Today the only
//! strategy is an exact match on the normalized title, so two phrasings of
//! the same story end up in different clusters.

use std::collections::HashMap;

use crate::model::{Article, Cluster};

/// Maps an article to the key it is grouped by
pub trait SimilarityStrategy: Send + Sync {
    fn fingerprint(&self, article: &Article) -> String;
}

/// Lower-cased title with whitespace runs collapsed
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTitle;

impl SimilarityStrategy for ExactTitle {
    fn fingerprint(&self, article: &Article) -> String {
        article
            .title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// Partition `articles` by fingerprint.
///
/// Clusters come out in discovery order (the position where each key first
/// appears) and members keep their input order. Callers cap the number of
/// clusters they process, so this order decides which stories are considered.
pub fn cluster_articles<I>(articles: I, strategy: &dyn SimilarityStrategy) -> Vec<Cluster>
where
    I: IntoIterator<Item = Article>,
{
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for article in articles {
        let key = strategy.fingerprint(&article);
        match index.get(&key) {
            Some(&pos) => clusters[pos].push(article),
            None => {
                index.insert(key.clone(), clusters.len());
                clusters.push(Cluster::new(key, article));
            }
        }
    }

    clusters
}
