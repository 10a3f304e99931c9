use async_trait::async_trait;
use ns_core::{Article, ArticleStorage, MergeReport, Result};
use tokio::sync::RwLock;

use crate::article_store::dedup_by_link;

#[derive(Debug, Default)]
struct MemoryStore {
    staging: Option<Vec<Article>>,
    dataset: Option<Vec<Article>>,
}

/// Process-local [`ArticleStorage`] with the same merge semantics as the
/// file-backed store.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    store: RwLock<MemoryStore>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with an already merged dataset.
    pub fn with_articles(articles: Vec<Article>) -> Self {
        Self {
            store: RwLock::new(MemoryStore {
                staging: None,
                dataset: Some(articles),
            }),
        }
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn append_staged(&self, articles: &[Article]) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }
        let mut store = self.store.write().await;
        store.staging.get_or_insert_with(Vec::new).extend_from_slice(articles);
        Ok(1)
    }

    async fn merge_staged_into_final(&self) -> Result<MergeReport> {
        let mut store = self.store.write().await;
        let Some(staged) = store.staging.take() else {
            let total = store.dataset.as_ref().map(Vec::len).unwrap_or(0);
            return Ok(MergeReport { added: 0, total, merged: false });
        };
        let mut combined = store.dataset.take().unwrap_or_default();
        let before = combined.len();
        combined.extend(staged);
        let merged = dedup_by_link(combined);
        let report = MergeReport {
            added: merged.len().saturating_sub(before),
            total: merged.len(),
            merged: true,
        };
        store.dataset = Some(merged);
        Ok(report)
    }

    async fn snapshot(&self) -> Result<Option<Vec<Article>>> {
        Ok(self.store.read().await.dataset.clone())
    }

    async fn is_ready(&self) -> Result<bool> {
        Ok(self.store.read().await.dataset.is_some())
    }
}
