use async_trait::async_trait;
use crate::types::{Article, MergeReport};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Append articles to the staging area, returns the number of batches written
    async fn append_staged(&self, articles: &[Article]) -> Result<usize>;

    /// Fold the staging area into the dataset, deduplicating on `link`
    async fn merge_staged_into_final(&self) -> Result<MergeReport>;

    /// Full dataset, or `None` when no dataset has been written yet
    async fn snapshot(&self) -> Result<Option<Vec<Article>>>;

    /// Whether a dataset exists to search against
    async fn is_ready(&self) -> Result<bool>;
}
