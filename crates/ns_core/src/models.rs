use async_trait::async_trait;
use crate::types::FeedEntry;
use crate::Result;

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch every entry of one feed. Failures are per call, not per entry.
    async fn fetch(&self, feed_url: &str) -> Result<Vec<FeedEntry>>;
}

#[async_trait]
pub trait RankingService: Send + Sync {
    fn name(&self) -> &str;

    /// One score per summary, in input order
    async fn score(&self, query: &str, summaries: &[String]) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
