pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use models::{EmbeddingModel, FeedFetcher, RankingService};
pub use storage::ArticleStorage;
pub use types::{Article, FeedEntry, FeedSource, MergeReport, RankedArticle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_entry_into_article() {
        let entry = FeedEntry {
            title: "Titre".to_string(),
            link: "https://vsd.fr/a".to_string(),
            published: None,
            summary: None,
        };
        let article = entry.into_article("https://vsd.fr/feed/", "vsd.fr");
        assert_eq!(article.site, "vsd.fr");
        assert_eq!(article.source, "https://vsd.fr/feed/");
        assert_eq!(article.summary_text(), "");
    }
}
