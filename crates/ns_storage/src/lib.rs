pub mod article_store;
pub mod dataset;
pub mod memory;
pub mod query_cache;

pub use article_store::ArticleStore;
pub use memory::InMemoryStorage;
pub use query_cache::{key_for, QueryCache, QueryCacheEntry, QueryIndex};

pub mod prelude {
    pub use super::article_store::ArticleStore;
    pub use super::query_cache::{key_for, QueryCache};
    pub use ns_core::{Article, ArticleStorage, MergeReport, RankedArticle, Result};
}
