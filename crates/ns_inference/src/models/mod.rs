use std::sync::Arc;

use ns_core::{Config, EmbeddingModel, RankingService, Result};

pub mod lexical;
pub mod remote;

pub use lexical::{HashEmbedder, LexicalRanker};
pub use remote::{RemoteEmbedder, RemoteRanker};

/// The configured cross-encoder when a model server is set, the offline
/// lexical ranker otherwise.
pub fn create_ranker(config: &Config) -> Result<Arc<dyn RankingService>> {
    match config.model_url.as_deref() {
        Some(url) => Ok(Arc::new(RemoteRanker::new(url, &config.ranking_model)?)),
        None => Ok(Arc::new(LexicalRanker::new())),
    }
}

pub fn create_embedder(config: &Config) -> Result<Arc<dyn EmbeddingModel>> {
    match config.model_url.as_deref() {
        Some(url) => Ok(Arc::new(RemoteEmbedder::new(url, &config.embedding_model)?)),
        None => Ok(Arc::new(HashEmbedder::default())),
    }
}
