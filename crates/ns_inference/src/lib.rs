pub mod embeddings;
pub mod models;
pub mod search;

pub use embeddings::EnrichmentStage;
pub use models::{create_embedder, create_ranker};
pub use search::{Origin, SearchOrchestrator, SearchOutcome};

pub mod prelude {
    pub use super::embeddings::EnrichmentStage;
    pub use super::models::{create_embedder, create_ranker};
    pub use super::search::{SearchOrchestrator, SearchOutcome};
    pub use ns_core::{Article, Error, RankedArticle, Result};
}
