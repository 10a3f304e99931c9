use std::sync::Arc;

use ns_core::{ArticleStorage, FeedSource};
use ns_feeds::IngestionPipeline;
use ns_inference::{EnrichmentStage, SearchOrchestrator};
use tokio::sync::Mutex;

pub struct AppState {
    pub storage: Arc<dyn ArticleStorage>,
    pub search: Arc<SearchOrchestrator>,
    pub ingestion: Arc<IngestionPipeline>,
    pub enrichment: Arc<EnrichmentStage>,
    pub sources: Vec<FeedSource>,
    /// Held for the duration of an ingestion run; one run at a time.
    pub ingest_lock: Mutex<()>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn ArticleStorage>,
        search: Arc<SearchOrchestrator>,
        ingestion: Arc<IngestionPipeline>,
        enrichment: Arc<EnrichmentStage>,
        sources: Vec<FeedSource>,
    ) -> Self {
        Self {
            storage,
            search,
            ingestion,
            enrichment,
            sources,
            ingest_lock: Mutex::new(()),
        }
    }
}
