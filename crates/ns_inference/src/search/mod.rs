use std::sync::Arc;
use std::time::Duration;

use ns_core::{Article, ArticleStorage, Config, Error, RankedArticle, RankingService, Result};
use ns_storage::QueryCache;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where the results of a search came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Origin {
    CacheHit,
    /// Scored against the corpus. `cached` is false when the cache write failed.
    Computed { cached: bool },
    /// No dataset to search yet.
    NoCorpus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<RankedArticle>,
    pub origin: Origin,
}

pub fn normalize_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::InvalidQuery("No query provided".to_string()));
    }
    Ok(query)
}

/// Pairs articles with their scores and keeps the `k` best, highest first.
/// Equal scores keep corpus order; NaN ranks last.
pub fn select_top_k(corpus: Vec<Article>, scores: Vec<f32>, k: usize) -> Result<Vec<RankedArticle>> {
    if scores.len() != corpus.len() {
        return Err(Error::Inference(format!(
            "Ranker returned {} scores for {} articles",
            scores.len(),
            corpus.len()
        )));
    }
    let rank_key = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    let mut ranked: Vec<RankedArticle> = corpus
        .into_iter()
        .zip(scores)
        .map(|(article, similarity)| RankedArticle { article, similarity })
        .collect();
    ranked.sort_by(|a, b| rank_key(b.similarity).total_cmp(&rank_key(a.similarity)));
    ranked.truncate(k);
    Ok(ranked)
}

/// Answers queries from the cache, falling back to scoring the whole corpus.
pub struct SearchOrchestrator {
    storage: Arc<dyn ArticleStorage>,
    cache: Arc<QueryCache>,
    ranker: Arc<dyn RankingService>,
    top_k: usize,
    score_timeout: Option<Duration>,
}

impl SearchOrchestrator {
    pub fn new(
        storage: Arc<dyn ArticleStorage>,
        cache: Arc<QueryCache>,
        ranker: Arc<dyn RankingService>,
        config: &Config,
    ) -> Self {
        Self {
            storage,
            cache,
            ranker,
            top_k: config.top_k,
            score_timeout: config.score_timeout,
        }
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        self.search_with_cancel(query, &CancellationToken::new()).await
    }

    /// Cancelling `cancel` while scoring aborts the search without touching the cache.
    pub async fn search_with_cancel(&self, query: &str, cancel: &CancellationToken) -> Result<SearchOutcome> {
        let query = normalize_query(query)?;

        match self.cache.lookup_async(query).await {
            Ok(Some(results)) => {
                info!("Loading cached results for query: {}", query);
                return Ok(SearchOutcome { results, origin: Origin::CacheHit });
            }
            Ok(None) => debug!("No cached results for query: {}", query),
            Err(e) => warn!("Query cache unavailable ({}), recomputing: {}", e, query),
        }

        let corpus = match self.storage.snapshot().await? {
            Some(corpus) if !corpus.is_empty() => corpus,
            _ => {
                info!("No corpus to search for query: {}", query);
                return Ok(SearchOutcome { results: Vec::new(), origin: Origin::NoCorpus });
            }
        };

        let summaries: Vec<String> = corpus.iter().map(|a| a.summary_text().to_string()).collect();
        info!("🔍 Scoring {} articles with {} for query: {}", corpus.len(), self.ranker.name(), query);
        let scores = self.score(query, &summaries, cancel).await?;
        let results = select_top_k(corpus, scores, self.top_k)?;

        let cached = match self.cache.store_async(query, results.clone()).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to cache results for query '{}': {}", query, e);
                false
            }
        };
        Ok(SearchOutcome { results, origin: Origin::Computed { cached } })
    }

    async fn score(&self, query: &str, summaries: &[String], cancel: &CancellationToken) -> Result<Vec<f32>> {
        let scoring = async {
            match self.score_timeout {
                Some(limit) => tokio::time::timeout(limit, self.ranker.score(query, summaries))
                    .await
                    .unwrap_or_else(|_| Err(Error::Timeout(limit))),
                None => self.ranker.score(query, summaries).await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            scores = scoring => scores,
        }
    }
}
