use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use ns_core::{Error, RankedArticle};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub description: String,
}

impl From<RankedArticle> for SearchHit {
    fn from(ranked: RankedArticle) -> Self {
        let article = ranked.article;
        Self {
            url: article.link,
            title: article.title,
            description: article.summary.unwrap_or_default(),
        }
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    if !state.storage.is_ready().await? {
        return Err(Error::DataNotReady(
            "Required data file is missing. Please fetch the data first.".to_string(),
        )
        .into());
    }
    let outcome = state.search.search(&params.query).await?;
    info!("Search '{}' answered with {} results ({:?})", params.query.trim(), outcome.results.len(), outcome.origin);
    Ok(Json(outcome.results.into_iter().map(SearchHit::from).collect()))
}

pub async fn update_dataset(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let _running = state.ingest_lock.try_lock().map_err(|_| ApiError::IngestionRunning)?;

    let report = state.ingestion.run(&state.sources).await?;
    let enriched = state.enrichment.run().await?;
    Ok(Json(json!({
        "data": "Dataset updated",
        "fetched": report.fetched,
        "added": report.merge.added,
        "failed_feeds": report.failed_feeds,
        "enriched": enriched,
    })))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let ready = state.storage.is_ready().await?;
    Ok(Json(json!({ "status": "ok", "dataset_ready": ready })))
}
