use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/update_dataset", get(handlers::update_dataset))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(addr: &str, state: AppState) -> ns_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Listening on {}", addr);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, AppState};
    pub use ns_core::{Error, Result};
}
