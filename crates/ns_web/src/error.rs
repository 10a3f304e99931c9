use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ns_core::Error;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    IngestionRunning,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Core(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(Error::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::DataNotReady(_)) => StatusCode::PRECONDITION_REQUIRED,
            ApiError::Core(Error::Timeout(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::IngestionRunning => StatusCode::CONFLICT,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Core(Error::InvalidQuery(msg)) => msg.clone(),
            ApiError::Core(Error::DataNotReady(msg)) => msg.clone(),
            ApiError::Core(e) => e.to_string(),
            ApiError::IngestionRunning => "A dataset update is already running".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.message());
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
