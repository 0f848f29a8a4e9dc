use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::services::{LinkingError, SyncError};
use crate::store::StoreError;
use crate::upstream::aggregator::AggregatorError;
use crate::upstream::{TokenError, UpstreamError};

/// Error returned by HTTP handlers. Every variant is reported to the
/// frontend as `500 { "error": message }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Linking(#[from] LinkingError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<AggregatorError> for AppError {
    fn from(e: AggregatorError) -> Self {
        match e {
            AggregatorError::Token(t) => AppError::Token(t),
            AggregatorError::Upstream(u) => AppError::Upstream(u),
        }
    }
}

impl AppError {
    /// Upstream HTTP status behind this error, if it came from one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            AppError::Upstream(e) => e.status(),
            AppError::Token(TokenError::Authentication(e)) => e.status(),
            AppError::Linking(LinkingError::Ledger(e)) => e.status(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            error = %self,
            upstream_status = ?self.upstream_status(),
            "request failed"
        );

        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
