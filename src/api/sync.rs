use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::sync::{SyncOutcome, SyncStatusView};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Serialize)]
pub struct SyncStatusResponse {
    pub accounts: Vec<SyncStatusView>,
}

#[derive(Serialize)]
pub struct SyncRunResponse {
    pub status: &'static str,
    pub results: Vec<SyncOutcome>,
}

pub async fn sync_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SyncStatusResponse>, AppError> {
    let accounts = state.sync.status_overview().await?;
    Ok(Json(SyncStatusResponse { accounts }))
}

/// Run a sync now. The body is optional; `{ "accountId": ... }` narrows the
/// run to one account.
pub async fn trigger_sync(
    State(state): State<Arc<AppState>>,
    body: Option<Json<SyncRequest>>,
) -> Result<Json<SyncRunResponse>, AppError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let results = state.sync.sync(request.account_id.as_deref()).await?;
    Ok(Json(SyncRunResponse {
        status: "success",
        results,
    }))
}
