//! Ledger-side routes: asset listing and account linking.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AppError;
use crate::models::ledger::LinkedAsset;
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub lunchmoney_id: i64,
    pub gocardless_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkRequest {
    pub lunchmoney_id: i64,
    #[serde(default)]
    pub gocardless_id: Option<String>,
}

#[derive(Serialize)]
pub struct AssetsResponse {
    pub assets: Vec<LinkedAsset>,
}

pub async fn list_assets(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssetsResponse>, AppError> {
    let assets = state.linking.list_ledger_assets_with_linkage().await?;
    Ok(Json(AssetsResponse { assets }))
}

pub async fn link_accounts(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LinkRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .linking
        .link_accounts(payload.lunchmoney_id, &payload.gocardless_id)
        .await?;
    Ok(Json(json!({ "message": "Accounts linked successfully" })))
}

pub async fn unlink_accounts(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UnlinkRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .linking
        .unlink_accounts(payload.lunchmoney_id, payload.gocardless_id.as_deref())
        .await?;
    Ok(Json(json!({ "message": "Account unlinked successfully" })))
}
