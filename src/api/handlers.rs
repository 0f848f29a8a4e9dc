use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::aggregator::{
    AccountDetails, Institution, NewRequisition, Requisition, RequisitionDetail, RequisitionPage,
};
use crate::AppState;

// ── Request DTOs ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct InstitutionsQuery {
    pub country: String,
}

// ── Requisitions ─────────────────────────────────────────────

pub async fn list_requisitions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RequisitionPage>, AppError> {
    Ok(Json(state.aggregator.list_requisitions().await?))
}

pub async fn get_requisition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequisitionDetail>, AppError> {
    Ok(Json(state.aggregator.get_requisition_detail(&id).await?))
}

pub async fn create_requisition(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewRequisition>,
) -> Result<Json<Requisition>, AppError> {
    Ok(Json(state.aggregator.create_requisition(&payload).await?))
}

pub async fn delete_requisition(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.aggregator.delete_requisition(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Institutions & accounts ──────────────────────────────────

pub async fn list_institutions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InstitutionsQuery>,
) -> Result<Json<Vec<Institution>>, AppError> {
    Ok(Json(
        state.aggregator.list_institutions(&params.country).await?,
    ))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AccountDetails>, AppError> {
    Ok(Json(state.aggregator.get_account(&id).await?))
}

// ── Auth ─────────────────────────────────────────────────────

/// Hand the current aggregator access token to the frontend, as a bare JSON
/// string.
pub async fn issue_token(State(state): State<Arc<AppState>>) -> Result<Json<String>, AppError> {
    let token = state.aggregator.tokens().access_token().await?;
    Ok(Json(token))
}
