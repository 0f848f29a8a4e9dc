use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::AppState;

pub mod handlers;
pub mod ledger;
pub mod sync;

/// Build the full HTTP surface: `/healthz` plus the JSON API under `/api`.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/requisitions",
            get(handlers::list_requisitions).post(handlers::create_requisition),
        )
        .route(
            "/requisitions/:id",
            get(handlers::get_requisition).delete(handlers::delete_requisition),
        )
        .route("/institutions", get(handlers::list_institutions))
        .route("/accounts/:id", get(handlers::get_account))
        .route("/auth/token", post(handlers::issue_token))
        .route("/lunchmoney/assets", get(ledger::list_assets))
        .route("/lunchmoney/link", post(ledger::link_accounts))
        .route("/lunchmoney/unlink", post(ledger::unlink_accounts))
        .route("/sync/status", get(sync::sync_status))
        .route("/sync", post(sync::trigger_sync))
        .fallback(fallback_404);

    let cors = cors_layer(&state.config.frontend_origin);

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// The configured frontend origin plus any localhost port.
fn cors_layer(frontend_origin: &str) -> CorsLayer {
    let allowed = frontend_origin.to_string();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin = origin.to_str().unwrap_or("");
            origin == allowed
                || origin.starts_with("http://localhost:")
                || origin.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

/// Tag every response with an `x-request-id` so frontend errors can be
/// matched to server logs.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %req_id);

    let mut resp = next.run(req).instrument(span).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    // responses carry bank data
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.remove(header::SERVER);

    resp
}
