use crate::infra::solana::Ledger;
use crate::transport::http::types::{AppState, HealthResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy (RPC reachable)", body = HealthResponse),
        (status = 503, description = "Service is unhealthy (RPC unreachable)", body = HealthResponse)
    )
)]
pub async fn healthcheck_handler(State(state): State<AppState>) -> impl IntoResponse {
    let authority = state.checkout.authority().to_string();
    let rpc_url = state.rpc_url.clone();

    match state.checkout.ledger().block_height().await {
        Ok(height) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                authority,
                rpc_url,
                block_height: Some(height),
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy".to_string(),
                authority,
                rpc_url,
                block_height: None,
                error: Some(format!("RPC ping failed: {}", e)),
            }),
        ),
    }
}
