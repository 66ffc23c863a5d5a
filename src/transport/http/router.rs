use crate::app::CheckoutResponse;
use crate::domain::signing::Protocol;
use crate::transport::http::handlers::{checkout, health};
use crate::transport::http::types::{CheckoutBody, CheckoutInfo, ErrorResponse, HealthResponse};
use axum::routing::get;
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        checkout::checkout_info_handler,
        checkout::checkout_handler
    ),
    components(schemas(
        CheckoutBody,
        CheckoutInfo,
        CheckoutResponse,
        ErrorResponse,
        HealthResponse,
        Protocol
    ))
)]
pub struct ApiDoc;

/// The checkout is served at `/checkout` and, for the web client, `/api/nft-pass/checkout`.
pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/checkout",
            get(checkout::checkout_info_handler).post(checkout::checkout_handler),
        )
        .route(
            "/api/nft-pass/checkout",
            get(checkout::checkout_info_handler).post(checkout::checkout_handler),
        )
        .with_state(app_state)
}
