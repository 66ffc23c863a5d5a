// src/bin/api_server.rs

use platform_pass::infra::logging::{init_logging, LogFormat, DEFAULT_FILTER};
use platform_pass::solana::RpcLedger;
use platform_pass::{transport, CheckoutConfig, CheckoutService};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_logging(DEFAULT_FILTER, LogFormat::from_env());

    // --- Configuration ---
    // Anything missing here is fatal: the service must not hand out transactions it cannot sign.
    let config = match CheckoutConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "refusing to start");
            return Err(e.into());
        }
    };
    tracing::info!(
        authority = %config.authority.pubkey(),
        payment_mint = %config.price.payment_mint,
        rpc_url = %config.rpc_url,
        "> Configuration loaded"
    );

    // --- Checkout Service Initialization ---
    let ledger = Arc::new(RpcLedger::new(config.rpc_url.clone()));
    let checkout = Arc::new(CheckoutService::from_config(&config, ledger)?);
    tracing::info!("> {}", checkout.price().summary(&config.metadata.name));

    let app_state = transport::http::AppState {
        checkout,
        label: config.label.clone(),
        icon: config.icon.clone(),
        rpc_url: config.rpc_url.clone(),
    };

    // --- API Server Initialization ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("> API server listening on http://{}", config.bind_addr);
    tracing::info!("> Swagger UI available at http://{}/swagger-ui", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("> Shutdown signal received (Ctrl+C)...");
            }
        })
        .await?;

    tracing::info!("> Graceful shutdown complete.");
    Ok(())
}
