//! AXS Checkout HTTP Server
//!
//! Axum-based server hosting the AXS Checkout gateway: order API, checkout
//! redirects and the provider webhook.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axs_gateway::{AxsCheckoutGateway, GatewaySettings, MemoryOrderStore, StatusClient};

use crate::handlers::{
    axs_webhook, checkout, create_order, get_order, health_check, payment_fields, payment_status,
};
use crate::state::AppState;

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/payment-fields", get(payment_fields))

        // Orders
        .route("/api/orders", post(create_order))
        .route("/api/orders/{id}", get(get_order))
        .route("/api/orders/{id}/checkout", post(checkout))
        .route("/api/orders/{id}/status", post(payment_status))

        // Provider webhook
        .route("/wc-api/axs_checkout", get(axs_webhook).post(axs_webhook))

        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let settings = GatewaySettings::from_env()?;

    if !settings.enabled {
        tracing::warn!("⚠ AXS Checkout disabled - set AXS_ENABLED=yes to accept payments");
    }
    match settings.active_credentials() {
        Ok(creds) => tracing::info!(
            test_mode = creds.test_mode,
            client_id = creds.client_id(),
            "✓ AXS Checkout configured"
        ),
        Err(e) => tracing::warn!("⚠ {}", e),
    }

    let orders = Arc::new(MemoryOrderStore::new());
    let mut gateway = AxsCheckoutGateway::from_settings(settings, orders)?;

    match StatusClient::new() {
        Ok(client) => gateway = gateway.with_status_client(client),
        Err(e) => tracing::warn!("⚠ Payment status checks disabled: {}", e),
    }

    let app = router(AppState::new(gateway));

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 axs-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                     - Health check");
    tracing::info!("  GET  /api/payment-fields         - Checkout page fields");
    tracing::info!("  POST /api/orders                 - Create order");
    tracing::info!("  GET  /api/orders/{{id}}            - Get order");
    tracing::info!("  POST /api/orders/{{id}}/checkout   - Create AXS payment link");
    tracing::info!("  POST /api/orders/{{id}}/status     - Check payment status");
    tracing::info!("  GET|POST /wc-api/axs_checkout    - AXS webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
