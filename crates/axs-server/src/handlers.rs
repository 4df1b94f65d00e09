//! HTTP Handlers

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, StatusCode, header},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use axs_gateway::{
    GatewayError, Order, OrderStore, PaymentFields, PaymentGateway, PaymentRedirect,
    PaymentStatusResponse, SettingsSummary,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: &'static str,
    #[serde(flatten)]
    pub settings: SettingsSummary,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub total: Decimal,
    pub currency: String,
    #[serde(default)]
    pub return_url: Option<String>,
}

/// Webhook reply, shaped like the shop platform's JSON responses
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub data: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(e: &GatewayError) -> ApiError {
    let (status, code) = match e {
        GatewayError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "GATEWAY_UNAVAILABLE"),
        GatewayError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
        GatewayError::MissingToken | GatewayError::InvalidCallback(_) => {
            (StatusCode::BAD_REQUEST, "INVALID_CALLBACK")
        }
        GatewayError::StatusCheck(_) | GatewayError::Network(_) => {
            (StatusCode::BAD_GATEWAY, "STATUS_UNAVAILABLE")
        }
        GatewayError::Token(_) | GatewayError::Storage(_) | GatewayError::Task(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    };

    (
        status,
        Json(ErrorResponse {
            error: e.user_message().into(),
            code: code.into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: axs_gateway::GATEWAY_ID,
        settings: state.gateway.settings().summary(),
    })
}

/// Checkout page fields for this payment method
pub async fn payment_fields(State(state): State<AppState>) -> Json<PaymentFields> {
    Json(state.gateway.payment_fields())
}

/// Create a pending order
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .orders
        .create(payload.total, &payload.currency, payload.return_url)
        .map_err(|e| {
            tracing::error!("Order creation error: {}", e);
            api_error(&e)
        })?;

    tracing::info!(order_id = order.id, total = %order.total, currency = %order.currency, "Created order");

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Order>, ApiError> {
    state
        .orders
        .get(id)
        .map_err(|e| api_error(&e))?
        .map(Json)
        .ok_or_else(|| api_error(&GatewayError::OrderNotFound(id.to_string())))
}

/// Build the AXS payment link for an order
pub async fn checkout(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PaymentRedirect>, ApiError> {
    state.gateway.initiate_payment(id).await.map(Json).map_err(|e| {
        tracing::error!(order_id = id, "Checkout error: {}", e);
        api_error(&e)
    })
}

/// Ask AXS for the payment state of an order
pub async fn payment_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    state.gateway.check_payment_status(id).await.map(Json).map_err(|e| {
        tracing::warn!(order_id = id, "Status check error: {}", e);
        api_error(&e)
    })
}

/// AXS webhook (`/wc-api/axs_checkout`)
///
/// The token travels in the query string, so GET and POST are handled alike
/// and the body is ignored.
pub async fn axs_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> (StatusCode, Json<WebhookResponse>) {
    let request_url = request_url(&headers, &uri);

    match state.gateway.handle_callback(&request_url).await {
        Ok(_) => (
            StatusCode::OK,
            Json(WebhookResponse {
                success: true,
                data: "Webhook processed successfully".into(),
            }),
        ),
        Err(e) => {
            let status = match &e {
                GatewayError::MissingToken | GatewayError::InvalidCallback(_) => {
                    StatusCode::BAD_REQUEST
                }
                GatewayError::OrderNotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(WebhookResponse {
                    success: false,
                    data: e.user_message().into(),
                }),
            )
        }
    }
}

/// Rebuild the absolute URL the caller used, honouring reverse-proxy headers
fn request_url(headers: &HeaderMap, uri: &axum::http::Uri) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let scheme = header_value("x-forwarded-proto").unwrap_or("http");
    let host = header_value("x-forwarded-host")
        .or_else(|| header_value(header::HOST.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map_or("/", |pq| pq.as_str());

    format!("{scheme}://{host}{path}")
}
