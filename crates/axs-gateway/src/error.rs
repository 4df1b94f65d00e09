//! Gateway Error Types

use axs_core::{Rejection, TokenError};
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Merchant settings are missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token encoding or link building failed
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Callback URL carried no `data` token
    #[error("Callback carried no payment token")]
    MissingToken,

    /// Callback token was rejected or its payload is unusable
    #[error("Invalid callback: {}", .0.message)]
    InvalidCallback(Rejection),

    /// Order referenced by a checkout or callback does not exist
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Order store failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Background task running token work failed to complete
    #[error("Task error: {0}")]
    Task(String),

    /// Payment status check returned something unusable
    #[error("Status check error: {0}")]
    StatusCheck(String),

    /// HTTP transport error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl GatewayError {
    /// Whether the error was caused by the inbound request rather than this service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingToken
                | GatewayError::InvalidCallback(_)
                | GatewayError::OrderNotFound(_)
        )
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> &str {
        match self {
            GatewayError::Config(_) => "AXS Checkout is currently unavailable. Please try again later.",
            GatewayError::Token(e) => e.user_message(),
            GatewayError::MissingToken | GatewayError::InvalidCallback(_) => "Invalid webhook data",
            GatewayError::OrderNotFound(_) => "Order not found",
            GatewayError::StatusCheck(_) | GatewayError::Network(_) => {
                "Payment status is currently unavailable."
            }
            GatewayError::Storage(_) | GatewayError::Task(_) => {
                "An error occurred processing your request."
            }
        }
    }
}
