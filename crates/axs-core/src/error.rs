//! Error Types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for token and link operations
pub type Result<T> = std::result::Result<T, TokenError>;

/// Token codec and link composition errors
#[derive(Error, Debug)]
pub enum TokenError {
    /// Payload could not be serialized or the cipher failed while encrypting
    #[error("Encode error: {0}")]
    Encode(String),

    /// Payment parameters or codec settings violate an invariant
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Token structure or protected header is invalid or unsupported
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Key unwrap or authentication tag verification failed
    #[error("Token authentication failed")]
    Authentication,

    /// Decryption succeeded but the plaintext is not a valid payload
    #[error("Payload format error: {0}")]
    PayloadFormat(String),

    /// Merchant base link is not an absolute URL
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Coarse classification of a [`TokenError`], safe to expose to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Encode,
    InvalidParams,
    MalformedToken,
    Authentication,
    PayloadFormat,
    InvalidBaseUrl,
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Encode(_) => ErrorKind::Encode,
            TokenError::InvalidParams(_) => ErrorKind::InvalidParams,
            TokenError::MalformedToken(_) => ErrorKind::MalformedToken,
            TokenError::Authentication => ErrorKind::Authentication,
            TokenError::PayloadFormat(_) => ErrorKind::PayloadFormat,
            TokenError::InvalidBaseUrl(_) => ErrorKind::InvalidBaseUrl,
        }
    }

    /// Whether the error came from untrusted token input rather than local state
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TokenError::MalformedToken(_)
                | TokenError::Authentication
                | TokenError::PayloadFormat(_)
        )
    }

    /// Generic message that never reveals which cryptographic step failed
    pub fn user_message(&self) -> &'static str {
        match self {
            TokenError::MalformedToken(_)
            | TokenError::Authentication
            | TokenError::PayloadFormat(_) => "Payment data could not be verified.",
            TokenError::InvalidBaseUrl(_) => "Payment link is misconfigured.",
            TokenError::InvalidParams(_) => "Payment request is invalid.",
            TokenError::Encode(_) => "An internal error occurred creating the payment link.",
        }
    }
}

impl From<serde_json::Error> for TokenError {
    fn from(err: serde_json::Error) -> Self {
        TokenError::PayloadFormat(err.to_string())
    }
}
