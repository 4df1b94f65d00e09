//! Payment Parameters
//!
//! The JSON payload carried inside a token. Outbound links carry the request
//! fields; the provider echoes them back on the webhook together with
//! `status` and `transactionRef`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{Result, TokenError};

/// Merchant reference (order identifier)
///
/// Stores may hand out numeric or textual order ids. The incoming JSON type is
/// kept so a decoded payload compares equal to the one that was encoded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MerchantRef {
    Numeric(u64),
    Text(String),
}

impl MerchantRef {
    pub fn is_empty(&self) -> bool {
        match self {
            MerchantRef::Numeric(_) => false,
            MerchantRef::Text(s) => s.trim().is_empty(),
        }
    }

    /// Numeric order id, accepting digit strings as well
    pub fn as_order_id(&self) -> Option<u64> {
        match self {
            MerchantRef::Numeric(id) => Some(*id),
            MerchantRef::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for MerchantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MerchantRef::Numeric(id) => write!(f, "{id}"),
            MerchantRef::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for MerchantRef {
    fn from(id: u64) -> Self {
        MerchantRef::Numeric(id)
    }
}

impl From<&str> for MerchantRef {
    fn from(s: &str) -> Self {
        MerchantRef::Text(s.to_string())
    }
}

impl From<String> for MerchantRef {
    fn from(s: String) -> Self {
        MerchantRef::Text(s)
    }
}

/// Payment outcome reported by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentStatus {
    Success,
    Declined,
    Expired,
    Other(String),
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Declined => "DECLINED",
            PaymentStatus::Expired => "EXPIRED",
            PaymentStatus::Other(s) => s,
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SUCCESS" => PaymentStatus::Success,
            "DECLINED" => PaymentStatus::Declined,
            "EXPIRED" => PaymentStatus::Expired,
            _ => PaymentStatus::Other(s),
        }
    }
}

impl From<PaymentStatus> for String {
    fn from(status: PaymentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment request / result payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Amount in minor currency units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,

    /// ISO 4217 code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    pub merchant_ref: MerchantRef,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Link lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,

    /// Fields this crate does not model, kept for lossless round trips
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentParams {
    pub fn new(
        client_id: impl Into<String>,
        amount: u64,
        currency: impl Into<String>,
        merchant_ref: impl Into<MerchantRef>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            amount: Some(amount),
            currency: Some(currency.into()),
            merchant_ref: merchant_ref.into(),
            success_url: None,
            fail_url: None,
            webhook_url: None,
            expiry: None,
            status: None,
            transaction_ref: None,
            extra: Map::new(),
        }
    }

    pub fn with_success_url(mut self, url: impl Into<String>) -> Self {
        self.success_url = Some(url.into());
        self
    }

    pub fn with_fail_url(mut self, url: impl Into<String>) -> Self {
        self.fail_url = Some(url.into());
        self
    }

    pub fn with_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn with_expiry(mut self, seconds: u64) -> Self {
        self.expiry = Some(seconds);
        self
    }

    /// Check the payload invariants: a non-empty merchant reference and
    /// absolute URLs wherever a URL field is set.
    pub fn validate(&self) -> Result<()> {
        if self.merchant_ref.is_empty() {
            return Err(TokenError::InvalidParams("merchantRef is empty".into()));
        }

        let urls = [
            ("successUrl", &self.success_url),
            ("failUrl", &self.fail_url),
            ("webhookUrl", &self.webhook_url),
        ];
        for (field, value) in urls {
            if let Some(raw) = value {
                let parsed = Url::parse(raw)
                    .map_err(|e| TokenError::InvalidParams(format!("{field}: {e}")))?;
                if parsed.cannot_be_a_base() {
                    return Err(TokenError::InvalidParams(format!(
                        "{field} is not a hierarchical URL"
                    )));
                }
            }
        }

        Ok(())
    }
}
