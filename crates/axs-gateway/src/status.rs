//! Payment Status Check
//!
//! Asks AXS for the current state of a payment, for orders whose webhook never
//! arrived. A single signed request; failures are returned, not retried.

use std::time::Duration;

use axs_core::{MerchantRef, PaymentStatus};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::config::ActiveCredentials;
use crate::error::{GatewayError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Path appended to the merchant link
pub const STATUS_PATH: &str = "/api/v1/payment/status";

pub const STATUS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusRequest<'a> {
    client_id: &'a str,
    merchant_ref: &'a MerchantRef,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

/// Provider's answer to a status check
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,

    #[serde(default)]
    pub merchant_ref: Option<MerchantRef>,

    #[serde(default)]
    pub transaction_ref: Option<String>,

    #[serde(default)]
    pub amount: Option<u64>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Hex HMAC-SHA256 of `message` under `secret`
pub fn sign(secret: &[u8], message: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| GatewayError::StatusCheck(format!("signing key rejected: {e}")))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build the signed JSON body: the signature covers the JSON encoding of
/// `{clientId, merchantRef, timestamp}` in that field order.
pub fn signed_body(
    creds: &ActiveCredentials,
    merchant_ref: &MerchantRef,
    timestamp: i64,
) -> Result<Value> {
    let mut request = StatusRequest {
        client_id: creds.client_id(),
        merchant_ref,
        timestamp,
        signature: None,
    };
    let unsigned = serde_json::to_vec(&request)
        .map_err(|e| GatewayError::StatusCheck(format!("request serialization failed: {e}")))?;
    request.signature = Some(sign(creds.key.expose_secret(), &unsigned)?);

    serde_json::to_value(&request)
        .map_err(|e| GatewayError::StatusCheck(format!("request serialization failed: {e}")))
}

pub fn status_url(merchant_link: &str) -> String {
    format!("{}{STATUS_PATH}", merchant_link.trim_end_matches('/'))
}

/// HTTP client for the status endpoint
#[derive(Clone)]
pub struct StatusClient {
    http: reqwest::Client,
}

impl StatusClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(STATUS_TIMEOUT).build()?;
        Ok(Self { http })
    }

    pub async fn check(
        &self,
        creds: &ActiveCredentials,
        merchant_ref: &MerchantRef,
    ) -> Result<PaymentStatusResponse> {
        let body = signed_body(creds, merchant_ref, chrono::Utc::now().timestamp())?;
        let url = status_url(&creds.merchant_link);

        tracing::debug!(merchant_ref = %merchant_ref, url = %url, "Checking AXS payment status");

        let text = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_response(&text)
    }
}

fn parse_response(text: &str) -> Result<PaymentStatusResponse> {
    serde_json::from_str(text)
        .map_err(|_| GatewayError::StatusCheck("Invalid response from AXS API".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axs_core::KeyMaterial;

    fn creds() -> ActiveCredentials {
        ActiveCredentials {
            merchant_link: "https://uat.axs.example/pay/".into(),
            key: KeyMaterial::new("client-1", "secret-1"),
            test_mode: true,
        }
    }

    // RFC 4231 test case 2
    #[test]
    fn test_sign_matches_rfc4231() {
        assert_eq!(
            sign(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_signed_body() {
        let body = signed_body(&creds(), &MerchantRef::Numeric(42), 1_700_000_000).unwrap();

        assert_eq!(body["clientId"], "client-1");
        assert_eq!(body["merchantRef"], 42);
        assert_eq!(body["timestamp"], 1_700_000_000);

        let expected = sign(
            b"secret-1",
            br#"{"clientId":"client-1","merchantRef":42,"timestamp":1700000000}"#,
        )
        .unwrap();
        assert_eq!(body["signature"], expected.as_str());
    }

    #[test]
    fn test_status_url() {
        assert_eq!(
            status_url(&creds().merchant_link),
            "https://uat.axs.example/pay/api/v1/payment/status"
        );
    }

    #[test]
    fn test_response_requires_status() {
        let ok = parse_response(r#"{"status":"SUCCESS","transactionRef":"T9"}"#).unwrap();
        assert_eq!(ok.status, PaymentStatus::Success);
        assert_eq!(ok.transaction_ref.as_deref(), Some("T9"));

        assert!(matches!(
            parse_response(r#"{"merchantRef":42}"#),
            Err(GatewayError::StatusCheck(_))
        ));
        assert!(parse_response("<html>").is_err());
    }
}
