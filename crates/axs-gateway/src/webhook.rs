//! AXS Webhook Handling
//!
//! AXS calls the shop's webhook URL with the encrypted result in the `data`
//! query parameter. A verified payload moves the referenced order through its
//! lifecycle; anything that fails verification is rejected without touching
//! the store.

use serde::Serialize;
use std::sync::Arc;

use axs_core::{
    CallbackResult, PaymentParams, PaymentStatus, Rejection, TokenCodec, VerifiedToken,
    extract_token,
};

use crate::config::ActiveCredentials;
use crate::error::{GatewayError, Result};
use crate::order::{OrderStatus, OrderStore};

/// What a callback did
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CallbackOutcome {
    /// Status applied to the order
    Processed {
        order_id: u64,
        status: PaymentStatus,
        order_status: OrderStatus,
    },

    /// Verified payload without a status; nothing to apply
    Acknowledged { order_id: u64 },
}

/// Webhook handler
pub struct CallbackHandler<S: OrderStore> {
    store: Arc<S>,
    codec: TokenCodec,
}

impl<S: OrderStore> Clone for CallbackHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            codec: self.codec.clone(),
        }
    }
}

impl<S: OrderStore> CallbackHandler<S> {
    pub fn new(store: Arc<S>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    /// Extract and authenticate the token carried by `request_url`
    pub fn verify(&self, request_url: &str, creds: &ActiveCredentials) -> Result<VerifiedToken> {
        let token = extract_token(request_url).ok_or(GatewayError::MissingToken)?;

        match self.codec.decode(&token, &creds.key) {
            CallbackResult::Verified(verified) => Ok(verified),
            CallbackResult::Rejected(rejection) => Err(GatewayError::InvalidCallback(rejection)),
        }
    }

    /// Verify a callback and apply its status to the order
    pub fn handle(&self, request_url: &str, creds: &ActiveCredentials) -> Result<CallbackOutcome> {
        let verified = self.verify(request_url, creds)?;

        if verified.header.kid.as_deref() != Some(creds.client_id()) {
            tracing::debug!(kid = ?verified.header.kid, "Callback kid differs from configured client id");
        }

        self.apply(&verified.payload)
    }

    fn apply(&self, payload: &PaymentParams) -> Result<CallbackOutcome> {
        let order_id = payload.merchant_ref.as_order_id().ok_or_else(|| {
            GatewayError::InvalidCallback(Rejection {
                kind: axs_core::ErrorKind::PayloadFormat,
                message: "Invalid webhook data".into(),
            })
        })?;

        if self.store.get(order_id)?.is_none() {
            return Err(GatewayError::OrderNotFound(order_id.to_string()));
        }

        let Some(status) = payload.status.clone() else {
            tracing::info!(order_id, "Callback verified without a payment status");
            return Ok(CallbackOutcome::Acknowledged { order_id });
        };

        let amount = payload
            .amount
            .map_or_else(|| "N/A".to_string(), |a| a.to_string());
        let currency = payload.currency.as_deref().unwrap_or("N/A");
        let transaction_ref = payload.transaction_ref.as_deref().unwrap_or("");
        let transaction_label = if transaction_ref.is_empty() { "N/A" } else { transaction_ref };

        let order = self.store.update(order_id, &mut |order| match &status {
            PaymentStatus::Success => {
                order.payment_complete(transaction_ref);
                order.add_note(format!(
                    "AXS Checkout payment completed successfully. Amount: {amount} {currency}. Transaction ID: {transaction_label}"
                ));
            }
            PaymentStatus::Declined => {
                order.update_status(OrderStatus::Failed, "AXS Checkout payment failed.");
                order.add_note(format!(
                    "AXS Checkout payment failed. Amount: {amount} {currency}. Transaction ID: {transaction_label}"
                ));
            }
            PaymentStatus::Expired => {
                order.update_status(OrderStatus::Cancelled, "AXS Checkout payment was expired.");
                order.add_note(format!(
                    "AXS Checkout payment was expired by customer. Amount: {amount} {currency}. Transaction ID: {transaction_label}"
                ));
            }
            PaymentStatus::Other(other) => {
                order.add_note(format!("AXS Checkout payment status: {other}"));
            }
        })?;

        tracing::info!(
            order_id,
            status = %status,
            order_status = order.status.as_str(),
            "Processed AXS callback"
        );

        Ok(CallbackOutcome::Processed {
            order_id,
            status,
            order_status: order.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::MemoryOrderStore;
    use axs_core::{KeyMaterial, build_link};
    use rust_decimal_macros::dec;

    fn creds() -> ActiveCredentials {
        ActiveCredentials {
            merchant_link: "https://uat.axs.example/pay".into(),
            key: KeyMaterial::new("client-1", "shared-secret"),
            test_mode: true,
        }
    }

    fn setup() -> (Arc<MemoryOrderStore>, CallbackHandler<MemoryOrderStore>, TokenCodec) {
        let store = Arc::new(MemoryOrderStore::new());
        let codec = TokenCodec::new(10).unwrap();
        let handler = CallbackHandler::new(store.clone(), codec.clone());
        (store, handler, codec)
    }

    fn callback_url(codec: &TokenCodec, payload: &PaymentParams) -> String {
        let token = codec.encode(payload, &creds().key).unwrap();
        build_link("https://shop.example/wc-api/axs_checkout", &token)
            .unwrap()
            .into_string()
    }

    fn result_payload(order_id: u64, status: &str) -> PaymentParams {
        let mut payload = PaymentParams::new("client-1", 1050, "SGD", order_id);
        payload.status = Some(PaymentStatus::from(status.to_string()));
        payload.transaction_ref = Some("TXN-77".into());
        payload
    }

    #[test]
    fn test_success_completes_payment() {
        let (store, handler, codec) = setup();
        let order = store.create(dec!(10.50), "SGD", None).unwrap();

        let url = callback_url(&codec, &result_payload(order.id, "SUCCESS"));
        let outcome = handler.handle(&url, &creds()).unwrap();

        assert_eq!(
            outcome,
            CallbackOutcome::Processed {
                order_id: order.id,
                status: PaymentStatus::Success,
                order_status: OrderStatus::Processing,
            }
        );
        let stored = store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.transaction_ref.as_deref(), Some("TXN-77"));
        assert!(stored.notes[0].text.contains("Amount: 1050 SGD. Transaction ID: TXN-77"));
    }

    #[test]
    fn test_declined_and_expired_transitions() {
        let (store, handler, codec) = setup();
        let declined = store.create(dec!(1), "SGD", None).unwrap();
        let expired = store.create(dec!(1), "SGD", None).unwrap();

        handler
            .handle(&callback_url(&codec, &result_payload(declined.id, "DECLINED")), &creds())
            .unwrap();
        handler
            .handle(&callback_url(&codec, &result_payload(expired.id, "EXPIRED")), &creds())
            .unwrap();

        assert_eq!(store.get(declined.id).unwrap().unwrap().status, OrderStatus::Failed);
        assert_eq!(store.get(expired.id).unwrap().unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn test_unknown_status_only_adds_note() {
        let (store, handler, codec) = setup();
        let order = store.create(dec!(1), "SGD", None).unwrap();

        handler
            .handle(&callback_url(&codec, &result_payload(order.id, "PENDING_REVIEW")), &creds())
            .unwrap();

        let stored = store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.notes.last().unwrap().text, "AXS Checkout payment status: PENDING_REVIEW");
    }

    #[test]
    fn test_missing_status_is_acknowledged() {
        let (store, handler, codec) = setup();
        let order = store.create(dec!(1), "SGD", None).unwrap();
        let payload = PaymentParams::new("client-1", 100, "SGD", order.id);

        let outcome = handler.handle(&callback_url(&codec, &payload), &creds()).unwrap();
        assert_eq!(outcome, CallbackOutcome::Acknowledged { order_id: order.id });
    }

    #[test]
    fn test_rejections() {
        let (store, handler, codec) = setup();
        store.create(dec!(1), "SGD", None).unwrap();

        assert!(matches!(
            handler.handle("https://shop.example/wc-api/axs_checkout", &creds()),
            Err(GatewayError::MissingToken)
        ));
        assert!(matches!(
            handler.handle("https://shop.example/wc-api/axs_checkout?data=a.b.c.d.e", &creds()),
            Err(GatewayError::InvalidCallback(_))
        ));
        assert!(matches!(
            handler.handle(&callback_url(&codec, &result_payload(404, "SUCCESS")), &creds()),
            Err(GatewayError::OrderNotFound(_))
        ));

        let mut textual = result_payload(1, "SUCCESS");
        textual.merchant_ref = "ORD-X".into();
        assert!(matches!(
            handler.handle(&callback_url(&codec, &textual), &creds()),
            Err(GatewayError::InvalidCallback(_))
        ));
    }

    #[test]
    fn test_kid_mismatch_is_not_rejected() {
        let (store, handler, codec) = setup();
        let order = store.create(dec!(1), "SGD", None).unwrap();

        let token = codec
            .encode(
                &result_payload(order.id, "SUCCESS"),
                &KeyMaterial::new("some-other-client", "shared-secret"),
            )
            .unwrap();
        let url = format!("https://shop.example/wc-api/axs_checkout?data={token}");

        let verified = handler.verify(&url, &creds()).unwrap();
        assert_eq!(verified.header.kid.as_deref(), Some("some-other-client"));
        assert!(matches!(
            handler.handle(&url, &creds()).unwrap(),
            CallbackOutcome::Processed { .. }
        ));
    }

    #[test]
    fn test_callback_under_other_secret_is_rejected() {
        let (store, handler, codec) = setup();
        let order = store.create(dec!(1), "SGD", None).unwrap();

        let forged = codec
            .encode(
                &result_payload(order.id, "SUCCESS"),
                &KeyMaterial::new("client-1", "attacker-secret"),
            )
            .unwrap();
        let url = format!("https://shop.example/wc-api/axs_checkout?data={forged}");

        assert!(matches!(
            handler.handle(&url, &creds()),
            Err(GatewayError::InvalidCallback(_))
        ));
        assert_eq!(store.get(order.id).unwrap().unwrap().status, OrderStatus::Pending);
    }
}
