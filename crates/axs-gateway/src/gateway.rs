//! Payment Gateway
//!
//! Redirect-style checkout: the shop never sees card data. An order is turned
//! into an encrypted payment link, the customer pays on the AXS page, and the
//! result comes back through the webhook.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use axs_core::{MerchantRef, PaymentParams, TokenCodec, build_link};

use crate::config::GatewaySettings;
use crate::error::{GatewayError, Result};
use crate::order::OrderStore;
use crate::status::{PaymentStatusResponse, StatusClient};
use crate::webhook::{CallbackHandler, CallbackOutcome};

fn task_failed(e: tokio::task::JoinError) -> GatewayError {
    GatewayError::Task(e.to_string())
}

pub const GATEWAY_ID: &str = "axs_checkout";
pub const GATEWAY_TITLE: &str = "AXS Checkout";

/// Order meta key holding the last generated payment link
pub const PAYMENT_LINK_META: &str = "_axs_payment_link";

const DESCRIPTION: &str = "Secure and seamless online payments";
const UNAVAILABLE_NOTICE: &str = "AXS Checkout is currently unavailable. Please try again later.";
const TEST_MODE_NOTICE: &str =
    "AXS Checkout is currently in test mode. You can use test credentials to make test payments.";

/// What the checkout page shows for this payment method
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFields {
    pub available: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub notices: Vec<String>,
}

/// Where to send the customer after placing the order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRedirect {
    pub result: String,
    pub redirect: String,
}

/// Payment gateway trait
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Stable gateway identifier
    fn id(&self) -> &str;

    /// Name shown to customers
    fn title(&self) -> &str;

    /// Check the gateway is enabled and the active mode has credentials
    fn validate_configuration(&self) -> Result<()>;

    fn payment_fields(&self) -> PaymentFields;

    /// Build the redirect for an order
    async fn initiate_payment(&self, order_id: u64) -> Result<PaymentRedirect>;

    /// Verify a webhook request URL and apply the result
    async fn handle_callback(&self, request_url: &str) -> Result<CallbackOutcome>;
}

/// AXS Checkout gateway
pub struct AxsCheckoutGateway<S: OrderStore> {
    settings: GatewaySettings,
    codec: TokenCodec,
    store: Arc<S>,
    callbacks: CallbackHandler<S>,
    status: Option<StatusClient>,
}

impl<S: OrderStore> AxsCheckoutGateway<S> {
    pub fn new(settings: GatewaySettings, codec: TokenCodec, store: Arc<S>) -> Self {
        let callbacks = CallbackHandler::new(store.clone(), codec.clone());
        Self {
            settings,
            codec,
            store,
            callbacks,
            status: None,
        }
    }

    /// Build with the codec described by the settings
    pub fn from_settings(settings: GatewaySettings, store: Arc<S>) -> Result<Self> {
        let codec = settings.codec()?;
        Ok(Self::new(settings, codec, store))
    }

    /// Enable payment status checks
    pub fn with_status_client(mut self, client: StatusClient) -> Self {
        self.status = Some(client);
        self
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Ask AXS for the current payment state of an order
    pub async fn check_payment_status(&self, order_id: u64) -> Result<PaymentStatusResponse> {
        let client = self
            .status
            .as_ref()
            .ok_or_else(|| GatewayError::StatusCheck("status checks are not configured".into()))?;
        let creds = self.settings.active_credentials()?;

        if self.store.get(order_id)?.is_none() {
            return Err(GatewayError::OrderNotFound(order_id.to_string()));
        }

        client.check(&creds, &MerchantRef::Numeric(order_id)).await
    }
}

#[async_trait]
impl<S: OrderStore + 'static> PaymentGateway for AxsCheckoutGateway<S> {
    fn id(&self) -> &str {
        GATEWAY_ID
    }

    fn title(&self) -> &str {
        GATEWAY_TITLE
    }

    fn validate_configuration(&self) -> Result<()> {
        if !self.settings.enabled {
            return Err(GatewayError::Config("AXS Checkout is disabled".into()));
        }
        self.settings.active_credentials().map(|_| ())
    }

    fn payment_fields(&self) -> PaymentFields {
        if !self.settings.enabled {
            return PaymentFields {
                available: false,
                description: None,
                notices: vec![UNAVAILABLE_NOTICE.to_string()],
            };
        }

        let mut notices = Vec::new();
        if self.settings.test_mode {
            notices.push(TEST_MODE_NOTICE.to_string());
        }

        PaymentFields {
            available: true,
            description: Some(DESCRIPTION.to_string()),
            notices,
        }
    }

    async fn initiate_payment(&self, order_id: u64) -> Result<PaymentRedirect> {
        self.validate_configuration()?;
        let creds = self.settings.active_credentials()?;

        let order = self
            .store
            .get(order_id)?
            .ok_or_else(|| GatewayError::OrderNotFound(order_id.to_string()))?;

        let return_url = order
            .return_url
            .clone()
            .unwrap_or_else(|| self.settings.order_received_url(order.id));

        let amount = order.amount_minor()?;
        let params = PaymentParams::new(
            creds.client_id(),
            amount,
            order.currency.clone(),
            order.id,
        )
        .with_success_url(return_url.clone())
        .with_fail_url(return_url)
        .with_webhook_url(self.settings.webhook_url())
        .with_expiry(self.settings.payment_expiry_secs);

        // PBKDF2 is CPU-bound; keep it off the async workers
        let codec = self.codec.clone();
        let key = creds.key.clone();
        let token = tokio::task::spawn_blocking(move || codec.encode(&params, &key))
            .await
            .map_err(task_failed)??;
        let link = build_link(&creds.merchant_link, &token)?;

        self.store.update(order.id, &mut |order| {
            order
                .meta
                .insert(PAYMENT_LINK_META.to_string(), link.as_str().to_string());
            order.payment_method_title = Some(GATEWAY_TITLE.to_string());
        })?;

        tracing::info!(
            order_id = order.id,
            test_mode = creds.test_mode,
            amount,
            currency = %order.currency,
            "Created AXS payment link"
        );

        Ok(PaymentRedirect {
            result: "success".into(),
            redirect: link.into_string(),
        })
    }

    async fn handle_callback(&self, request_url: &str) -> Result<CallbackOutcome> {
        let creds = self.settings.active_credentials()?;
        let callbacks = self.callbacks.clone();
        let request_url = request_url.to_string();

        tokio::task::spawn_blocking(move || callbacks.handle(&request_url, &creds))
            .await
            .map_err(task_failed)?
            .inspect_err(|e| {
                if e.is_client_error() {
                    tracing::warn!(error = %e, "Rejected AXS callback");
                } else {
                    tracing::error!(error = %e, "AXS callback processing failed");
                }
            })
    }
}
