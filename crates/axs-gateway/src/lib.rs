//! # axs-gateway
//!
//! AXS Checkout payment gateway for a web shop.
//!
//! ## Flow
//!
//! ```text
//! ┌─────────────┐  redirect   ┌─────────────────┐  redirect   ┌─────────────┐
//! │  Shop       │───────────▶│  AXS Checkout    │───────────▶│  Shop       │
//! │  (order)    │  ?data=jwe  │  Hosted Page     │             │  (received) │
//! └─────────────┘             └─────────────────┘             └─────────────┘
//!                                     │
//!                                     │ webhook ?data=jwe
//!                                     ▼
//!                             ┌─────────────────┐
//!                             │  /wc-api/       │
//!                             │  axs_checkout   │
//!                             └─────────────────┘
//! ```
//!
//! Checkout turns an order into an encrypted payment link; the webhook
//! verifies the token AXS sends back and moves the order to its final state.
//! Test and live credentials live side by side in [`GatewaySettings`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axs_gateway::{AxsCheckoutGateway, GatewaySettings, MemoryOrderStore, PaymentGateway};
//!
//! let store = Arc::new(MemoryOrderStore::new());
//! let gateway = AxsCheckoutGateway::from_settings(GatewaySettings::from_env()?, store.clone())?;
//!
//! let order = store.create(dec!(10.50), "SGD", None)?;
//! let redirect = gateway.initiate_payment(order.id).await?;
//!
//! // Redirect customer to: redirect.redirect
//! ```

mod config;
mod error;
mod gateway;
mod order;
mod status;
mod webhook;

pub use config::{
    ActiveCredentials, DEFAULT_PAYMENT_EXPIRY_SECS, GatewaySettings, ModeCredentials,
    SettingsSummary,
};
pub use error::{GatewayError, Result};
pub use gateway::{
    AxsCheckoutGateway, GATEWAY_ID, GATEWAY_TITLE, PAYMENT_LINK_META, PaymentFields,
    PaymentGateway, PaymentRedirect,
};
pub use order::{MemoryOrderStore, Order, OrderNote, OrderStatus, OrderStore};
pub use status::{PaymentStatusResponse, StatusClient};
pub use webhook::{CallbackHandler, CallbackOutcome};
