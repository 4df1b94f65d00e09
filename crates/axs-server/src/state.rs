//! Application State

use std::sync::Arc;

use axs_gateway::{AxsCheckoutGateway, MemoryOrderStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// AXS Checkout gateway (settings, codec, status client)
    pub gateway: Arc<AxsCheckoutGateway<MemoryOrderStore>>,

    /// Order store shared with the gateway
    pub orders: Arc<MemoryOrderStore>,
}

impl AppState {
    pub fn new(gateway: AxsCheckoutGateway<MemoryOrderStore>) -> Self {
        let orders = gateway.store().clone();
        Self {
            gateway: Arc::new(gateway),
            orders,
        }
    }
}
