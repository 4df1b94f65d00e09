//! Order Management
//!
//! The gateway only needs a narrow view of the shop's orders: totals and
//! currency for checkout, and status transitions for webhooks.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{GatewayError, Result};

/// Order lifecycle states the gateway can move an order through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether payment has been confirmed for the order
    pub fn is_paid(&self) -> bool {
        matches!(self, OrderStatus::Processing | OrderStatus::Completed)
    }
}

/// Timestamped order note
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderNote {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A shop order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,

    /// Order total in major currency units
    pub total: Decimal,

    /// ISO 4217 code
    pub currency: String,

    /// Where the customer returns after paying (defaults to the order-received page)
    #[serde(default)]
    pub return_url: Option<String>,

    pub status: OrderStatus,

    /// Provider transaction reference once paid
    #[serde(default)]
    pub transaction_ref: Option<String>,

    #[serde(default)]
    pub payment_method_title: Option<String>,

    #[serde(default)]
    pub meta: HashMap<String, String>,

    #[serde(default)]
    pub notes: Vec<OrderNote>,

    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: u64, total: Decimal, currency: impl Into<String>) -> Self {
        Self {
            id,
            total,
            currency: currency.into().to_uppercase(),
            return_url: None,
            status: OrderStatus::Pending,
            transaction_ref: None,
            payment_method_title: None,
            meta: HashMap::new(),
            notes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Total in minor units (cents), rounded half away from zero
    pub fn amount_minor(&self) -> Result<u64> {
        if self.total.is_sign_negative() && !self.total.is_zero() {
            return Err(GatewayError::Config(format!(
                "order {} has a negative total",
                self.id
            )));
        }
        (self.total * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u64()
            .ok_or_else(|| GatewayError::Config(format!("order {} total is out of range", self.id)))
    }

    pub fn add_note(&mut self, text: impl Into<String>) {
        self.notes.push(OrderNote {
            text: text.into(),
            created_at: Utc::now(),
        });
    }

    /// Mark the order paid
    pub fn payment_complete(&mut self, transaction_ref: &str) {
        self.status = OrderStatus::Processing;
        if !transaction_ref.is_empty() {
            self.transaction_ref = Some(transaction_ref.to_string());
        }
    }

    pub fn update_status(&mut self, status: OrderStatus, note: &str) {
        self.status = status;
        if !note.is_empty() {
            self.add_note(note);
        }
    }
}

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Create a new pending order with the next id
    fn create(&self, total: Decimal, currency: &str, return_url: Option<String>) -> Result<Order>;

    /// Save or update an order
    fn save(&self, order: &Order) -> Result<()>;

    /// Get order by id
    fn get(&self, id: u64) -> Result<Option<Order>>;

    /// Apply a change to a stored order atomically
    fn update(&self, id: u64, apply: &mut dyn FnMut(&mut Order)) -> Result<Order>;
}

/// In-memory order store (for development)
pub struct MemoryOrderStore {
    orders: RwLock<HashMap<u64, Order>>,
    next_id: AtomicU64,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E>(_: E) -> GatewayError {
    GatewayError::Storage("order store lock poisoned".into())
}

impl OrderStore for MemoryOrderStore {
    fn create(&self, total: Decimal, currency: &str, return_url: Option<String>) -> Result<Order> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut order = Order::new(id, total, currency);
        order.return_url = return_url;
        self.save(&order)?;
        Ok(order)
    }

    fn save(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        orders.insert(order.id, order.clone());
        Ok(())
    }

    fn get(&self, id: u64) -> Result<Option<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders.get(&id).cloned())
    }

    fn update(&self, id: u64, apply: &mut dyn FnMut(&mut Order)) -> Result<Order> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| GatewayError::OrderNotFound(id.to_string()))?;
        apply(order);
        Ok(order.clone())
    }
}
