use chrono::{DateTime, Utc};
use kiosk_common::Won;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub menu_id: u64,
    pub menu_name: String,
    pub quantity: u32,
    /// Unit price at the time the order was placed
    pub price: Won,
}

impl OrderLine {
    pub fn subtotal(&self) -> Won {
        Won::from(self.price.value() * i64::from(self.quantity))
    }
}

/// An immutable copy of an order as it was when the event was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub id: u64,
    pub total_price: Won,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, rename = "order_items")]
    pub items: Vec<OrderLine>,
}

impl OrderSnapshot {
    /// Builds a snapshot whose total is the sum of its lines.
    pub fn from_lines(id: u64, items: Vec<OrderLine>, created_at: DateTime<Utc>) -> Self {
        let total_price = items.iter().map(OrderLine::subtotal).sum();
        Self { id, total_price, created_at, updated_at: created_at, items }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    #[serde(flatten)]
    pub order: OrderSnapshot,
}

impl OrderEvent {
    pub fn created(order: OrderSnapshot) -> Self {
        Self { kind: OrderEventKind::Created, order }
    }

    pub fn updated(order: OrderSnapshot) -> Self {
        Self { kind: OrderEventKind::Updated, order }
    }
}
