use crate::enums::{OrderSide, OrderStatus, OrderType, TimeInForce};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A fully-validated, exchange-compliant order request.
///
/// Instances are produced by the input validator and consumed exactly once by
/// the dispatcher. The `client_order_id` acts as the idempotency token: a
/// retried submission carries the same id so the exchange (or a follow-up
/// query) can recognise a duplicate of a prior attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Limit price. Present only for `Limit` and `StopLimit` orders.
    pub price: Option<Decimal>,
    /// Stop trigger price. Present only for `StopMarket` and `StopLimit` orders.
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub client_order_id: Uuid,
}

/// The read-only mirror of an order as confirmed by the exchange.
///
/// The exchange owns this state; the local cache overwrites its copy
/// wholesale on each refresh, last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: i64,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Decimal,
    pub stop_price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    pub avg_price: Decimal,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub update_time: DateTime<Utc>,
}

/// An open position as reported by the exchange.
///
/// `position_amt` is signed: positive is long, negative is short, zero is
/// flat. A close must submit the opposite side with `position_amt.abs()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub symbol: String,
    pub position_amt: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_profit: Decimal,
    pub leverage: u32,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.position_amt.is_zero()
    }
}

/// Account-level balance snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub total_wallet_balance: Decimal,
    pub available_balance: Decimal,
    pub total_unrealized_profit: Decimal,
}

/// The latest observed price for a symbol.
///
/// Quotes arrive from a streaming feed that has no ordering relationship with
/// the poll-driven balance/position/order snapshots. Consumers must not assume
/// a quote and a position snapshot are mutually consistent in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}
