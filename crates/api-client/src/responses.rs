use chrono::{TimeZone, Utc};
use core_types::{Balance, Order, OrderSide, OrderStatus, OrderType, Position, TimeInForce};
use rust_decimal::Decimal;
use serde::Deserialize;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The response from `POST`/`GET`/`DELETE /fapi/v1/order`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: i64,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub price: Decimal,
    #[serde(default)]
    pub stop_price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    #[serde(default)]
    pub avg_price: Decimal,
    pub time_in_force: TimeInForce,
    #[serde(default)]
    pub reduce_only: bool,
    pub update_time: i64,
    // There are more fields, but these are the ones the engine consumes.
}

impl From<OrderResponse> for Order {
    fn from(r: OrderResponse) -> Self {
        Order {
            order_id: r.order_id,
            client_order_id: r.client_order_id,
            symbol: r.symbol,
            side: r.side,
            order_type: r.order_type,
            status: r.status,
            price: r.price,
            stop_price: r.stop_price,
            orig_qty: r.orig_qty,
            executed_qty: r.executed_qty,
            avg_price: r.avg_price,
            time_in_force: r.time_in_force,
            reduce_only: r.reduce_only,
            update_time: Utc
                .timestamp_millis_opt(r.update_time)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}

/// The account summary from `GET /fapi/v2/account`. Only the wallet-level
/// totals are mapped; per-asset detail is not part of the caller surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub total_wallet_balance: Decimal,
    pub available_balance: Decimal,
    pub total_unrealized_profit: Decimal,
}

impl From<AccountResponse> for Balance {
    fn from(r: AccountResponse) -> Self {
        Balance {
            total_wallet_balance: r.total_wallet_balance,
            available_balance: r.available_balance,
            total_unrealized_profit: r.total_unrealized_profit,
        }
    }
}

/// A single entry from `GET /fapi/v2/positionRisk`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub symbol: String,
    pub position_amt: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub un_realized_profit: Decimal,
    /// Comes as a string, e.g. "10".
    #[serde(deserialize_with = "de_leverage")]
    pub leverage: u32,
}

fn de_leverage<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl From<PositionResponse> for Position {
    fn from(r: PositionResponse) -> Self {
        Position {
            symbol: r.symbol,
            position_amt: r.position_amt,
            entry_price: r.entry_price,
            mark_price: r.mark_price,
            unrealized_profit: r.un_realized_profit,
            leverage: r.leverage,
        }
    }
}

/// The response from `GET /fapi/v1/ticker/price`.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceTickerResponse {
    pub symbol: String,
    pub price: Decimal,
}

/// Represents an error response body from the Binance API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSITION_JSON: &str = r#"{
        "symbol": "BTCUSDT",
        "positionAmt": "-0.5",
        "entryPrice": "60000.0",
        "markPrice": "60500.0",
        "unRealizedProfit": "-250.0",
        "leverage": "10"
    }"#;

    #[test]
    fn position_response_parses_the_string_leverage() {
        let parsed: PositionResponse = serde_json::from_str(POSITION_JSON).unwrap();
        let position: Position = parsed.into();
        assert_eq!(position.leverage, 10);
        assert!(!position.is_flat());
    }

    #[test]
    fn malformed_leverage_is_a_deserialization_failure() {
        let body = POSITION_JSON.replace("\"10\"", "\"ten\"");
        assert!(serde_json::from_str::<PositionResponse>(&body).is_err());
    }
}
