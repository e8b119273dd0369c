use core_types::PriceQuote;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A low-latency price tick for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Decimal,
}

impl From<PriceQuote> for PriceUpdate {
    fn from(quote: PriceQuote) -> Self {
        Self {
            symbol: quote.symbol,
            price: quote.price,
        }
    }
}

/// The top-level WebSocket message enum.
///
/// The `#[serde(tag = "type", content = "payload")]` attribute serializes each
/// variant into a clean JSON object that is easy for the frontend to switch
/// on. A price tick looks like:
/// `{"type": "price_update", "payload": {"symbol": "BTCUSDT", "price": "61000.1"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum WsMessage {
    /// A real-time price tick from the streaming feed.
    PriceUpdate(PriceUpdate),
    /// Confirms to a new client that its WebSocket connection is active.
    Connected,
}
