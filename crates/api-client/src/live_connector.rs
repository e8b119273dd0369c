use crate::error::ApiError;
use futures_util::stream::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

// --- Mark Price Stream Deserialization ---

/// A Mark Price update from the `<symbol>@markPrice@1s` stream.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkPriceUpdate {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub mark_price: Decimal,
}

#[derive(Debug, Deserialize)]
struct WsStreamWrapper<T> {
    #[allow(dead_code)]
    stream: String,
    data: T,
}

/// Handles connection to the Binance WebSocket API and manages the mark-price
/// stream subscription.
pub struct LiveConnector {
    base_url: Url,
}

impl LiveConnector {
    pub fn new(live_mode: bool) -> Self {
        let base_url = if live_mode {
            "wss://fstream.binance.com"
        } else {
            "wss://stream.binancefuture.com"
        };
        Self {
            base_url: Url::parse(base_url).expect("Failed to parse WebSocket base URL"),
        }
    }

    /// Subscribes to the Mark Price stream for a list of symbols.
    ///
    /// The returned channel keeps delivering updates across reconnects; the
    /// background task only exits once the receiver is dropped.
    pub fn subscribe_to_mark_prices(
        &self,
        symbols: &[String],
    ) -> Result<mpsc::Receiver<MarkPriceUpdate>, ApiError> {
        let (tx, rx) = mpsc::channel(1024);
        let streams = symbols
            .iter()
            .map(|s| format!("{}@markPrice@1s", s.to_lowercase()))
            .collect::<Vec<_>>()
            .join("/");

        let mut url = self.base_url.clone();
        url.set_path("/stream");
        url.set_query(Some(&format!("streams={}", streams)));

        tokio::spawn(async move {
            loop {
                match connect_async(url.as_str()).await {
                    Ok((mut stream, _)) => {
                        tracing::info!("[WS-MarkPrice] Connection established.");
                        while let Some(msg) = stream.next().await {
                            match msg {
                                Ok(Message::Text(text)) => {
                                    match serde_json::from_str::<WsStreamWrapper<MarkPriceUpdate>>(
                                        &text,
                                    ) {
                                        Ok(wrapper) => {
                                            if tx.send(wrapper.data).await.is_err() {
                                                // Receiver gone; the feed has no consumer left.
                                                return;
                                            }
                                        }
                                        Err(e) => {
                                            tracing::warn!(
                                                "[WS-MarkPrice] Unparseable message: {}",
                                                e
                                            );
                                        }
                                    }
                                }
                                Ok(Message::Close(frame)) => {
                                    tracing::info!("[WS-MarkPrice] Stream closed: {:?}", frame);
                                    break;
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    tracing::error!(error = %e, "[WS-MarkPrice] Message error.");
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "[WS-MarkPrice] Connection error.");
                    }
                }
                tracing::warn!("[WS-MarkPrice] Disconnected. Reconnecting in 5s...");
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
            }
        });

        Ok(rx)
    }
}
