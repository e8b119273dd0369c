use crate::{error::AppError, AppState};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
    Json,
};
use core_types::OrderType;
use engine::{CloseOutcome, ErrorKind, TradeError};
use events::WsMessage;
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;
use validator::RawOrderFields;

fn envelope<T: serde::Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// # GET /api/balance
pub async fn get_balance(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let balance = state.service.balance().await?;
    Ok(envelope(balance))
}

/// # GET /api/price/:symbol
pub async fn get_price(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let quote = state.service.price(&symbol).await?;
    Ok(envelope(json!({ "symbol": quote.symbol, "price": quote.price })))
}

/// # GET /api/positions
pub async fn get_positions(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let positions = state.service.positions().await?;
    Ok(envelope(positions))
}

/// # GET /api/orders
pub async fn get_orders(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let orders = state.service.orders().await?;
    Ok(envelope(orders))
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderBody {
    /// MARKET, LIMIT, STOP_MARKET or STOP_LIMIT.
    #[serde(rename = "type")]
    pub order_type: String,
    #[serde(flatten)]
    pub fields: RawOrderFields,
}

/// # POST /api/order
///
/// One route for all order types: the `type` field selects the validation
/// rules, so adding an order type never means adding a handler.
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PlaceOrderBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let order_type = OrderType::from_str(&body.order_type).map_err(|_| {
        TradeError::new(
            ErrorKind::Validation,
            "type: must be MARKET, LIMIT, STOP_MARKET or STOP_LIMIT",
        )
    })?;
    let order = state.service.place_order(&body.fields, order_type).await?;
    Ok(envelope(order))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelParams {
    pub symbol: String,
    pub order_id: i64,
}

/// # DELETE /api/order?symbol=BTCUSDT&orderId=42
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    params: Result<Query<CancelParams>, QueryRejection>,
) -> Result<Json<Value>, AppError> {
    let Query(params) = params?;
    let ack = state
        .service
        .cancel_order(&params.symbol, params.order_id)
        .await?;
    Ok(envelope(ack))
}

#[derive(Debug, Deserialize)]
pub struct ClosePositionBody {
    pub symbol: String,
}

/// # POST /api/close-position
pub async fn close_position(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ClosePositionBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    match state.service.close_position(&body.symbol).await? {
        CloseOutcome::Closed(order) => Ok(envelope(order)),
        CloseOutcome::AlreadyFlat => Ok(envelope(json!({
            "symbol": body.symbol.to_uppercase(),
            "status": "NO_POSITION",
        }))),
    }
}

#[derive(Debug, Deserialize)]
pub struct LeverageBody {
    pub symbol: String,
    pub leverage: i64,
}

/// # POST /api/leverage
pub async fn set_leverage(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LeverageBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(body) = body?;
    let leverage = state
        .service
        .set_leverage(&body.symbol, body.leverage)
        .await?;
    Ok(envelope(json!({
        "message": format!("Leverage set to {}x for {}", leverage, body.symbol.to_uppercase()),
    })))
}

/// # GET /ws
///
/// The push channel: every mark-price tick from the feed is forwarded as a
/// `price_update` message, giving subscribers lower latency than the poll
/// interval.
pub async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("[WS] New client connected.");
    let mut price_rx = state.service.subscribe_prices();

    let hello = serde_json::to_string(&WsMessage::Connected).expect("static message serializes");
    if socket.send(Message::Text(hello)).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            quote = price_rx.recv() => {
                match quote {
                    Ok(quote) => {
                        let msg = WsMessage::PriceUpdate(quote.into());
                        let text = match serde_json::to_string(&msg) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!(error = %e, "[WS] Failed to serialize price update.");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    // A slow client skipped some ticks; keep going with the latest.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("[WS] Client disconnected.");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "[WS] Error.");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
    tracing::info!("[WS] Connection closed.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::error::ApiError;
    use api_client::ApiClient;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use chrono::Utc;
    use configuration::settings::{DispatchSettings, SyncSettings};
    use core_types::{Balance, Order, OrderRequest, OrderStatus, Position, PriceQuote};
    use engine::TradingService;
    use rust_decimal::Decimal;
    use tower::ServiceExt;
    use uuid::Uuid;

    /// An exchange stub that acknowledges whatever reaches it; these tests
    /// assert on the transport layer, not on dispatch behaviour.
    struct StubExchange;

    #[async_trait]
    impl ApiClient for StubExchange {
        async fn get_account(&self) -> Result<Balance, ApiError> {
            Err(ApiError::Deserialization("unused".into()))
        }

        async fn get_price(&self, _symbol: &str) -> Result<PriceQuote, ApiError> {
            Err(ApiError::Deserialization("unused".into()))
        }

        async fn get_positions(&self) -> Result<Vec<Position>, ApiError> {
            Ok(Vec::new())
        }

        async fn get_open_orders(&self) -> Result<Vec<Order>, ApiError> {
            Ok(Vec::new())
        }

        async fn place_order(&self, order: &OrderRequest) -> Result<Order, ApiError> {
            Ok(Order {
                order_id: 7,
                client_order_id: order.client_order_id.to_string(),
                symbol: order.symbol.clone(),
                side: order.side,
                order_type: order.order_type,
                status: OrderStatus::New,
                price: order.price.unwrap_or_default(),
                stop_price: order.stop_price.unwrap_or_default(),
                orig_qty: order.quantity,
                executed_qty: Decimal::ZERO,
                avg_price: Decimal::ZERO,
                time_in_force: order.time_in_force,
                reduce_only: order.reduce_only,
                update_time: Utc::now(),
            })
        }

        async fn query_order(
            &self,
            _symbol: &str,
            _client_order_id: Uuid,
        ) -> Result<Option<Order>, ApiError> {
            Ok(None)
        }

        async fn cancel_order(&self, _symbol: &str, _order_id: i64) -> Result<Order, ApiError> {
            Err(ApiError::Deserialization("unused".into()))
        }

        async fn set_leverage(&self, _symbol: &str, _leverage: u8) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn order_router() -> Router {
        let service = Arc::new(TradingService::new(
            Arc::new(StubExchange),
            &DispatchSettings::default(),
            &SyncSettings::default(),
        ));
        Router::new()
            .route("/api/order", post(place_order).delete(cancel_order))
            .with_state(Arc::new(AppState { service }))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn malformed_order_body_renders_the_error_envelope() {
        let response = order_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/order")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn numeric_json_order_fields_are_accepted() {
        let response = order_router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/order")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"type": "MARKET", "symbol": "BTCUSDT", "side": "BUY", "quantity": 0.001}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["origQty"], "0.001");
    }

    #[tokio::test]
    async fn malformed_cancel_query_renders_the_error_envelope() {
        let response = order_router()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/order?symbol=BTCUSDT&orderId=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }
}
