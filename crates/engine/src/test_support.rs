//! A scriptable mock of the exchange adapter for engine tests.
//!
//! Responses are queued per endpoint; when a queue is empty the mock answers
//! with a benign default so tests only script what they assert on. Every
//! call is counted, which is how the retry and no-op properties are checked.

use api_client::error::ApiError;
use api_client::ApiClient;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{
    Balance, Order, OrderRequest, OrderSide, OrderStatus, OrderType, Position, PriceQuote,
    TimeInForce,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn http_error(status: u16, code: i64, msg: &str) -> ApiError {
    ApiError::Http {
        status,
        code,
        msg: msg.to_string(),
    }
}

pub fn sample_balance() -> Balance {
    Balance {
        total_wallet_balance: dec!(1000),
        available_balance: dec!(900),
        total_unrealized_profit: dec!(10),
    }
}

pub fn sample_position(symbol: &str, position_amt: Decimal) -> Position {
    Position {
        symbol: symbol.to_string(),
        position_amt,
        entry_price: dec!(60000),
        mark_price: dec!(60500),
        unrealized_profit: dec!(5),
        leverage: 10,
    }
}

pub fn sample_request() -> OrderRequest {
    OrderRequest {
        symbol: "BTCUSDT".to_string(),
        side: OrderSide::Buy,
        order_type: OrderType::Market,
        quantity: dec!(0.001),
        price: None,
        stop_price: None,
        time_in_force: TimeInForce::default(),
        reduce_only: false,
        client_order_id: Uuid::new_v4(),
    }
}

#[derive(Default)]
pub struct MockApiClient {
    balance: Mutex<Option<Balance>>,
    positions: Mutex<Vec<Position>>,
    orders: Mutex<Vec<Order>>,
    pub fail_positions: AtomicBool,

    place_results: Mutex<VecDeque<Result<Order, ApiError>>>,
    query_results: Mutex<VecDeque<Result<Option<Order>, ApiError>>>,
    cancel_results: Mutex<VecDeque<Result<Order, ApiError>>>,

    pub place_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub leverage_calls: AtomicUsize,
    pub price_calls: AtomicUsize,
    pub last_order: Mutex<Option<OrderRequest>>,
}

impl MockApiClient {
    pub fn push_place_result(&self, result: Result<Order, ApiError>) {
        self.place_results.lock().unwrap().push_back(result);
    }

    pub fn push_query_result(&self, result: Result<Option<Order>, ApiError>) {
        self.query_results.lock().unwrap().push_back(result);
    }

    pub fn push_cancel_result(&self, result: Result<Order, ApiError>) {
        self.cancel_results.lock().unwrap().push_back(result);
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        *self.positions.lock().unwrap() = positions;
    }

    /// The confirmed order the exchange would return for `request`.
    pub fn order_for(&self, request: &OrderRequest) -> Order {
        Order {
            order_id: 42,
            client_order_id: request.client_order_id.to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            status: OrderStatus::New,
            price: request.price.unwrap_or_default(),
            stop_price: request.stop_price.unwrap_or_default(),
            orig_qty: request.quantity,
            executed_qty: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            time_in_force: request.time_in_force,
            reduce_only: request.reduce_only,
            update_time: Utc::now(),
        }
    }
}

#[async_trait]
impl ApiClient for MockApiClient {
    async fn get_account(&self) -> Result<Balance, ApiError> {
        Ok(self
            .balance
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(sample_balance))
    }

    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        self.price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price: dec!(60000),
            observed_at: Utc::now(),
        })
    }

    async fn get_positions(&self) -> Result<Vec<Position>, ApiError> {
        if self.fail_positions.load(Ordering::SeqCst) {
            return Err(http_error(500, 0, "Internal error"));
        }
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn get_open_orders(&self) -> Result<Vec<Order>, ApiError> {
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<Order, ApiError> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_order.lock().unwrap() = Some(order.clone());
        match self.place_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.order_for(order)),
        }
    }

    async fn query_order(
        &self,
        _symbol: &str,
        _client_order_id: Uuid,
    ) -> Result<Option<Order>, ApiError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        match self.query_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(None),
        }
    }

    async fn cancel_order(&self, _symbol: &str, _order_id: i64) -> Result<Order, ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        match self.cancel_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(self.order_for(&sample_request())),
        }
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: u8) -> Result<(), ApiError> {
        self.leverage_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
