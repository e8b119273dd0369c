//! Owns the per-order submission protocol: retry policy for transient
//! failures, idempotent resubmission, idempotent cancel, and the
//! close-position path.
//!
//! The dispatcher never writes the account cache. A successful submission is
//! picked up by the next synchronizer poll, which keeps cache writes
//! single-writer.

use crate::error::{ErrorKind, TradeError};
use crate::normalizer::normalize;
use api_client::ApiClient;
use configuration::settings::DispatchSettings;
use core_types::{Order, OrderRequest, OrderType, Position, TimeInForce};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Retry behaviour for transient submission failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempt ceiling, including the first try.
    pub max_attempts: u32,
    /// Backoff base; doubles on each subsequent retry.
    pub base_delay: Duration,
}

impl From<&DispatchSettings> for RetryPolicy {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
        }
    }
}

/// Acknowledgement of a cancel request.
///
/// `already_closed` marks the idempotent no-op case: the exchange no longer
/// knew the order, so the caller's intent was already satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelAck {
    pub symbol: String,
    pub order_id: i64,
    pub already_closed: bool,
}

/// The result of a close-position request.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    /// There was nothing to close; the desired end state already held.
    AlreadyFlat,
    /// A reduce-only market order was submitted and acknowledged.
    Closed(Order),
}

pub struct Dispatcher {
    api_client: Arc<dyn ApiClient>,
    retry: RetryPolicy,
}

impl Dispatcher {
    pub fn new(api_client: Arc<dyn ApiClient>, retry: RetryPolicy) -> Self {
        Self { api_client, retry }
    }

    /// Submits a validated order, retrying transient failures with
    /// exponential backoff up to the configured ceiling.
    ///
    /// The request's client order id is the idempotency token: before every
    /// resubmission the exchange is probed by that id, so an attempt that
    /// actually landed upstream is recognised and returned rather than
    /// duplicated.
    pub async fn submit(&self, order: &OrderRequest) -> Result<Order, TradeError> {
        let mut attempt = 0u32;
        loop {
            match self.api_client.place_order(order).await {
                Ok(confirmed) => {
                    tracing::info!(
                        symbol = %confirmed.symbol,
                        order_id = confirmed.order_id,
                        status = ?confirmed.status,
                        "Order acknowledged by exchange."
                    );
                    return Ok(confirmed);
                }
                Err(api_err) => {
                    let err = normalize(api_err);
                    attempt += 1;
                    if !err.retryable() || attempt >= self.retry.max_attempts {
                        tracing::warn!(
                            symbol = %order.symbol,
                            kind = %err.kind,
                            attempt,
                            "Order submission failed."
                        );
                        return Err(err);
                    }

                    let delay = self.retry.base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        symbol = %order.symbol,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure; backing off before retry."
                    );
                    tokio::time::sleep(delay).await;

                    // The failed attempt may still have reached the exchange.
                    match self
                        .api_client
                        .query_order(&order.symbol, order.client_order_id)
                        .await
                    {
                        Ok(Some(existing)) => {
                            tracing::info!(
                                symbol = %existing.symbol,
                                order_id = existing.order_id,
                                "Prior attempt landed upstream; not resubmitting."
                            );
                            return Ok(existing);
                        }
                        Ok(None) => {}
                        Err(probe_err) => {
                            tracing::warn!(
                                error = %probe_err,
                                "Idempotency probe failed; resubmitting with same client order id."
                            );
                        }
                    }
                }
            }
        }
    }

    /// Cancels an open order. "Order not found" is a success no-op: the
    /// order is already filled or canceled, which is what the caller wanted.
    pub async fn cancel(&self, symbol: &str, order_id: i64) -> Result<CancelAck, TradeError> {
        match self.api_client.cancel_order(symbol, order_id).await {
            Ok(_) => {
                tracing::info!(symbol, order_id, "Order canceled.");
                Ok(CancelAck {
                    symbol: symbol.to_string(),
                    order_id,
                    already_closed: false,
                })
            }
            Err(api_err) => {
                let err = normalize(api_err);
                if err.kind == ErrorKind::NotFound {
                    tracing::info!(symbol, order_id, "Order already gone; cancel is a no-op.");
                    Ok(CancelAck {
                        symbol: symbol.to_string(),
                        order_id,
                        already_closed: true,
                    })
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Closes the given position with a reduce-only market order.
    ///
    /// The position comes from the cache and may be stale; the reduce-only
    /// flag is the correctness backstop, since the exchange alone decides
    /// whether the close fully flattens the position.
    pub async fn close(&self, position: Option<Position>) -> Result<CloseOutcome, TradeError> {
        let Some(order) = position.as_ref().and_then(build_close_order) else {
            tracing::info!("No open position; close is a no-op.");
            return Ok(CloseOutcome::AlreadyFlat);
        };
        let confirmed = self.submit(&order).await?;
        Ok(CloseOutcome::Closed(confirmed))
    }

    pub async fn set_leverage(&self, symbol: &str, leverage: u8) -> Result<(), TradeError> {
        self.api_client
            .set_leverage(symbol, leverage)
            .await
            .map_err(normalize)?;
        tracing::info!(symbol, leverage, "Leverage updated.");
        Ok(())
    }
}

/// Builds the market order that flattens `position`, or `None` when there is
/// nothing to close. Side is the opposite of the position sign; quantity is
/// its absolute value.
fn build_close_order(position: &Position) -> Option<OrderRequest> {
    if position.is_flat() {
        return None;
    }
    let side = if position.position_amt.is_sign_positive() {
        core_types::OrderSide::Sell
    } else {
        core_types::OrderSide::Buy
    };
    Some(OrderRequest {
        symbol: position.symbol.clone(),
        side,
        order_type: OrderType::Market,
        quantity: position.position_amt.abs(),
        price: None,
        stop_price: None,
        time_in_force: TimeInForce::default(),
        reduce_only: true,
        client_order_id: Uuid::new_v4(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{http_error, sample_position, sample_request, MockApiClient};
    use core_types::OrderSide;
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_to_the_ceiling_then_surfaced() {
        let mock = Arc::new(MockApiClient::default());
        for _ in 0..3 {
            mock.push_place_result(Err(http_error(503, 0, "service unavailable")));
        }
        let dispatcher = Dispatcher::new(mock.clone(), fast_retry(3));

        let err = dispatcher.submit(&sample_request()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(mock.place_calls.load(Ordering::SeqCst), 3);
        // One idempotency probe before each of the two retries.
        assert_eq!(mock.query_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_failure_is_never_retried() {
        let mock = Arc::new(MockApiClient::default());
        mock.push_place_result(Err(http_error(400, -2019, "Margin is insufficient.")));
        let dispatcher = Dispatcher::new(mock.clone(), fast_retry(3));

        let err = dispatcher.submit(&sample_request()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Rejected);
        assert_eq!(mock.place_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.query_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn landed_attempt_is_recognised_instead_of_resubmitted() {
        let mock = Arc::new(MockApiClient::default());
        let request = sample_request();
        mock.push_place_result(Err(http_error(504, 0, "gateway timeout")));
        mock.push_query_result(Ok(Some(mock.order_for(&request))));
        let dispatcher = Dispatcher::new(mock.clone(), fast_retry(3));

        let order = dispatcher.submit(&request).await.unwrap();
        assert_eq!(order.client_order_id, request.client_order_id.to_string());
        assert_eq!(mock.place_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.query_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_twice_in_a_row_both_succeed() {
        let mock = Arc::new(MockApiClient::default());
        let request = sample_request();
        mock.push_cancel_result(Ok(mock.order_for(&request)));
        mock.push_cancel_result(Err(http_error(400, -2011, "Unknown order sent.")));
        let dispatcher = Dispatcher::new(mock.clone(), fast_retry(3));

        let first = dispatcher.cancel("BTCUSDT", 42).await.unwrap();
        assert!(!first.already_closed);
        let second = dispatcher.cancel("BTCUSDT", 42).await.unwrap();
        assert!(second.already_closed);
    }

    #[tokio::test]
    async fn close_on_flat_position_is_a_no_op_success() {
        let mock = Arc::new(MockApiClient::default());
        let dispatcher = Dispatcher::new(mock.clone(), fast_retry(3));

        let outcome = dispatcher
            .close(Some(sample_position("BTCUSDT", dec!(0))))
            .await
            .unwrap();
        assert_eq!(outcome, CloseOutcome::AlreadyFlat);

        let outcome = dispatcher.close(None).await.unwrap();
        assert_eq!(outcome, CloseOutcome::AlreadyFlat);
        assert_eq!(mock.place_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_on_short_position_buys_back_the_absolute_amount() {
        let mock = Arc::new(MockApiClient::default());
        let dispatcher = Dispatcher::new(mock.clone(), fast_retry(3));

        let outcome = dispatcher
            .close(Some(sample_position("BTCUSDT", dec!(-0.5))))
            .await
            .unwrap();
        assert!(matches!(outcome, CloseOutcome::Closed(_)));

        let submitted = mock.last_order.lock().unwrap().clone().unwrap();
        assert_eq!(submitted.side, OrderSide::Buy);
        assert_eq!(submitted.quantity, dec!(0.5));
        assert_eq!(submitted.order_type, OrderType::Market);
        assert!(submitted.reduce_only);
    }
}
