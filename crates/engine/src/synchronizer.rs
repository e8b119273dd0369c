//! The account-state synchronizer: a timer-driven refresh loop that polls
//! balance, positions, and open orders into a shared cache, plus an
//! independent ingestion path for the streaming price feed.
//!
//! The two update paths are deliberately separate consistency domains: a
//! quote and a position snapshot are never guaranteed to be mutually
//! consistent in time. This is a design boundary, not an oversight.

use crate::error::TradeError;
use crate::normalizer::normalize;
use api_client::live_connector::MarkPriceUpdate;
use api_client::ApiClient;
use chrono::Utc;
use core_types::{Balance, Order, Position, PriceQuote};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::interval;

/// The shared, in-memory mirror of the exchange's account state.
///
/// Each entity is swapped wholesale on a successful poll; a failed poll
/// leaves only that entity stale while the others refresh. `None` means the
/// entity has not been fetched successfully yet.
#[derive(Clone, Default)]
pub struct AccountCache {
    inner: Arc<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    balance: RwLock<Option<Balance>>,
    positions: RwLock<Option<Vec<Position>>>,
    orders: RwLock<Option<Vec<Order>>>,
    prices: RwLock<HashMap<String, PriceQuote>>,
}

impl AccountCache {
    pub async fn balance(&self) -> Option<Balance> {
        self.inner.balance.read().await.clone()
    }

    pub async fn positions(&self) -> Option<Vec<Position>> {
        self.inner.positions.read().await.clone()
    }

    /// The latest cached position for one symbol, if any poll has completed.
    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.inner
            .positions
            .read()
            .await
            .as_ref()?
            .iter()
            .find(|p| p.symbol == symbol)
            .cloned()
    }

    pub async fn orders(&self) -> Option<Vec<Order>> {
        self.inner.orders.read().await.clone()
    }

    pub async fn price(&self, symbol: &str) -> Option<PriceQuote> {
        self.inner.prices.read().await.get(symbol).cloned()
    }

    pub(crate) async fn set_balance(&self, balance: Balance) {
        *self.inner.balance.write().await = Some(balance);
    }

    pub(crate) async fn set_positions(&self, positions: Vec<Position>) {
        *self.inner.positions.write().await = Some(positions);
    }

    pub(crate) async fn set_orders(&self, orders: Vec<Order>) {
        *self.inner.orders.write().await = Some(orders);
    }

    pub(crate) async fn set_price(&self, quote: PriceQuote) {
        self.inner
            .prices
            .write()
            .await
            .insert(quote.symbol.clone(), quote);
    }
}

pub struct Synchronizer {
    api_client: Arc<dyn ApiClient>,
    cache: AccountCache,
    refresh_interval: Duration,
    price_tx: broadcast::Sender<PriceQuote>,
}

impl Synchronizer {
    pub fn new(
        api_client: Arc<dyn ApiClient>,
        cache: AccountCache,
        refresh_interval: Duration,
    ) -> Self {
        let (price_tx, _) = broadcast::channel(256);
        Self {
            api_client,
            cache,
            refresh_interval,
            price_tx,
        }
    }

    /// Subscribes to the re-broadcast price feed for push consumers.
    pub fn subscribe_prices(&self) -> broadcast::Receiver<PriceQuote> {
        self.price_tx.subscribe()
    }

    /// Runs one poll cycle: fetch balance, positions, and open orders
    /// concurrently and swap each cache entry on success.
    ///
    /// Per-entity failures are normalized and logged but do not abort the
    /// cycle; the first one is returned so one-shot callers can surface it.
    pub async fn refresh_once(&self) -> Result<(), TradeError> {
        let (balance_result, positions_result, orders_result) = tokio::join!(
            self.api_client.get_account(),
            self.api_client.get_positions(),
            self.api_client.get_open_orders(),
        );

        let mut first_error: Option<TradeError> = None;

        match balance_result {
            Ok(balance) => self.cache.set_balance(balance).await,
            Err(e) => {
                let err = normalize(e);
                tracing::warn!(kind = %err.kind, error = %err, "Balance refresh failed; serving stale entry.");
                first_error.get_or_insert(err);
            }
        }

        match positions_result {
            Ok(positions) => self.cache.set_positions(positions).await,
            Err(e) => {
                let err = normalize(e);
                tracing::warn!(kind = %err.kind, error = %err, "Positions refresh failed; serving stale entry.");
                first_error.get_or_insert(err);
            }
        }

        match orders_result {
            Ok(orders) => self.cache.set_orders(orders).await,
            Err(e) => {
                let err = normalize(e);
                tracing::warn!(kind = %err.kind, error = %err, "Open-orders refresh failed; serving stale entry.");
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// The continuous refresh loop. Runs until the task is dropped.
    ///
    /// No backoff on failure: the interval itself throttles retries, and the
    /// next cycle retries unconditionally.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            interval_secs = self.refresh_interval.as_secs(),
            "Starting account-state refresh loop."
        );
        let mut timer = interval(self.refresh_interval);
        loop {
            // The first tick is immediate, so the cache warms up at startup.
            timer.tick().await;
            // Per-entity failures were already logged inside refresh_once.
            let _ = self.refresh_once().await;
        }
    }

    /// Consumes the streaming price feed, replacing the per-symbol quote in
    /// place on every event and re-broadcasting it to push subscribers.
    ///
    /// If the feed disconnects, readers keep being served the last known
    /// quote until the connector reconnects; no batching, no blocking.
    pub async fn ingest_prices(self: Arc<Self>, mut rx: mpsc::Receiver<MarkPriceUpdate>) {
        while let Some(update) = rx.recv().await {
            let quote = PriceQuote {
                symbol: update.symbol,
                price: update.mark_price,
                observed_at: Utc::now(),
            };
            self.cache.set_price(quote.clone()).await;
            // No subscribers is fine; the cache is the fallback read path.
            let _ = self.price_tx.send(quote);
        }
        tracing::warn!("Price feed channel closed; quotes will no longer update.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_balance, sample_position, MockApiClient};
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn synchronizer(mock: Arc<MockApiClient>) -> Arc<Synchronizer> {
        Arc::new(Synchronizer::new(
            mock,
            AccountCache::default(),
            Duration::from_secs(10),
        ))
    }

    #[tokio::test]
    async fn refresh_swaps_all_entities_on_success() {
        let mock = Arc::new(MockApiClient::default());
        let sync = synchronizer(mock.clone());

        sync.refresh_once().await.unwrap();

        assert_eq!(sync.cache.balance().await.unwrap(), sample_balance());
        assert!(sync.cache.positions().await.is_some());
        assert!(sync.cache.orders().await.is_some());
    }

    #[tokio::test]
    async fn failed_positions_poll_leaves_other_entities_refreshed() {
        let mock = Arc::new(MockApiClient::default());
        mock.fail_positions.store(true, Ordering::SeqCst);
        let sync = synchronizer(mock.clone());

        let err = sync.refresh_once().await.unwrap_err();
        assert!(err.retryable());

        // Balance and orders still refreshed and servable.
        assert!(sync.cache.balance().await.is_some());
        assert!(sync.cache.orders().await.is_some());
        // Positions were never fetched successfully.
        assert!(sync.cache.positions().await.is_none());
    }

    #[tokio::test]
    async fn failed_poll_preserves_the_stale_entry() {
        let mock = Arc::new(MockApiClient::default());
        mock.set_positions(vec![sample_position("BTCUSDT", dec!(0.25))]);
        let sync = synchronizer(mock.clone());

        sync.refresh_once().await.unwrap();
        assert_eq!(
            sync.cache.position("BTCUSDT").await.unwrap().position_amt,
            dec!(0.25)
        );

        // The next poll fails; the stale snapshot must survive untouched.
        mock.set_positions(vec![sample_position("BTCUSDT", dec!(0.75))]);
        mock.fail_positions.store(true, Ordering::SeqCst);
        sync.refresh_once().await.unwrap_err();
        assert_eq!(
            sync.cache.position("BTCUSDT").await.unwrap().position_amt,
            dec!(0.25)
        );
    }

    #[tokio::test]
    async fn price_ingestion_updates_cache_and_broadcasts() {
        let mock = Arc::new(MockApiClient::default());
        let sync = synchronizer(mock);
        let mut price_rx = sync.subscribe_prices();

        let (tx, rx) = mpsc::channel(8);
        let ingest = tokio::spawn(Arc::clone(&sync).ingest_prices(rx));

        tx.send(MarkPriceUpdate {
            symbol: "BTCUSDT".to_string(),
            mark_price: dec!(61000.5),
        })
        .await
        .unwrap();

        let pushed = price_rx.recv().await.unwrap();
        assert_eq!(pushed.symbol, "BTCUSDT");
        assert_eq!(pushed.price, dec!(61000.5));
        assert_eq!(
            sync.cache.price("BTCUSDT").await.unwrap().price,
            dec!(61000.5)
        );

        drop(tx);
        ingest.await.unwrap();
    }
}
