//! # Meridian Engine
//!
//! The order validation/dispatch engine and account-state synchronizer.
//!
//! ## Architectural Principles
//!
//! - **Single-writer cache:** the synchronizer is the only component that
//!   writes the poll-driven cache entries. User-triggered operations read the
//!   cache and write to the exchange, never the other way round, which
//!   eliminates writer/writer races by construction.
//! - **One error language:** every exchange-origin failure passes through the
//!   normalizer before it reaches a caller, so the transports only ever see
//!   the `TradeError` taxonomy.
//!
//! ## Public API
//!
//! - `TradingService`: the facade the HTTP and CLI transports talk to.
//! - `Dispatcher`, `Synchronizer`, `AccountCache`: the underlying components.
//! - `TradeError`, `ErrorKind`: the error taxonomy.

use api_client::live_connector::MarkPriceUpdate;
use api_client::ApiClient;
use configuration::settings::{DispatchSettings, SyncSettings};
use core_types::{Balance, Order, OrderType, Position, PriceQuote};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use validator::RawOrderFields;

pub mod dispatcher;
pub mod error;
pub mod normalizer;
pub mod synchronizer;

#[cfg(test)]
mod test_support;

pub use dispatcher::{CancelAck, CloseOutcome, Dispatcher, RetryPolicy};
pub use error::{ErrorKind, TradeError};
pub use normalizer::normalize;
pub use synchronizer::{AccountCache, Synchronizer};

/// The facade tying validator, dispatcher, and cache together for the
/// transports. HTTP handlers and CLI subcommands are thin wrappers over
/// these methods.
pub struct TradingService {
    api_client: Arc<dyn ApiClient>,
    cache: AccountCache,
    dispatcher: Dispatcher,
    synchronizer: Arc<Synchronizer>,
}

impl TradingService {
    pub fn new(
        api_client: Arc<dyn ApiClient>,
        dispatch: &DispatchSettings,
        sync: &SyncSettings,
    ) -> Self {
        let cache = AccountCache::default();
        let dispatcher = Dispatcher::new(Arc::clone(&api_client), RetryPolicy::from(dispatch));
        let synchronizer = Arc::new(Synchronizer::new(
            Arc::clone(&api_client),
            cache.clone(),
            Duration::from_secs(sync.interval_secs),
        ));
        Self {
            api_client,
            cache,
            dispatcher,
            synchronizer,
        }
    }

    /// Spawns the continuous poll loop.
    pub fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.synchronizer).run())
    }

    /// Spawns the price-feed ingestion task over a connector channel.
    pub fn spawn_price_feed(&self, rx: mpsc::Receiver<MarkPriceUpdate>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.synchronizer).ingest_prices(rx))
    }

    /// One synchronous poll cycle, for one-shot CLI reads.
    pub async fn refresh_once(&self) -> Result<(), TradeError> {
        self.synchronizer.refresh_once().await
    }

    pub fn subscribe_prices(&self) -> broadcast::Receiver<PriceQuote> {
        self.synchronizer.subscribe_prices()
    }

    /// Validates raw fields for the given order type and dispatches the
    /// resulting request. A validation failure never reaches the exchange.
    pub async fn place_order(
        &self,
        raw: &RawOrderFields,
        order_type: OrderType,
    ) -> Result<Order, TradeError> {
        let request = validator::validate(raw, order_type)?;
        self.dispatcher.submit(&request).await
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<CancelAck, TradeError> {
        self.dispatcher.cancel(&symbol.to_uppercase(), order_id).await
    }

    /// Closes the position for `symbol` based on the latest cached snapshot.
    /// A snapshot showing the symbol flat or absent is a no-op success. An
    /// unsynchronized cache is not: before the first poll the upstream state
    /// is unknown, so the call fails as Transient instead of claiming the
    /// desired end state already holds.
    pub async fn close_position(&self, symbol: &str) -> Result<CloseOutcome, TradeError> {
        let symbol = symbol.to_uppercase();
        let positions = self.cache.positions().await.ok_or_else(|| {
            TradeError::new(ErrorKind::Transient, "positions not yet synchronized")
        })?;
        let position = positions.into_iter().find(|p| p.symbol == symbol);
        self.dispatcher.close(position).await
    }

    pub async fn set_leverage(&self, symbol: &str, leverage: i64) -> Result<u8, TradeError> {
        let leverage = validator::validate_leverage(leverage)?;
        self.dispatcher
            .set_leverage(&symbol.to_uppercase(), leverage)
            .await?;
        Ok(leverage)
    }

    pub async fn balance(&self) -> Result<Balance, TradeError> {
        self.cache.balance().await.ok_or_else(|| {
            TradeError::new(ErrorKind::Transient, "balance not yet synchronized")
        })
    }

    /// Open (non-flat) positions from the latest snapshot.
    pub async fn positions(&self) -> Result<Vec<Position>, TradeError> {
        let positions = self.cache.positions().await.ok_or_else(|| {
            TradeError::new(ErrorKind::Transient, "positions not yet synchronized")
        })?;
        Ok(positions.into_iter().filter(|p| !p.is_flat()).collect())
    }

    pub async fn orders(&self) -> Result<Vec<Order>, TradeError> {
        self.cache.orders().await.ok_or_else(|| {
            TradeError::new(ErrorKind::Transient, "open orders not yet synchronized")
        })
    }

    /// The latest quote for `symbol`. Served from the feed cache when
    /// available; on a cold start the exchange is asked once and the result
    /// cached so subsequent reads stay local.
    pub async fn price(&self, symbol: &str) -> Result<PriceQuote, TradeError> {
        let symbol = symbol.to_uppercase();
        if let Some(quote) = self.cache.price(&symbol).await {
            return Ok(quote);
        }
        let quote = self
            .api_client
            .get_price(&symbol)
            .await
            .map_err(normalize)?;
        self.cache.set_price(quote.clone()).await;
        Ok(quote)
    }
}
