use crate::auth::sign_request;
use crate::error::ApiError;
use async_trait::async_trait;
use chrono::Utc;
use configuration::settings::{ApiConfig, DispatchSettings};
use core_types::{Balance, Order, OrderRequest, Position, PriceQuote};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

mod auth;
pub mod error;
pub mod live_connector;
pub mod responses;

// --- Public API ---
pub use live_connector::{LiveConnector, MarkPriceUpdate};
pub use responses::{
    AccountResponse, ApiErrorResponse, OrderResponse, PositionResponse, PriceTickerResponse,
};

/// Binance error code for "order does not exist". The adapter maps it to
/// `Ok(None)` on lookups because absence is an answer there, not a failure.
const CODE_UNKNOWN_ORDER: i64 = -2013;

/// The generic, abstract interface for a trading exchange API client.
/// This trait is the contract the engine programs against, allowing the
/// underlying implementation (live or mock) to be swapped out.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetches the wallet-level account balance. (Authenticated)
    async fn get_account(&self) -> Result<Balance, ApiError>;

    /// Fetches the last-traded price for a symbol. (Public)
    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ApiError>;

    /// Fetches all current positions, open or flat. (Authenticated)
    async fn get_positions(&self) -> Result<Vec<Position>, ApiError>;

    /// Fetches all currently open orders. (Authenticated)
    async fn get_open_orders(&self) -> Result<Vec<Order>, ApiError>;

    /// Places a new order on the exchange. (Authenticated)
    async fn place_order(&self, order: &OrderRequest) -> Result<Order, ApiError>;

    /// Looks an order up by its client order id. Returns `None` when the
    /// exchange has no record of it. (Authenticated)
    async fn query_order(
        &self,
        symbol: &str,
        client_order_id: Uuid,
    ) -> Result<Option<Order>, ApiError>;

    /// Cancels an open order. (Authenticated)
    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<Order, ApiError>;

    /// Sets the leverage for a given symbol. (Authenticated)
    async fn set_leverage(&self, symbol: &str, leverage: u8) -> Result<(), ApiError>;
}

/// A concrete implementation of the `ApiClient` for the Binance futures API.
#[derive(Clone)]
pub struct BinanceClient {
    client: reqwest::Client,
    base_url: String,
    api_secret: String,
}

enum Method {
    Get,
    Post,
    Delete,
}

impl BinanceClient {
    pub fn new(api_config: &ApiConfig, dispatch: &DispatchSettings) -> Self {
        let (base_url, keys) = if api_config.live_trading {
            ("https://fapi.binance.com".to_string(), &api_config.production)
        } else {
            (
                "https://testnet.binancefuture.com".to_string(),
                &api_config.testnet,
            )
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            "X-MBX-APIKEY",
            HeaderValue::from_str(&keys.key).expect("Invalid API Key"),
        );

        Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                // A hung exchange call must never stall the refresh loop, so
                // every request carries a hard deadline.
                .timeout(Duration::from_secs(dispatch.request_timeout_secs))
                .build()
                .expect("Failed to build reqwest client"),
            base_url,
            api_secret: keys.secret.clone(),
        }
    }

    async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, ApiError> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_millis();
        params.insert("timestamp", timestamp.to_string());

        let query_string =
            serde_qs::to_string(params).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let signature = sign_request(&self.api_secret, &query_string);

        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        );

        let request = match method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
        } else {
            // The error body is Binance's {code, msg} shape; if even that fails
            // to parse, pass the raw text through with a zero code.
            let (code, msg) = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(body) => (body.code, body.msg),
                Err(_) => (0, text),
            };
            Err(ApiError::Http {
                status: status.as_u16(),
                code,
                msg,
            })
        }
    }

    fn order_params(order: &OrderRequest) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("symbol", order.symbol.clone());
        params.insert("side", order.side.as_str().to_string());
        params.insert("type", order.order_type.as_str().to_string());
        params.insert("quantity", order.quantity.to_string());
        params.insert("newClientOrderId", order.client_order_id.to_string());

        if let Some(price) = order.price {
            params.insert("price", price.to_string());
        }
        if let Some(stop_price) = order.stop_price {
            params.insert("stopPrice", stop_price.to_string());
        }
        if order.order_type.requires_price() {
            params.insert("timeInForce", order.time_in_force.as_str().to_string());
        }
        if order.reduce_only {
            params.insert("reduceOnly", "true".to_string());
        }
        params
    }
}

#[async_trait]
impl ApiClient for BinanceClient {
    async fn get_account(&self) -> Result<Balance, ApiError> {
        let mut params = BTreeMap::new();
        let account: AccountResponse = self
            .signed_request(Method::Get, "/fapi/v2/account", &mut params)
            .await?;
        Ok(account.into())
    }

    async fn get_price(&self, symbol: &str) -> Result<PriceQuote, ApiError> {
        let url = format!("{}/fapi/v1/ticker/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let (code, msg) = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(body) => (body.code, body.msg),
                Err(_) => (0, text),
            };
            return Err(ApiError::Http {
                status: status.as_u16(),
                code,
                msg,
            });
        }

        let ticker: PriceTickerResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        Ok(PriceQuote {
            symbol: ticker.symbol,
            price: ticker.price,
            observed_at: Utc::now(),
        })
    }

    async fn get_positions(&self) -> Result<Vec<Position>, ApiError> {
        let mut params = BTreeMap::new();
        let positions: Vec<PositionResponse> = self
            .signed_request(Method::Get, "/fapi/v2/positionRisk", &mut params)
            .await?;
        Ok(positions.into_iter().map(Into::into).collect())
    }

    async fn get_open_orders(&self) -> Result<Vec<Order>, ApiError> {
        let mut params = BTreeMap::new();
        let orders: Vec<OrderResponse> = self
            .signed_request(Method::Get, "/fapi/v1/openOrders", &mut params)
            .await?;
        Ok(orders.into_iter().map(Into::into).collect())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<Order, ApiError> {
        let mut params = Self::order_params(order);
        let response: OrderResponse = self
            .signed_request(Method::Post, "/fapi/v1/order", &mut params)
            .await?;
        Ok(response.into())
    }

    async fn query_order(
        &self,
        symbol: &str,
        client_order_id: Uuid,
    ) -> Result<Option<Order>, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", symbol.to_string());
        params.insert("origClientOrderId", client_order_id.to_string());

        match self
            .signed_request::<OrderResponse>(Method::Get, "/fapi/v1/order", &mut params)
            .await
        {
            Ok(response) => Ok(Some(response.into())),
            Err(ApiError::Http { code, .. }) if code == CODE_UNKNOWN_ORDER => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<Order, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", symbol.to_string());
        params.insert("orderId", order_id.to_string());

        let response: OrderResponse = self
            .signed_request(Method::Delete, "/fapi/v1/order", &mut params)
            .await?;
        Ok(response.into())
    }

    async fn set_leverage(&self, symbol: &str, leverage: u8) -> Result<(), ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", symbol.to_string());
        params.insert("leverage", leverage.to_string());

        #[derive(serde::Deserialize)]
        #[serde(rename_all = "camelCase")]
        #[allow(dead_code)]
        struct LeverageResponse {
            leverage: u8,
            symbol: String,
        }
        self.signed_request::<LeverageResponse>(Method::Post, "/fapi/v1/leverage", &mut params)
            .await?;
        Ok(())
    }
}
