use crate::error::ConfigError;
use serde::Deserialize;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sync.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "dispatch.max_attempts must be greater than zero".to_string(),
            ));
        }
        let keys = if self.api.live_trading { &self.api.production } else { &self.api.testnet };
        if keys.key.is_empty() || keys.secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "API credentials are missing for the selected environment".to_string(),
            ));
        }
        Ok(())
    }
}

/// API credentials and environment selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// When true, requests go to the production endpoints. Defaults to the
    /// testnet, which is the safe choice for a fresh checkout.
    #[serde(default)]
    pub live_trading: bool,
    pub testnet: ApiKeys,
    pub production: ApiKeys,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeys {
    pub key: String,
    pub secret: String,
}

/// Parameters for the account-state refresh loop and the price feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSettings {
    /// Seconds between balance/position/order polls.
    pub interval_secs: u64,
    /// Symbols to subscribe to on the mark-price stream.
    pub feed_symbols: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            feed_symbols: vec!["BTCUSDT".to_string()],
        }
    }
}

/// Parameters for order submission retry behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSettings {
    /// Total attempt ceiling for transient failures, including the first try.
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds; doubles on each retry.
    pub base_delay_ms: u64,
    /// Per-call timeout applied to every exchange request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            request_timeout_secs: 10,
        }
    }
}

/// Settings for the HTTP/WebSocket transport.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}
