//! Ticker Board Configuration Settings
//!
//! Configuration types for the ticker board, loaded from environment
//! variables. Every value has a default; only malformed values are errors.
//! Poll intervals and the upstream timeout must also be non-zero.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::market::{Category, Exchange, MarketKey};

/// Upstream API base URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamSettings {
    /// Bybit v5 API.
    pub bybit: String,
    /// Binance spot API.
    pub binance_spot: String,
    /// Binance USDⓈ-M futures API.
    pub binance_um: String,
    /// Binance COIN-M futures API.
    pub binance_cm: String,
    /// Bithumb public API.
    pub bithumb: String,
    /// ExchangeRate-API.
    pub exchange_rate: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            bybit: "https://api.bybit.com".to_string(),
            binance_spot: "https://api.binance.com".to_string(),
            binance_um: "https://fapi.binance.com".to_string(),
            binance_cm: "https://dapi.binance.com".to_string(),
            bithumb: "https://api.bithumb.com".to_string(),
            exchange_rate: "https://open.er-api.com".to_string(),
            timeout: Duration::from_millis(5_000),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Proxy and board API port.
    pub api_port: u16,
    /// Health check and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            api_port: 8080,
            health_port: 8082,
        }
    }
}

/// Polling intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Fallback interval for exchanges without an override.
    pub default_interval: Duration,
    /// Bybit boards.
    pub bybit: Duration,
    /// Binance boards.
    pub binance: Duration,
    /// Bithumb boards.
    pub bithumb: Duration,
    /// USD→KRW rate.
    pub rate: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_millis(1_000),
            bybit: Duration::from_millis(1_000),
            binance: Duration::from_millis(1_100),
            bithumb: Duration::from_millis(500),
            rate: Duration::from_secs(600),
        }
    }
}

impl PollSettings {
    /// Poll interval of an exchange's boards.
    #[must_use]
    pub const fn interval_for(&self, exchange: Exchange) -> Duration {
        match exchange {
            Exchange::Bybit => self.bybit,
            Exchange::Binance => self.binance,
            Exchange::Bithumb => self.bithumb,
        }
    }
}

/// Caching and persistence settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Key/value store file.
    pub store_path: PathBuf,
    /// `Cache-Control` max-age of proxied ticker responses.
    pub tickers_max_age: Duration,
    /// `Cache-Control` max-age of proxied instrument responses.
    pub instruments_max_age: Duration,
    /// Age after which cached instrument lists are refreshed.
    pub instrument_ttl: Duration,
    /// Minimum time between ticker snapshot writes per board.
    pub snapshot_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("ticker-board-store.json"),
            tickers_max_age: Duration::from_secs(1),
            instruments_max_age: Duration::from_secs(3_600),
            instrument_ttl: Duration::from_secs(86_400),
            snapshot_interval: Duration::from_secs(30),
        }
    }
}

/// Complete ticker board configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Boards to poll, in display order.
    pub boards: Vec<MarketKey>,
    /// Server port settings.
    pub server: ServerSettings,
    /// Polling intervals.
    pub poll: PollSettings,
    /// Caching settings.
    pub cache: CacheSettings,
    /// Upstream endpoints.
    pub upstream: UpstreamSettings,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            boards: default_boards(),
            server: ServerSettings::default(),
            poll: PollSettings::default(),
            cache: CacheSettings::default(),
            upstream: UpstreamSettings::default(),
        }
    }
}

fn default_boards() -> Vec<MarketKey> {
    vec![
        MarketKey::new(Exchange::Bybit, Category::Spot),
        MarketKey::new(Exchange::Bybit, Category::Linear),
        MarketKey::new(Exchange::Binance, Category::Spot),
        MarketKey::new(Exchange::Bithumb, Category::Spot),
    ]
}

impl BoardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };
        let defaults = Self::default();

        let boards = match env.non_empty("TICKER_BOARD_BOARDS") {
            Some(value) => parse_boards(&value)?,
            None => defaults.boards,
        };

        let server = ServerSettings {
            api_port: env.parse("TICKER_BOARD_API_PORT", defaults.server.api_port)?,
            health_port: env.parse("TICKER_BOARD_HEALTH_PORT", defaults.server.health_port)?,
        };

        let default_interval = env
            .millis("TICKER_BOARD_POLL_INTERVAL_MS", defaults.poll.default_interval)
            .and_then(|d| non_zero("TICKER_BOARD_POLL_INTERVAL_MS", d))?;
        // A global interval without per-exchange overrides applies to all.
        let exchange_default = |fallback: Duration| {
            if env.non_empty("TICKER_BOARD_POLL_INTERVAL_MS").is_some() {
                default_interval
            } else {
                fallback
            }
        };
        let poll_ms = |key: &str, fallback: Duration| {
            env.millis(key, exchange_default(fallback))
                .and_then(|d| non_zero(key, d))
        };
        let poll = PollSettings {
            default_interval,
            bybit: poll_ms("TICKER_BOARD_BYBIT_POLL_MS", defaults.poll.bybit)?,
            binance: poll_ms("TICKER_BOARD_BINANCE_POLL_MS", defaults.poll.binance)?,
            bithumb: poll_ms("TICKER_BOARD_BITHUMB_POLL_MS", defaults.poll.bithumb)?,
            rate: env
                .secs("TICKER_BOARD_RATE_POLL_SECS", defaults.poll.rate)
                .and_then(|d| non_zero("TICKER_BOARD_RATE_POLL_SECS", d))?,
        };

        let cache = CacheSettings {
            store_path: env
                .non_empty("TICKER_BOARD_STORE_PATH")
                .map_or(defaults.cache.store_path, PathBuf::from),
            tickers_max_age: env.secs(
                "TICKER_BOARD_TICKERS_MAX_AGE_SECS",
                defaults.cache.tickers_max_age,
            )?,
            instruments_max_age: env.secs(
                "TICKER_BOARD_INSTRUMENTS_MAX_AGE_SECS",
                defaults.cache.instruments_max_age,
            )?,
            instrument_ttl: env.secs(
                "TICKER_BOARD_INSTRUMENT_CACHE_TTL_SECS",
                defaults.cache.instrument_ttl,
            )?,
            snapshot_interval: env.secs(
                "TICKER_BOARD_SNAPSHOT_INTERVAL_SECS",
                defaults.cache.snapshot_interval,
            )?,
        };

        let upstream = UpstreamSettings {
            bybit: env.url("BYBIT_BASE_URL", defaults.upstream.bybit),
            binance_spot: env.url("BINANCE_SPOT_BASE_URL", defaults.upstream.binance_spot),
            binance_um: env.url("BINANCE_UM_BASE_URL", defaults.upstream.binance_um),
            binance_cm: env.url("BINANCE_CM_BASE_URL", defaults.upstream.binance_cm),
            bithumb: env.url("BITHUMB_BASE_URL", defaults.upstream.bithumb),
            exchange_rate: env.url("EXCHANGE_RATE_BASE_URL", defaults.upstream.exchange_rate),
            timeout: env
                .millis("TICKER_BOARD_HTTP_TIMEOUT_MS", defaults.upstream.timeout)
                .and_then(|d| non_zero("TICKER_BOARD_HTTP_TIMEOUT_MS", d))?,
        };

        Ok(Self {
            boards,
            server,
            poll,
            cache,
            upstream,
        })
    }

    /// Whether a board of the given market is configured.
    #[must_use]
    pub fn has_board(&self, market: MarketKey) -> bool {
        self.boards.contains(&market)
    }

    /// Categories configured for an exchange, in board order.
    #[must_use]
    pub fn categories_for(&self, exchange: Exchange) -> Vec<Category> {
        self.boards
            .iter()
            .filter(|m| m.exchange == exchange)
            .map(|m| m.category)
            .collect()
    }
}

/// Whether an exchange offers a category.
#[must_use]
pub const fn is_supported(market: MarketKey) -> bool {
    match market.exchange {
        Exchange::Bybit => true,
        Exchange::Binance => !matches!(market.category, Category::Option),
        Exchange::Bithumb => matches!(market.category, Category::Spot),
    }
}

fn non_zero(key: &str, duration: Duration) -> Result<Duration, ConfigError> {
    if duration.is_zero() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: "0".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(duration)
}

fn parse_boards(value: &str) -> Result<Vec<MarketKey>, ConfigError> {
    let mut boards = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let market: MarketKey = entry.parse().map_err(|e| ConfigError::InvalidValue {
            key: "TICKER_BOARD_BOARDS".to_string(),
            value: entry.to_string(),
            reason: format!("{e}"),
        })?;
        if !is_supported(market) {
            return Err(ConfigError::UnsupportedMarket(market.to_string()));
        }
        if !boards.contains(&market) {
            boards.push(market);
        }
    }
    Ok(boards)
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("invalid value for {key} ({value}): {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Parse failure.
        reason: String,
    },
    /// Board requested for a category the exchange does not offer.
    #[error("unsupported market in TICKER_BOARD_BOARDS: {0}")]
    UnsupportedMarket(String),
}

struct Env<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Env<'_> {
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.non_empty(key).map_or(Ok(default), |value| {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
                reason: e.to_string(),
            })
        })
    }

    fn millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse(key, default_ms).map(Duration::from_millis)
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }

    fn url(&self, key: &str, default: String) -> String {
        self.non_empty(key)
            .map_or(default, |v| v.trim_end_matches('/').to_string())
    }
}
