//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `MarketDataSource`: tickers and instrument lists from one exchange
//! - `ExchangeRateSource`: fiat conversion rates
//! - `KeyValueStore`: string key/value persistence (the localStorage of
//!   the board), driven from async code through [`run_blocking`]

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::market::{Category, Exchange};
use crate::domain::symbol::Instrument;
use crate::domain::ticker::RawTicker;

// =============================================================================
// Market Data
// =============================================================================

/// Source of tickers and instrument metadata for a single exchange.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Exchange this source talks to.
    fn exchange(&self) -> Exchange;

    /// Whether the exchange offers the category.
    fn supports(&self, category: Category) -> bool;

    /// Fetch the current tickers of a category.
    async fn fetch_tickers(&self, category: Category) -> Result<Vec<RawTicker>, SourceError>;

    /// Fetch the instrument list of a category.
    async fn fetch_instruments(&self, category: Category) -> Result<Vec<Instrument>, SourceError>;
}

/// Source of fiat exchange rates.
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    /// Units of `quote` per one unit of `base`.
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<Decimal, SourceError>;
}

/// Errors from market data and rate sources.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Request could not be sent or the connection failed.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream answered with a non-success status.
    #[error("upstream responded with status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Upstream reported an application-level error.
    #[error("API error {code}: {message}")]
    Api {
        /// Exchange error code.
        code: String,
        /// Exchange error message.
        message: String,
    },

    /// The exchange has no such category.
    #[error("{exchange} does not offer the {category} category")]
    UnsupportedCategory {
        /// Exchange.
        exchange: Exchange,
        /// Requested category.
        category: Category,
    },

    /// Requested item is missing from the response.
    #[error("not found: {0}")]
    NotFound(String),
}

// =============================================================================
// Storage
// =============================================================================

/// String key/value persistence.
///
/// Mirrors browser localStorage: flat keys, string values, last write wins.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write several values as one unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the values could not be persisted.
    fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StorageError>;

    /// Remove several values as one unit. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal could not be persisted.
    fn remove_many(&self, keys: Vec<String>) -> Result<(), StorageError>;

    /// All keys starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// Run a store operation on the blocking thread pool.
///
/// Store writes may rewrite and fsync a file, so async callers go through
/// here instead of calling the store on a runtime worker.
///
/// # Errors
///
/// Returns the operation's error, or [`StorageError::Task`] if the blocking
/// task panicked or was cancelled.
pub async fn run_blocking<T, F>(
    store: &Arc<dyn KeyValueStore>,
    op: F,
) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce(&dyn KeyValueStore) -> Result<T, StorageError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error("storage I/O error on {path}: {message}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        message: String,
    },

    /// Stored content could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// Blocking store task did not complete.
    #[error("storage task failed: {0}")]
    Task(String),
}
