//! Instrument Cache
//!
//! Keeps instrument lists in the key/value store using the same layout a
//! browser front-end would keep in localStorage:
//!
//! | Key | Value |
//! |-----|-------|
//! | `<exchange>-<category>` | `display=raw` pairs joined by `,` |
//! | `<exchange>-<category>-updated` | RFC 3339 timestamp of the last refresh |
//! | `ticker_<rawSymbol>` | JSON ticker snapshot |
//!
//! Snapshot keys are shared by every market listing the same raw symbol.
//! After a refresh, snapshots of symbols no cached list mentions any more
//! are pruned.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::ports::{KeyValueStore, MarketDataSource, StorageError, run_blocking};
use crate::domain::market::{Category, Exchange, MarketKey};
use crate::domain::symbol::Instrument;
use crate::domain::ticker::TickerData;

/// Prefix of per-symbol ticker snapshot keys.
pub const TICKER_SNAPSHOT_PREFIX: &str = "ticker_";

/// One cached `display=raw` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolPair {
    /// Display symbol.
    pub display: String,
    /// Exchange-native symbol.
    pub raw: String,
}

/// Cached instrument list of one market.
#[derive(Debug, Clone, Serialize)]
pub struct CachedInstruments {
    /// Market.
    pub market: MarketKey,
    /// Symbol pairs in stored order.
    pub pairs: Vec<SymbolPair>,
    /// Last successful refresh, if recorded.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Outcome of refreshing several categories of one exchange.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    /// Exchange refreshed.
    pub exchange: Exchange,
    /// Categories stored, with their instrument counts.
    pub succeeded: Vec<(Category, usize)>,
    /// Categories that failed, with the error message.
    pub failed: Vec<(Category, String)>,
    /// Ticker snapshots removed because no cached list mentions them.
    pub pruned_snapshots: usize,
}

impl RefreshReport {
    /// A refresh succeeds when at least one category was stored.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

/// Encode instruments as `display=raw` pairs joined by commas.
#[must_use]
pub fn encode_pairs(instruments: &[Instrument]) -> String {
    instruments
        .iter()
        .map(|i| format!("{}={}", i.integrated_symbol, i.raw_symbol))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode `display=raw` pairs; malformed entries are skipped.
#[must_use]
pub fn decode_pairs(encoded: &str) -> Vec<SymbolPair> {
    encoded
        .split(',')
        .filter_map(|entry| {
            let (display, raw) = entry.trim().split_once('=')?;
            let (display, raw) = (display.trim(), raw.trim());
            if display.is_empty() || raw.is_empty() {
                return None;
            }
            Some(SymbolPair {
                display: display.to_string(),
                raw: raw.to_string(),
            })
        })
        .collect()
}

/// Instrument metadata and ticker snapshot cache.
pub struct InstrumentCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl InstrumentCache {
    /// Create a cache over a store; entries older than `ttl` are stale.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Load the cached instrument list of a market.
    #[must_use]
    pub fn load(&self, market: MarketKey) -> Option<CachedInstruments> {
        let key = market.storage_key();
        let encoded = self.store.get(&key)?;
        let updated_at = self
            .store
            .get(&updated_key(&key))
            .and_then(|ts| DateTime::parse_from_rfc3339(&ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Some(CachedInstruments {
            market,
            pairs: decode_pairs(&encoded),
            updated_at,
        })
    }

    /// Store an instrument list and its refresh timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub fn save(
        &self,
        market: MarketKey,
        instruments: &[Instrument],
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.store.set_many(instrument_entries(market, instruments, now))
    }

    /// Whether a market's cache is missing or older than the TTL.
    #[must_use]
    pub fn is_stale(&self, market: MarketKey, now: DateTime<Utc>) -> bool {
        let Some(updated_at) = self.load(market).and_then(|c| c.updated_at) else {
            return true;
        };
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        now.signed_duration_since(updated_at) > ttl
    }

    /// Refresh the instrument lists of several categories.
    ///
    /// A failing category is logged and skipped; its previous cached value
    /// stays in place. When any category was stored, orphaned ticker
    /// snapshots are pruned.
    pub async fn refresh(
        &self,
        source: &dyn MarketDataSource,
        categories: &[Category],
    ) -> RefreshReport {
        let exchange = source.exchange();
        let mut report = RefreshReport {
            exchange,
            succeeded: Vec::new(),
            failed: Vec::new(),
            pruned_snapshots: 0,
        };

        for &category in categories {
            let market = MarketKey::new(exchange, category);
            let result = match source.fetch_instruments(category).await {
                Ok(instruments) => {
                    let count = instruments.len();
                    let entries = instrument_entries(market, &instruments, Utc::now());
                    run_blocking(&self.store, move |store| store.set_many(entries))
                        .await
                        .map(|()| count)
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(count) => {
                    tracing::info!(market = %market, instruments = count, "Instrument cache refreshed");
                    report.succeeded.push((category, count));
                }
                Err(error) => {
                    tracing::warn!(market = %market, error = %error, "Instrument refresh failed");
                    report.failed.push((category, error));
                }
            }
        }

        if report.is_success() {
            match run_blocking(&self.store, prune_snapshots).await {
                Ok(pruned) => report.pruned_snapshots = pruned,
                Err(e) => {
                    tracing::warn!(exchange = %exchange, error = %e, "Snapshot pruning failed");
                }
            }
        }

        report
    }

    /// Persist ticker snapshots under `ticker_<rawSymbol>`.
    ///
    /// The store write runs on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store write fails.
    pub async fn save_snapshots(&self, tickers: &[TickerData]) -> Result<(), StorageError> {
        let entries = tickers
            .iter()
            .map(|ticker| {
                serde_json::to_string(ticker)
                    .map(|json| (snapshot_key(&ticker.raw_symbol), json))
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if entries.is_empty() {
            return Ok(());
        }
        run_blocking(&self.store, move |store| store.set_many(entries)).await
    }

    /// Load a ticker snapshot; unreadable snapshots are ignored.
    #[must_use]
    pub fn load_snapshot(&self, raw_symbol: &str) -> Option<TickerData> {
        let json = self.store.get(&snapshot_key(raw_symbol))?;
        serde_json::from_str(&json)
            .inspect_err(|e| {
                tracing::debug!(raw_symbol, error = %e, "Ignoring unreadable ticker snapshot");
            })
            .ok()
    }
}

fn instrument_entries(
    market: MarketKey,
    instruments: &[Instrument],
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let key = market.storage_key();
    vec![
        (updated_key(&key), now.to_rfc3339()),
        (key, encode_pairs(instruments)),
    ]
}

/// Remove ticker snapshots whose raw symbol no cached list mentions.
fn prune_snapshots(store: &dyn KeyValueStore) -> Result<usize, StorageError> {
    let listed: HashSet<String> = Exchange::all()
        .iter()
        .flat_map(|&exchange| {
            Category::all()
                .iter()
                .map(move |&category| MarketKey::new(exchange, category))
        })
        .filter_map(|market| store.get(&market.storage_key()))
        .flat_map(|encoded| decode_pairs(&encoded).into_iter().map(|pair| pair.raw))
        .collect();

    let orphaned: Vec<String> = store
        .keys_with_prefix(TICKER_SNAPSHOT_PREFIX)
        .into_iter()
        .filter(|key| {
            key.strip_prefix(TICKER_SNAPSHOT_PREFIX)
                .is_some_and(|raw| !listed.contains(raw))
        })
        .collect();

    let count = orphaned.len();
    if count > 0 {
        store.remove_many(orphaned)?;
        tracing::info!(pruned = count, "Pruned orphaned ticker snapshots");
    }
    Ok(count)
}

fn updated_key(key: &str) -> String {
    format!("{key}-updated")
}

fn snapshot_key(raw_symbol: &str) -> String {
    format!("{TICKER_SNAPSHOT_PREFIX}{raw_symbol}")
}
