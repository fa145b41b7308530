//! Ticker Boards
//!
//! A board holds the latest ticker snapshot of one market (exchange and
//! category). Each poll replaces the snapshot per symbol, remembers the
//! previous price for up/down coloring, and raises the per-symbol decimal
//! precision. A failed poll leaves the previous snapshot in place and
//! exposes the error until the next successful poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::application::ports::{MarketDataSource, SourceError};
use crate::application::services::instrument_cache::InstrumentCache;
use crate::domain::market::MarketKey;
use crate::domain::precision::DecimalPrecisionTracker;
use crate::domain::symbol::{Instrument, normalize};
use crate::domain::ticker::{RawTicker, TickerData, TickerQuery, TickerRow};
use crate::infrastructure::metrics;

// =============================================================================
// View Types
// =============================================================================

/// Board status summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStatus {
    /// Market.
    pub market: MarketKey,
    /// Number of symbols in the snapshot.
    pub symbols: usize,
    /// Time of the last successful poll.
    pub last_updated: Option<DateTime<Utc>>,
    /// Error of the last poll, if it failed.
    pub last_error: Option<String>,
    /// Successful polls.
    pub polls: u64,
    /// Failed polls.
    pub errors: u64,
}

impl BoardStatus {
    /// Whether the last poll succeeded.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.last_updated.is_some() && self.last_error.is_none()
    }
}

/// Filtered and sorted board rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    /// Board status at the time of the view.
    #[serde(flatten)]
    pub status: BoardStatus,
    /// Rows matching the filter, before the limit is applied.
    pub matched: usize,
    /// Rows.
    pub rows: Vec<TickerRow>,
}

// =============================================================================
// Board
// =============================================================================

#[derive(Debug, Default)]
struct BoardState {
    tickers: HashMap<String, TickerData>,
    instruments: HashMap<String, Instrument>,
    precision: DecimalPrecisionTracker,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_snapshot_saved: Option<DateTime<Utc>>,
    polls: u64,
    errors: u64,
}

/// Polled ticker board of one market.
pub struct TickerBoard {
    market: MarketKey,
    source: Arc<dyn MarketDataSource>,
    cache: Arc<InstrumentCache>,
    snapshot_interval: Duration,
    state: RwLock<BoardState>,
}

impl std::fmt::Debug for TickerBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerBoard")
            .field("market", &self.market)
            .field("symbols", &self.state.read().tickers.len())
            .finish_non_exhaustive()
    }
}

impl TickerBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new(
        market: MarketKey,
        source: Arc<dyn MarketDataSource>,
        cache: Arc<InstrumentCache>,
        snapshot_interval: Duration,
    ) -> Self {
        Self {
            market,
            source,
            cache,
            snapshot_interval,
            state: RwLock::new(BoardState::default()),
        }
    }

    /// Market of this board.
    #[must_use]
    pub const fn market(&self) -> MarketKey {
        self.market
    }

    /// Load the last persisted snapshots of every cached instrument.
    ///
    /// Primed tickers have no previous price and do not count as a poll.
    /// Returns the number of tickers restored.
    pub fn prime_from_cache(&self) -> usize {
        let Some(cached) = self.cache.load(self.market) else {
            return 0;
        };

        let restored: Vec<TickerData> = cached
            .pairs
            .iter()
            .filter_map(|pair| self.cache.load_snapshot(&pair.raw))
            .filter(|t| t.exchange == self.market.exchange && t.category == self.market.category)
            .collect();

        let mut state = self.state.write();
        for ticker in &restored {
            state
                .precision
                .observe(&ticker.integrated_symbol, ticker.last_price);
        }
        let count = restored.len();
        for mut ticker in restored {
            ticker.previous_price = None;
            state.tickers.insert(ticker.raw_symbol.clone(), ticker);
        }
        drop(state);

        tracing::debug!(market = %self.market, restored = count, "Board primed from cache");
        count
    }

    /// Poll the source once and apply the result.
    ///
    /// # Errors
    ///
    /// Returns the source error after recording it on the board.
    pub async fn refresh(&self) -> Result<usize, SourceError> {
        let started = std::time::Instant::now();
        match self.source.fetch_tickers(self.market.category).await {
            Ok(tickers) => {
                let now = Utc::now();
                let count = self.apply(tickers, now);
                metrics::record_poll(self.market, true, started.elapsed());
                metrics::set_board_symbols(self.market, count);
                self.persist_snapshots_if_due(now).await;
                Ok(count)
            }
            Err(e) => {
                self.record_error(e.to_string());
                metrics::record_poll(self.market, false, started.elapsed());
                Err(e)
            }
        }
    }

    /// Replace the snapshot with a poll response.
    ///
    /// Symbols missing from the response are dropped. Returns the number
    /// of symbols on the board afterwards. Nothing is persisted here; see
    /// [`Self::refresh`].
    pub fn apply(&self, raw_tickers: Vec<RawTicker>, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let mut next = HashMap::with_capacity(raw_tickers.len());

        for raw in raw_tickers {
            let instrument = state
                .instruments
                .entry(raw.raw_symbol.clone())
                .or_insert_with(|| normalize(&raw.raw_symbol, self.market.category))
                .clone();

            state
                .precision
                .observe(&instrument.integrated_symbol, raw.last_price);

            let previous_price = state.tickers.get(&raw.raw_symbol).map(|t| t.last_price);
            let ticker = TickerData {
                exchange: self.market.exchange,
                category: self.market.category,
                change_24h: raw.resolved_change(),
                change_percent_24h: raw.resolved_change_percent(),
                raw_symbol: raw.raw_symbol,
                integrated_symbol: instrument.integrated_symbol,
                base_code: instrument.base_code,
                quote_code: instrument.quote_code,
                quantity: instrument.quantity,
                last_price: raw.last_price,
                previous_price,
                high_24h: raw.high_24h,
                low_24h: raw.low_24h,
                volume_24h: raw.volume_24h,
                turnover_24h: raw.turnover_24h,
                bid: raw.bid,
                ask: raw.ask,
                warning: raw.warning,
                updated_at: now,
            };
            next.insert(ticker.raw_symbol.clone(), ticker);
        }

        state.tickers = next;
        state.last_updated = Some(now);
        state.last_error = None;
        state.polls += 1;
        state.tickers.len()
    }

    /// Persist the current tickers once per snapshot interval.
    async fn persist_snapshots_if_due(&self, now: DateTime<Utc>) {
        let snapshot = {
            let mut state = self.state.write();
            let due = state.last_snapshot_saved.is_none_or(|saved| {
                now.signed_duration_since(saved)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed >= self.snapshot_interval)
            });
            if !due {
                return;
            }
            state.last_snapshot_saved = Some(now);
            state.tickers.values().cloned().collect::<Vec<_>>()
        };

        if let Err(e) = self.cache.save_snapshots(&snapshot).await {
            tracing::warn!(market = %self.market, error = %e, "Failed to persist ticker snapshots");
        }
    }

    /// Record a failed poll, keeping the previous snapshot.
    pub fn record_error(&self, message: String) {
        tracing::warn!(market = %self.market, error = %message, "Ticker poll failed");
        let mut state = self.state.write();
        state.last_error = Some(message);
        state.errors += 1;
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> BoardStatus {
        let state = self.state.read();
        Self::status_of(self.market, &state)
    }

    fn status_of(market: MarketKey, state: &BoardState) -> BoardStatus {
        BoardStatus {
            market,
            symbols: state.tickers.len(),
            last_updated: state.last_updated,
            last_error: state.last_error.clone(),
            polls: state.polls,
            errors: state.errors,
        }
    }

    /// Filtered, sorted and formatted rows.
    #[must_use]
    pub fn view(&self, query: &TickerQuery) -> BoardView {
        let state = self.state.read();

        let mut matching: Vec<&TickerData> = state
            .tickers
            .values()
            .filter(|ticker| query.matches(ticker))
            .collect();
        matching.sort_by(|a, b| query.compare(a, b));
        let matched = matching.len();

        let rows = matching
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|ticker| TickerRow {
                formatted_price: state
                    .precision
                    .format(&ticker.integrated_symbol, ticker.last_price),
                direction: ticker.direction(),
                ticker: ticker.clone(),
            })
            .collect();

        BoardView {
            status: Self::status_of(self.market, &state),
            matched,
            rows,
        }
    }

    /// Snapshot of one symbol.
    #[must_use]
    pub fn ticker(&self, raw_symbol: &str) -> Option<TickerData> {
        self.state.read().tickers.get(raw_symbol).cloned()
    }

    /// All current snapshots, unordered.
    #[must_use]
    pub fn tickers(&self) -> Vec<TickerData> {
        self.state.read().tickers.values().cloned().collect()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// The set of boards served by this process.
#[derive(Debug, Default)]
pub struct BoardRegistry {
    boards: HashMap<MarketKey, Arc<TickerBoard>>,
    order: Vec<MarketKey>,
}

impl BoardRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a board; a board for the same market is replaced.
    pub fn insert(&mut self, board: Arc<TickerBoard>) {
        let market = board.market();
        if self.boards.insert(market, board).is_none() {
            self.order.push(market);
        }
    }

    /// Board of a market.
    #[must_use]
    pub fn get(&self, market: MarketKey) -> Option<Arc<TickerBoard>> {
        self.boards.get(&market).cloned()
    }

    /// Boards in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TickerBoard>> {
        self.order.iter().filter_map(|m| self.boards.get(m))
    }

    /// Status of every board in registration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<BoardStatus> {
        self.iter().map(|b| b.status()).collect()
    }

    /// Number of boards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no boards are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Category, Exchange};
    use crate::application::ports::{KeyValueStore, StorageError};
    use crate::domain::ticker::{PriceDirection, SortKey, SortOrder};
    use crate::infrastructure::storage::MemoryStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    /// Records the threads that wrote to the store.
    #[derive(Default)]
    struct ThreadRecordingStore {
        inner: MemoryStore,
        writers: parking_lot::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl KeyValueStore for ThreadRecordingStore {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set_many(&self, entries: Vec<(String, String)>) -> Result<(), StorageError> {
            self.writers.lock().push(std::thread::current().id());
            self.inner.set_many(entries)
        }

        fn remove_many(&self, keys: Vec<String>) -> Result<(), StorageError> {
            self.writers.lock().push(std::thread::current().id());
            self.inner.remove_many(keys)
        }

        fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
            self.inner.keys_with_prefix(prefix)
        }
    }

    struct StaticSource {
        tickers: parking_lot::Mutex<Result<Vec<RawTicker>, SourceError>>,
    }

    #[async_trait]
    impl MarketDataSource for StaticSource {
        fn exchange(&self) -> Exchange {
            Exchange::Bybit
        }

        fn supports(&self, _category: Category) -> bool {
            true
        }

        async fn fetch_tickers(&self, _category: Category) -> Result<Vec<RawTicker>, SourceError> {
            self.tickers.lock().clone()
        }

        async fn fetch_instruments(
            &self,
            _category: Category,
        ) -> Result<Vec<Instrument>, SourceError> {
            Ok(vec![])
        }
    }

    fn raw(symbol: &str, price: &str, turnover: i64) -> RawTicker {
        let mut t = RawTicker::new(symbol, Decimal::from_str(price).unwrap());
        t.turnover_24h = Some(Decimal::from(turnover));
        t
    }

    fn board_with(source: Arc<StaticSource>, cache: Arc<InstrumentCache>) -> TickerBoard {
        TickerBoard::new(
            MarketKey::new(Exchange::Bybit, Category::Spot),
            source,
            cache,
            Duration::ZERO,
        )
    }

    fn memory_cache() -> Arc<InstrumentCache> {
        Arc::new(InstrumentCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(60),
        ))
    }

    fn source(result: Result<Vec<RawTicker>, SourceError>) -> Arc<StaticSource> {
        Arc::new(StaticSource {
            tickers: parking_lot::Mutex::new(result),
        })
    }

    #[test]
    fn apply_tracks_previous_price_and_precision() {
        let board = board_with(source(Ok(vec![])), memory_cache());

        board.apply(vec![raw("BTCUSDT", "64000.25", 10)], Utc::now());
        board.apply(vec![raw("BTCUSDT", "64001", 10)], Utc::now());

        let view = board.view(&TickerQuery::default());
        assert_eq!(view.rows.len(), 1);
        let row = &view.rows[0];
        assert_eq!(row.ticker.integrated_symbol, "BTC/USDT");
        assert_eq!(row.ticker.previous_price, Decimal::from_str("64000.25").ok());
        assert_eq!(row.direction, PriceDirection::Up);
        assert_eq!(row.formatted_price, "64001.00");
    }

    #[tokio::test]
    async fn failed_poll_keeps_previous_snapshot() {
        let src = source(Ok(vec![raw("ETHUSDT", "3100.5", 5)]));
        let board = board_with(Arc::clone(&src), memory_cache());
        assert_eq!(board.refresh().await.unwrap(), 1);

        *src.tickers.lock() = Err(SourceError::Status {
            status: 503,
            message: "maintenance".to_string(),
        });
        assert!(board.refresh().await.is_err());

        let status = board.status();
        assert_eq!(status.symbols, 1);
        assert_eq!(status.polls, 1);
        assert_eq!(status.errors, 1);
        assert!(status.last_error.unwrap().contains("503"));
        assert!(board.ticker("ETHUSDT").is_some());

        *src.tickers.lock() = Ok(vec![raw("ETHUSDT", "3101", 5)]);
        board.refresh().await.unwrap();
        assert!(board.status().is_healthy());
    }

    #[test]
    fn view_sorts_filters_and_limits() {
        let board = board_with(source(Ok(vec![])), memory_cache());
        board.apply(
            vec![
                raw("BTCUSDT", "64000", 300),
                raw("ETHUSDT", "3100", 200),
                raw("ETHBTC", "0.05", 100),
            ],
            Utc::now(),
        );

        let view = board.view(&TickerQuery::default());
        let symbols: Vec<_> = view
            .rows
            .iter()
            .map(|r| r.ticker.raw_symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "ETHBTC"]);

        let view = board.view(&TickerQuery {
            search: Some("eth".to_string()),
            sort: SortKey::Price,
            order: SortOrder::Asc,
            limit: Some(1),
            ..Default::default()
        });
        assert_eq!(view.matched, 2);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].ticker.raw_symbol, "ETHBTC");
    }

    #[tokio::test]
    async fn snapshots_prime_a_new_board() {
        let cache = memory_cache();
        let market = MarketKey::new(Exchange::Bybit, Category::Spot);
        cache
            .save(
                market,
                &[crate::domain::symbol::normalize("BTCUSDT", Category::Spot)],
                Utc::now(),
            )
            .unwrap();

        let first = board_with(
            source(Ok(vec![raw("BTCUSDT", "64000.5", 1)])),
            Arc::clone(&cache),
        );
        first.refresh().await.unwrap();

        let second = board_with(source(Ok(vec![])), cache);
        assert_eq!(second.prime_from_cache(), 1);
        let view = second.view(&TickerQuery::default());
        assert_eq!(view.rows[0].formatted_price, "64000.5");
        assert_eq!(view.rows[0].direction, PriceDirection::Unchanged);
        assert_eq!(view.status.polls, 0);
    }

    #[test]
    fn apply_alone_persists_nothing() {
        let cache = memory_cache();
        let board = board_with(source(Ok(vec![])), Arc::clone(&cache));
        board.apply(vec![raw("BTCUSDT", "64000", 1)], Utc::now());
        assert_eq!(cache.load_snapshot("BTCUSDT"), None);
    }

    #[tokio::test]
    async fn snapshot_writes_run_off_the_runtime_thread() {
        let store = Arc::new(ThreadRecordingStore::default());
        let cache = Arc::new(InstrumentCache::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Duration::from_secs(60),
        ));
        let board = board_with(source(Ok(vec![raw("BTCUSDT", "64000", 1)])), cache);

        board.refresh().await.unwrap();

        let writers = store.writers.lock().clone();
        assert_eq!(writers.len(), 1);
        assert_ne!(writers[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn snapshots_are_throttled() {
        let store = Arc::new(ThreadRecordingStore::default());
        let cache = Arc::new(InstrumentCache::new(
            Arc::clone(&store) as Arc<dyn KeyValueStore>,
            Duration::from_secs(60),
        ));
        let board = TickerBoard::new(
            MarketKey::new(Exchange::Bybit, Category::Spot),
            source(Ok(vec![raw("BTCUSDT", "64000", 1)])),
            cache,
            Duration::from_secs(3600),
        );

        board.refresh().await.unwrap();
        board.refresh().await.unwrap();
        assert_eq!(store.writers.lock().len(), 1);
        assert_eq!(board.status().polls, 2);
    }

    #[test]
    fn registry_keeps_registration_order() {
        let cache = memory_cache();
        let mut registry = BoardRegistry::new();
        for category in [Category::Linear, Category::Spot] {
            registry.insert(Arc::new(TickerBoard::new(
                MarketKey::new(Exchange::Bybit, category),
                source(Ok(vec![])),
                Arc::clone(&cache),
                Duration::ZERO,
            )));
        }
        let order: Vec<_> = registry.iter().map(|b| b.market().category).collect();
        assert_eq!(order, vec![Category::Linear, Category::Spot]);
        assert_eq!(registry.len(), 2);
    }
}
