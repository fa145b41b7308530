#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Ticker Board - Crypto Ticker Proxy and Boards
//!
//! An HTTP service that relays public exchange market APIs with cache
//! headers and keeps polled ticker boards with normalized symbols, stable
//! price precision and a cached instrument list.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure market types and display logic
//!   - `market`: Exchanges, categories and market keys
//!   - `symbol`: Raw symbol normalization
//!   - `precision`: Per-symbol decimal precision tracking
//!   - `ticker`: Ticker snapshots, rows and queries
//!   - `settings`: Display settings
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Market data, exchange rate and key/value store interfaces
//!   - `services`: Boards, instrument cache, premium and settings
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `exchanges`: Bybit, Binance, Bithumb and ExchangeRate-API clients
//!   - `http`: Proxy endpoints and board API
//!   - `poller`: Periodic refresh tasks
//!   - `storage`: In-memory and file-backed key/value stores
//!   - `config`, `health`, `metrics`, `telemetry`, `upstream`
//!
//! # Data Flow
//!
//! ```text
//! Bybit ────┐                   ┌─────────────┐
//!           │     ┌────────┐    │ TickerBoard │──► /api/boards
//! Binance ──┼────►│ Poller │───►│  (per mkt)  │──► /api/premium
//!           │     └────────┘    └──────┬──────┘
//! Bithumb ──┘                          ▼
//!                               ┌─────────────┐
//!                               │  KV store   │ instruments, snapshots,
//!                               └─────────────┘ settings
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market types and display logic with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{Category, Exchange, MarketKey};
pub use domain::precision::DecimalPrecisionTracker;
pub use domain::symbol::{Instrument, normalize};
pub use domain::ticker::{RawTicker, TickerData, TickerQuery, TickerRow};

// Application services
pub use application::services::{
    BoardRegistry, BoardStatus, InstrumentCache, PremiumService, SettingsService, TickerBoard,
};

// Infrastructure config
pub use infrastructure::config::{BoardConfig, ConfigError};

// HTTP servers
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};
pub use infrastructure::http::{ApiServer, ApiServerError, AppState, create_router};

// Pollers
pub use infrastructure::poller::{PollTarget, PollerHandle};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
