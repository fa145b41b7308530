//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `InstrumentCache`: instrument lists and ticker snapshots in the store
//! - `TickerBoard` / `BoardRegistry`: polled per-market ticker snapshots
//! - `PremiumService`: KRW premium of Bithumb over a reference board
//! - `SettingsService`: display preferences in the store

pub mod board;
pub mod instrument_cache;
pub mod premium;
pub mod settings;

pub use board::{BoardRegistry, BoardStatus, BoardView, TickerBoard};
pub use instrument_cache::{CachedInstruments, InstrumentCache, RefreshReport, SymbolPair};
pub use premium::{PremiumRow, PremiumService, PremiumView};
pub use settings::SettingsService;
