//! Domain Layer - Core market types and pure display logic.
//!
//! This layer contains the core domain types for ticker boards with no
//! I/O. All types here are pure Rust with serialization support.

/// Exchanges and market categories.
pub mod market;

/// Symbol normalization (raw exchange symbol to display form).
pub mod symbol;

/// Per-symbol decimal precision tracking for stable price formatting.
pub mod precision;

/// Ticker snapshots and board views.
pub mod ticker;

/// Display settings persisted alongside the instrument cache.
pub mod settings;
