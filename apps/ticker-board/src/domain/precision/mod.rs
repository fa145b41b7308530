//! Decimal Precision Tracking
//!
//! Remembers, per display symbol, the largest number of fractional digits
//! seen in its price. Prices are then rendered with that many decimals so a
//! value such as `0.1` following `0.125` shows as `0.100` instead of
//! visibly losing precision between polls.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};

/// Upper bound on tracked fractional digits.
pub const MAX_TRACKED_DECIMALS: u32 = 18;

/// Fractional digit count of a value, ignoring trailing zeros.
#[must_use]
pub fn fractional_digits(value: Decimal) -> u32 {
    value.normalize().scale().min(MAX_TRACKED_DECIMALS)
}

/// Per-symbol maximum observed decimal precision.
///
/// The stored value for a symbol never decreases.
#[derive(Debug, Default, Clone)]
pub struct DecimalPrecisionTracker {
    max_decimals: HashMap<String, u32>,
}

impl DecimalPrecisionTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed price and return the (possibly raised) maximum.
    pub fn observe(&mut self, symbol: &str, value: Decimal) -> u32 {
        let digits = fractional_digits(value);
        if let Some(current) = self.max_decimals.get_mut(symbol) {
            if digits > *current {
                *current = digits;
            }
            return *current;
        }
        self.max_decimals.insert(symbol.to_string(), digits);
        digits
    }

    /// Maximum observed decimals for a symbol, if any were observed.
    #[must_use]
    pub fn decimals(&self, symbol: &str) -> Option<u32> {
        self.max_decimals.get(symbol).copied()
    }

    /// Render a value with the tracked number of decimals.
    ///
    /// Symbols never observed are rendered with the value's own precision.
    #[must_use]
    pub fn format(&self, symbol: &str, value: Decimal) -> String {
        let decimals = self
            .decimals(symbol)
            .unwrap_or_else(|| fractional_digits(value));
        format_fixed(value, decimals)
    }

    /// Number of tracked symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.max_decimals.len()
    }

    /// Whether nothing has been tracked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.max_decimals.is_empty()
    }
}

/// Render a value with exactly `decimals` fractional digits.
#[must_use]
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", decimals as usize, rounded)
}
