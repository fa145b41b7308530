//! Exchanges and Market Categories
//!
//! Every exchange names its market segments differently. Bybit uses
//! `spot`/`linear`/`inverse`/`option`, Binance splits futures into USDⓈ-M
//! (`um`) and COIN-M (`cm`). Internally a single [`Category`] is used and
//! rendered with the integrated names `spot`/`um`/`cm`/`option`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    /// Bybit (v5 public market API).
    Bybit,
    /// Binance (spot, USDⓈ-M and COIN-M futures).
    Binance,
    /// Bithumb (KRW spot market).
    Bithumb,
}

impl Exchange {
    /// All supported exchanges.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Bybit, Self::Binance, Self::Bithumb]
    }

    /// Lowercase exchange name used in routes and storage keys.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bybit => "bybit",
            Self::Binance => "binance",
            Self::Bithumb => "bithumb",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = MarketParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bybit" => Ok(Self::Bybit),
            "binance" => Ok(Self::Binance),
            "bithumb" => Ok(Self::Bithumb),
            other => Err(MarketParseError::UnknownExchange(other.to_string())),
        }
    }
}

/// Market category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Spot market.
    Spot,
    /// Linear (quote-margined) perpetuals and futures.
    #[serde(rename = "um")]
    Linear,
    /// Inverse (coin-margined) perpetuals and futures.
    #[serde(rename = "cm")]
    Inverse,
    /// Options.
    Option,
}

impl Category {
    /// All categories.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Spot, Self::Linear, Self::Inverse, Self::Option]
    }

    /// Integrated name (`spot`, `um`, `cm`, `option`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "um",
            Self::Inverse => "cm",
            Self::Option => "option",
        }
    }

    /// Bybit v5 category name.
    #[must_use]
    pub const fn bybit_name(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "linear",
            Self::Inverse => "inverse",
            Self::Option => "option",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MarketParseError;

    /// Accepts both the integrated names and the Bybit names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spot" => Ok(Self::Spot),
            "um" | "linear" => Ok(Self::Linear),
            "cm" | "inverse" => Ok(Self::Inverse),
            "option" => Ok(Self::Option),
            other => Err(MarketParseError::UnknownCategory(other.to_string())),
        }
    }
}

/// A board is identified by exchange and category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    /// Exchange.
    pub exchange: Exchange,
    /// Category.
    pub category: Category,
}

impl MarketKey {
    /// Create a new market key.
    #[must_use]
    pub const fn new(exchange: Exchange, category: Category) -> Self {
        Self { exchange, category }
    }

    /// Storage key prefix, `<exchange>-<category>`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}-{}", self.exchange, self.category)
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.category)
    }
}

impl FromStr for MarketKey {
    type Err = MarketParseError;

    /// Parses `exchange:category`, e.g. `bybit:spot`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (exchange, category) = s
            .split_once(':')
            .ok_or_else(|| MarketParseError::InvalidMarketKey(s.to_string()))?;
        Ok(Self::new(exchange.parse()?, category.parse()?))
    }
}

/// Error parsing exchange or category names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketParseError {
    /// Unknown exchange name.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),
    /// Unknown category name.
    #[error("unknown category: {0}")]
    UnknownCategory(String),
    /// Market key not in `exchange:category` form.
    #[error("invalid market key (expected exchange:category): {0}")]
    InvalidMarketKey(String),
}
