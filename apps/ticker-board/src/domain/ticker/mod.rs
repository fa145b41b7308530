//! Ticker Types
//!
//! [`RawTicker`] is what an exchange adapter produces from one poll
//! response. A board turns it into [`TickerData`] by attaching the
//! normalized symbol and the previous price, then serves [`TickerRow`]s
//! through a [`TickerQuery`].

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::{Category, Exchange};

// =============================================================================
// Tickers
// =============================================================================

/// Ticker as parsed from an exchange response, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTicker {
    /// Exchange-native symbol.
    pub raw_symbol: String,
    /// Last traded price.
    pub last_price: Decimal,
    /// Absolute 24h change, when the exchange reports it.
    pub change_24h: Option<Decimal>,
    /// 24h change in percent, when the exchange reports it.
    pub change_percent_24h: Option<Decimal>,
    /// Price 24h ago (used to derive the change when not reported).
    pub open_price_24h: Option<Decimal>,
    /// 24h high.
    pub high_24h: Option<Decimal>,
    /// 24h low.
    pub low_24h: Option<Decimal>,
    /// 24h base volume.
    pub volume_24h: Option<Decimal>,
    /// 24h quote turnover.
    pub turnover_24h: Option<Decimal>,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Exchange-supplied warning (delivery, caution flags).
    pub warning: Option<String>,
}

impl RawTicker {
    /// Create a ticker with only a symbol and last price.
    #[must_use]
    pub fn new(raw_symbol: impl Into<String>, last_price: Decimal) -> Self {
        Self {
            raw_symbol: raw_symbol.into(),
            last_price,
            change_24h: None,
            change_percent_24h: None,
            open_price_24h: None,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
            turnover_24h: None,
            bid: None,
            ask: None,
            warning: None,
        }
    }

    /// Absolute 24h change, derived from the open price when not reported.
    #[must_use]
    pub fn resolved_change(&self) -> Option<Decimal> {
        self.change_24h
            .or_else(|| self.open_price_24h.map(|open| self.last_price - open))
    }

    /// 24h change in percent, derived from the open price when not reported.
    #[must_use]
    pub fn resolved_change_percent(&self) -> Option<Decimal> {
        if self.change_percent_24h.is_some() {
            return self.change_percent_24h;
        }
        let open = self.open_price_24h.filter(|open| !open.is_zero())?;
        Some(((self.last_price - open) / open * Decimal::ONE_HUNDRED).round_dp(2))
    }
}

/// Normalized ticker snapshot for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerData {
    /// Source exchange.
    pub exchange: Exchange,
    /// Market category.
    pub category: Category,
    /// Exchange-native symbol.
    pub raw_symbol: String,
    /// Display symbol.
    pub integrated_symbol: String,
    /// Base code.
    pub base_code: String,
    /// Quote code.
    pub quote_code: String,
    /// Quantity multiplier.
    pub quantity: u64,
    /// Last traded price.
    pub last_price: Decimal,
    /// Last price of the previous snapshot.
    pub previous_price: Option<Decimal>,
    /// Absolute 24h change.
    pub change_24h: Option<Decimal>,
    /// 24h change in percent.
    pub change_percent_24h: Option<Decimal>,
    /// 24h high.
    pub high_24h: Option<Decimal>,
    /// 24h low.
    pub low_24h: Option<Decimal>,
    /// 24h volume.
    pub volume_24h: Option<Decimal>,
    /// 24h turnover.
    pub turnover_24h: Option<Decimal>,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Warning metadata.
    pub warning: Option<String>,
    /// Time the snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

impl TickerData {
    /// Direction of the last move relative to the previous snapshot.
    #[must_use]
    pub fn direction(&self) -> PriceDirection {
        PriceDirection::between(self.previous_price, self.last_price)
    }
}

/// Price move between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceDirection {
    /// Price rose.
    Up,
    /// Price fell.
    Down,
    /// Unchanged, or no previous price.
    Unchanged,
}

impl PriceDirection {
    /// Compare a previous price with the current one.
    #[must_use]
    pub fn between(previous: Option<Decimal>, current: Decimal) -> Self {
        match previous.map(|prev| current.cmp(&prev)) {
            Some(Ordering::Greater) => Self::Up,
            Some(Ordering::Less) => Self::Down,
            Some(Ordering::Equal) | None => Self::Unchanged,
        }
    }
}

// =============================================================================
// Views
// =============================================================================

/// Sort column for board views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Display symbol.
    Symbol,
    /// Last price.
    Price,
    /// 24h change percent.
    Change,
    /// 24h volume.
    Volume,
    /// 24h turnover.
    #[default]
    Turnover,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "symbol" => Ok(Self::Symbol),
            "price" => Ok(Self::Price),
            "change" => Ok(Self::Change),
            "volume" => Ok(Self::Volume),
            "turnover" => Ok(Self::Turnover),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    #[default]
    Desc,
}

/// Filter and sort options for a board view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerQuery {
    /// Case-insensitive substring match on display or raw symbol.
    pub search: Option<String>,
    /// Exact quote code filter.
    pub quote: Option<String>,
    /// Sort column.
    #[serde(default)]
    pub sort: SortKey,
    /// Sort direction.
    #[serde(default)]
    pub order: SortOrder,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

impl TickerQuery {
    /// Whether a ticker passes the search and quote filters.
    #[must_use]
    pub fn matches(&self, ticker: &TickerData) -> bool {
        if let Some(quote) = self.quote.as_deref().filter(|q| !q.is_empty())
            && !ticker.quote_code.eq_ignore_ascii_case(quote)
        {
            return false;
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(needle) => {
                let needle = needle.to_uppercase();
                ticker.integrated_symbol.to_uppercase().contains(&needle)
                    || ticker.raw_symbol.to_uppercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Order two tickers by the selected column and direction.
    ///
    /// Missing values sort last regardless of direction; ties fall back to
    /// the display symbol so views are stable between polls.
    #[must_use]
    pub fn compare(&self, a: &TickerData, b: &TickerData) -> Ordering {
        let primary = match self.sort {
            SortKey::Symbol => Some(a.integrated_symbol.cmp(&b.integrated_symbol)),
            SortKey::Price => Some(a.last_price.cmp(&b.last_price)),
            SortKey::Change => compare_optional(a.change_percent_24h, b.change_percent_24h),
            SortKey::Volume => compare_optional(a.volume_24h, b.volume_24h),
            SortKey::Turnover => compare_optional(a.turnover_24h, b.turnover_24h),
        };

        let ordering = match primary {
            Some(ordering) => match self.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            },
            None => match (self.value_present(a), self.value_present(b)) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            },
        };

        ordering.then_with(|| a.integrated_symbol.cmp(&b.integrated_symbol))
    }

    fn value_present(&self, ticker: &TickerData) -> bool {
        match self.sort {
            SortKey::Symbol | SortKey::Price => true,
            SortKey::Change => ticker.change_percent_24h.is_some(),
            SortKey::Volume => ticker.volume_24h.is_some(),
            SortKey::Turnover => ticker.turnover_24h.is_some(),
        }
    }
}

fn compare_optional(a: Option<Decimal>, b: Option<Decimal>) -> Option<Ordering> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => None,
    }
}

/// One row of a board view, ready for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerRow {
    /// Snapshot.
    #[serde(flatten)]
    pub ticker: TickerData,
    /// Last price rendered with the tracked precision.
    pub formatted_price: String,
    /// Move relative to the previous snapshot.
    pub direction: PriceDirection,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn ticker(symbol: &str, price: i64, turnover: Option<i64>) -> TickerData {
        let instrument = crate::domain::symbol::normalize(symbol, Category::Spot);
        TickerData {
            exchange: Exchange::Bybit,
            category: Category::Spot,
            raw_symbol: symbol.to_string(),
            integrated_symbol: instrument.integrated_symbol,
            base_code: instrument.base_code,
            quote_code: instrument.quote_code,
            quantity: instrument.quantity,
            last_price: Decimal::from(price),
            previous_price: None,
            change_24h: None,
            change_percent_24h: None,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
            turnover_24h: turnover.map(Decimal::from),
            bid: None,
            ask: None,
            warning: None,
            updated_at: Utc::now(),
        }
    }
}
