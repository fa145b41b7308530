//! KRW Premium
//!
//! Compares Bithumb KRW prices against a USDT-quoted reference board
//! converted at the USD→KRW rate:
//!
//! ```text
//! premium% = (krw_price / (usdt_price * usd_krw) - 1) * 100
//! ```
//!
//! USDT is treated as USD. The view is empty until a rate is known.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::ports::{ExchangeRateSource, SourceError};
use crate::application::services::board::TickerBoard;
use crate::domain::ticker::TickerData;

const KRW: &str = "KRW";
const USDT: &str = "USDT";
const USD: &str = "USD";

/// Latest USD→KRW rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateQuote {
    /// KRW per USD.
    pub rate: Decimal,
    /// Time the rate was fetched.
    pub updated_at: DateTime<Utc>,
}

/// Premium of one base code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumRow {
    /// Base code present on both boards.
    pub base_code: String,
    /// Bithumb KRW price.
    pub krw_price: Decimal,
    /// Reference USDT price.
    pub usdt_price: Decimal,
    /// Reference price converted to KRW.
    pub converted_krw: Decimal,
    /// KRW difference between the two prices.
    pub premium_krw: Decimal,
    /// Premium in percent, two decimals.
    pub premium_percent: Decimal,
}

/// Premium table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumView {
    /// Rate used, if known.
    pub rate: Option<RateQuote>,
    /// Rows ordered by base code.
    pub rows: Vec<PremiumRow>,
}

/// Compute premium rows for every base code quoted in KRW on `krw_tickers`
/// and in USDT on `usdt_tickers`.
///
/// Symbols with a quantity multiplier or a zero price are skipped.
#[must_use]
pub fn compute_premium(
    krw_tickers: &[TickerData],
    usdt_tickers: &[TickerData],
    usd_krw: Decimal,
) -> Vec<PremiumRow> {
    if usd_krw <= Decimal::ZERO {
        return Vec::new();
    }

    let reference: HashMap<&str, Decimal> = usdt_tickers
        .iter()
        .filter(|t| t.quote_code == USDT && t.quantity == 1 && !t.last_price.is_zero())
        .map(|t| (t.base_code.as_str(), t.last_price))
        .collect();

    let mut rows: Vec<PremiumRow> = krw_tickers
        .iter()
        .filter(|t| t.quote_code == KRW && t.quantity == 1)
        .filter_map(|t| {
            let usdt_price = *reference.get(t.base_code.as_str())?;
            let converted_krw = usdt_price * usd_krw;
            let premium_percent =
                ((t.last_price / converted_krw - Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2);
            Some(PremiumRow {
                base_code: t.base_code.clone(),
                krw_price: t.last_price,
                usdt_price,
                converted_krw: converted_krw.round_dp(2),
                premium_krw: (t.last_price - converted_krw).round_dp(2),
                premium_percent,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.base_code.cmp(&b.base_code));
    rows
}

/// Holds the USD→KRW rate and builds the premium view from two boards.
pub struct PremiumService {
    rates: Arc<dyn ExchangeRateSource>,
    krw_board: Option<Arc<TickerBoard>>,
    usdt_board: Option<Arc<TickerBoard>>,
    rate: RwLock<Option<RateQuote>>,
}

impl std::fmt::Debug for PremiumService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiumService")
            .field("rate", &*self.rate.read())
            .finish_non_exhaustive()
    }
}

impl PremiumService {
    /// Create a service; either board may be absent when not configured.
    #[must_use]
    pub fn new(
        rates: Arc<dyn ExchangeRateSource>,
        krw_board: Option<Arc<TickerBoard>>,
        usdt_board: Option<Arc<TickerBoard>>,
    ) -> Self {
        Self {
            rates,
            krw_board,
            usdt_board,
            rate: RwLock::new(None),
        }
    }

    /// Latest known rate.
    #[must_use]
    pub fn rate(&self) -> Option<RateQuote> {
        *self.rate.read()
    }

    /// Replace the rate.
    pub fn set_rate(&self, rate: Decimal, updated_at: DateTime<Utc>) {
        *self.rate.write() = Some(RateQuote { rate, updated_at });
    }

    /// Fetch the USD→KRW rate once. A failure keeps the previous rate.
    ///
    /// # Errors
    ///
    /// Returns the source error.
    pub async fn refresh_rate(&self) -> Result<Decimal, SourceError> {
        match self.rates.fetch_rate(USD, KRW).await {
            Ok(rate) => {
                tracing::debug!(%rate, "USD/KRW rate updated");
                self.set_rate(rate, Utc::now());
                Ok(rate)
            }
            Err(e) => {
                tracing::warn!(error = %e, "USD/KRW rate refresh failed");
                Err(e)
            }
        }
    }

    /// Current premium table.
    #[must_use]
    pub fn view(&self) -> PremiumView {
        let rate = self.rate();
        let rows = match (rate, &self.krw_board, &self.usdt_board) {
            (Some(quote), Some(krw), Some(usdt)) => {
                compute_premium(&krw.tickers(), &usdt.tickers(), quote.rate)
            }
            _ => Vec::new(),
        };
        PremiumView { rate, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Category, Exchange};
    use crate::domain::ticker::fixtures::ticker;
    use async_trait::async_trait;
    use std::str::FromStr;

    fn krw(symbol: &str, price: i64) -> TickerData {
        let mut t = ticker(symbol, price, None);
        t.exchange = Exchange::Bithumb;
        t.category = Category::Spot;
        t
    }

    struct FixedRate(Result<Decimal, SourceError>);

    #[async_trait]
    impl ExchangeRateSource for FixedRate {
        async fn fetch_rate(&self, _base: &str, _quote: &str) -> Result<Decimal, SourceError> {
            self.0.clone()
        }
    }

    #[test]
    fn premium_against_converted_reference() {
        let rows = compute_premium(
            &[krw("BTC_KRW", 103_000_000), krw("XRP_KRW", 900)],
            &[ticker("BTCUSDT", 75_000, None), ticker("ETHUSDT", 3_000, None)],
            Decimal::from(1_350),
        );

        assert_eq!(rows.len(), 1);
        let btc = &rows[0];
        assert_eq!(btc.base_code, "BTC");
        assert_eq!(btc.converted_krw, Decimal::from(101_250_000));
        assert_eq!(btc.premium_krw, Decimal::from(1_750_000));
        assert_eq!(btc.premium_percent, Decimal::from_str("1.73").unwrap());
    }

    #[test]
    fn discount_is_negative() {
        let rows = compute_premium(
            &[krw("ETH_KRW", 3_960_000)],
            &[ticker("ETHUSDT", 3_000, None)],
            Decimal::from(1_350),
        );
        assert_eq!(rows[0].premium_percent, Decimal::from_str("-2.22").unwrap());
    }

    #[test]
    fn non_positive_rate_yields_nothing() {
        let rows = compute_premium(
            &[krw("BTC_KRW", 1)],
            &[ticker("BTCUSDT", 1, None)],
            Decimal::ZERO,
        );
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_rate() {
        let service = PremiumService::new(
            Arc::new(FixedRate(Err(SourceError::Network("timeout".to_string())))),
            None,
            None,
        );
        assert!(service.view().rate.is_none());

        service.set_rate(Decimal::from(1_350), Utc::now());
        assert!(service.refresh_rate().await.is_err());
        assert_eq!(service.rate().map(|q| q.rate), Some(Decimal::from(1_350)));
        assert!(service.view().rows.is_empty());
    }

    #[tokio::test]
    async fn refresh_stores_rate() {
        let service = PremiumService::new(
            Arc::new(FixedRate(Ok(Decimal::from(1_380)))),
            None,
            None,
        );
        assert_eq!(service.refresh_rate().await.unwrap(), Decimal::from(1_380));
        assert_eq!(service.rate().map(|q| q.rate), Some(Decimal::from(1_380)));
    }
}
