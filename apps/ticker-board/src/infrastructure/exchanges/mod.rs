//! Exchange Adapters
//!
//! Implementations of [`MarketDataSource`] for each supported exchange and
//! of [`ExchangeRateSource`] for ExchangeRate-API. Every adapter issues a
//! single GET per call through the shared [`UpstreamClient`].
//!
//! [`MarketDataSource`]: crate::application::ports::MarketDataSource
//! [`ExchangeRateSource`]: crate::application::ports::ExchangeRateSource
//! [`UpstreamClient`]: crate::infrastructure::upstream::UpstreamClient

pub mod binance;
pub mod bithumb;
pub mod bybit;
pub mod exchange_rate;

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;

pub use binance::BinanceSource;
pub use bithumb::{BestQuote, BithumbSource};
pub use bybit::BybitSource;
pub use exchange_rate::ExchangeRateApiSource;

use crate::application::ports::MarketDataSource;
use crate::domain::market::Exchange;
use crate::infrastructure::config::UpstreamSettings;
use crate::infrastructure::upstream::UpstreamClient;

/// Build the source of an exchange.
#[must_use]
pub fn source_for(
    exchange: Exchange,
    client: &UpstreamClient,
    settings: &UpstreamSettings,
) -> Arc<dyn MarketDataSource> {
    match exchange {
        Exchange::Bybit => Arc::new(BybitSource::new(client.clone(), settings.bybit.clone())),
        Exchange::Binance => Arc::new(BinanceSource::new(client.clone(), settings)),
        Exchange::Bithumb => Arc::new(BithumbSource::new(client.clone(), settings.bithumb.clone())),
    }
}

/// Parse a decimal from an exchange string field.
///
/// Exchanges send empty strings for missing values; those, and anything
/// unparseable, become `None`.
pub(crate) fn lenient_decimal(value: Option<&str>) -> Option<Decimal> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_decimal_handles_exchange_quirks() {
        assert_eq!(lenient_decimal(Some("64000.10")), Decimal::from_str("64000.10").ok());
        assert_eq!(lenient_decimal(Some("")), None);
        assert_eq!(lenient_decimal(Some("  ")), None);
        assert_eq!(lenient_decimal(None), None);
        assert_eq!(lenient_decimal(Some("1e-5")), Decimal::from_str("0.00001").ok());
        assert_eq!(lenient_decimal(Some("n/a")), None);
    }
}
