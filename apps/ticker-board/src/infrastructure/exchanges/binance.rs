//! Binance spot, USDⓈ-M and COIN-M public market APIs.

use async_trait::async_trait;
use serde::Deserialize;

use super::lenient_decimal;
use crate::application::ports::{MarketDataSource, SourceError};
use crate::domain::market::{Category, Exchange};
use crate::domain::symbol::{Instrument, normalize};
use crate::domain::ticker::RawTicker;
use crate::infrastructure::config::UpstreamSettings;
use crate::infrastructure::metrics::Upstream;
use crate::infrastructure::upstream::UpstreamClient;

/// Base URL, upstream label and paths of one Binance market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinanceEndpoint {
    /// Base URL.
    pub base_url: String,
    /// Metrics label.
    pub upstream: Upstream,
    /// 24h ticker path.
    pub tickers_path: &'static str,
    /// Exchange info path.
    pub exchange_info_path: &'static str,
}

impl BinanceEndpoint {
    /// Endpoint of a category; options are not offered.
    #[must_use]
    pub fn for_category(category: Category, settings: &UpstreamSettings) -> Option<Self> {
        let (base_url, upstream, prefix) = match category {
            Category::Spot => (&settings.binance_spot, Upstream::BinanceSpot, Prefix::Spot),
            Category::Linear => (&settings.binance_um, Upstream::BinanceUm, Prefix::Um),
            Category::Inverse => (&settings.binance_cm, Upstream::BinanceCm, Prefix::Cm),
            Category::Option => return None,
        };
        Some(Self {
            base_url: base_url.clone(),
            upstream,
            tickers_path: prefix.tickers_path(),
            exchange_info_path: prefix.exchange_info_path(),
        })
    }

    /// Full 24h ticker URL.
    #[must_use]
    pub fn tickers_url(&self) -> String {
        format!("{}{}", self.base_url, self.tickers_path)
    }

    /// Full exchange info URL.
    #[must_use]
    pub fn exchange_info_url(&self) -> String {
        format!("{}{}", self.base_url, self.exchange_info_path)
    }
}

#[derive(Clone, Copy)]
enum Prefix {
    Spot,
    Um,
    Cm,
}

impl Prefix {
    const fn tickers_path(self) -> &'static str {
        match self {
            Self::Spot => "/api/v3/ticker/24hr",
            Self::Um => "/fapi/v1/ticker/24hr",
            Self::Cm => "/dapi/v1/ticker/24hr",
        }
    }

    const fn exchange_info_path(self) -> &'static str {
        match self {
            Self::Spot => "/api/v3/exchangeInfo",
            Self::Um => "/fapi/v1/exchangeInfo",
            Self::Cm => "/dapi/v1/exchangeInfo",
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    last_price: Option<String>,
    price_change: Option<String>,
    price_change_percent: Option<String>,
    open_price: Option<String>,
    high_price: Option<String>,
    low_price: Option<String>,
    volume: Option<String>,
    /// Spot and USDⓈ-M turnover in quote currency.
    quote_volume: Option<String>,
    /// COIN-M turnover in base currency.
    base_volume: Option<String>,
    bid_price: Option<String>,
    ask_price: Option<String>,
}

impl BinanceTicker {
    fn into_raw(self) -> Option<RawTicker> {
        let last_price = lenient_decimal(self.last_price.as_deref())?;
        let mut ticker = RawTicker::new(self.symbol, last_price);
        ticker.change_24h = lenient_decimal(self.price_change.as_deref());
        ticker.change_percent_24h = lenient_decimal(self.price_change_percent.as_deref());
        ticker.open_price_24h = lenient_decimal(self.open_price.as_deref());
        ticker.high_24h = lenient_decimal(self.high_price.as_deref());
        ticker.low_24h = lenient_decimal(self.low_price.as_deref());
        ticker.volume_24h = lenient_decimal(self.volume.as_deref());
        ticker.turnover_24h = lenient_decimal(self.quote_volume.as_deref())
            .or_else(|| lenient_decimal(self.base_volume.as_deref()));
        ticker.bid = lenient_decimal(self.bid_price.as_deref());
        ticker.ask = lenient_decimal(self.ask_price.as_deref());
        Some(ticker)
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    /// Spot and USDⓈ-M.
    status: Option<String>,
    /// COIN-M.
    contract_status: Option<String>,
}

impl SymbolInfo {
    fn is_trading(&self) -> bool {
        self.status
            .as_deref()
            .or(self.contract_status.as_deref())
            .is_none_or(|s| s == "TRADING")
    }
}

// =============================================================================
// Source
// =============================================================================

/// Binance market data source covering spot, USDⓈ-M and COIN-M.
#[derive(Debug, Clone)]
pub struct BinanceSource {
    client: UpstreamClient,
    settings: UpstreamSettings,
}

impl BinanceSource {
    /// Create a source using the Binance base URLs of `settings`.
    #[must_use]
    pub fn new(client: UpstreamClient, settings: &UpstreamSettings) -> Self {
        Self {
            client,
            settings: settings.clone(),
        }
    }

    fn endpoint(&self, category: Category) -> Result<BinanceEndpoint, SourceError> {
        BinanceEndpoint::for_category(category, &self.settings).ok_or(
            SourceError::UnsupportedCategory {
                exchange: Exchange::Binance,
                category,
            },
        )
    }
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn supports(&self, category: Category) -> bool {
        !matches!(category, Category::Option)
    }

    async fn fetch_tickers(&self, category: Category) -> Result<Vec<RawTicker>, SourceError> {
        let endpoint = self.endpoint(category)?;
        let tickers: Vec<BinanceTicker> = self
            .client
            .get_json(endpoint.upstream, &endpoint.tickers_url(), &[])
            .await?;
        Ok(tickers
            .into_iter()
            .filter_map(BinanceTicker::into_raw)
            .collect())
    }

    async fn fetch_instruments(&self, category: Category) -> Result<Vec<Instrument>, SourceError> {
        let endpoint = self.endpoint(category)?;
        let info: ExchangeInfo = self
            .client
            .get_json(endpoint.upstream, &endpoint.exchange_info_url(), &[])
            .await?;
        Ok(info
            .symbols
            .into_iter()
            .filter(SymbolInfo::is_trading)
            .map(|s| normalize(&s.symbol, category))
            .collect())
    }
}
