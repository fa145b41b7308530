//! Bybit v5 public market API.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::lenient_decimal;
use crate::application::ports::{MarketDataSource, SourceError};
use crate::domain::market::{Category, Exchange};
use crate::domain::symbol::{Instrument, normalize};
use crate::domain::ticker::RawTicker;
use crate::infrastructure::metrics::Upstream;
use crate::infrastructure::upstream::UpstreamClient;

/// Tickers endpoint.
pub const TICKERS_PATH: &str = "/v5/market/tickers";
/// Instruments endpoint.
pub const INSTRUMENTS_PATH: &str = "/v5/market/instruments-info";
/// Page size requested from the instruments endpoint.
pub const INSTRUMENTS_PAGE_LIMIT: &str = "1000";

const MAX_INSTRUMENT_PAGES: usize = 20;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<ListResult<T>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResult<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
    #[serde(default)]
    next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTicker {
    symbol: String,
    last_price: Option<String>,
    prev_price_24h: Option<String>,
    price_24h_pcnt: Option<String>,
    /// Options report the 24h change fraction here instead.
    change_24h: Option<String>,
    high_price_24h: Option<String>,
    low_price_24h: Option<String>,
    volume_24h: Option<String>,
    turnover_24h: Option<String>,
    bid1_price: Option<String>,
    ask1_price: Option<String>,
    delivery_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitInstrument {
    symbol: String,
    #[serde(default)]
    status: Option<String>,
}

impl BybitTicker {
    fn into_raw(self) -> Option<RawTicker> {
        let last_price = lenient_decimal(self.last_price.as_deref())?;
        let change_fraction = lenient_decimal(self.price_24h_pcnt.as_deref())
            .or_else(|| lenient_decimal(self.change_24h.as_deref()));

        let mut ticker = RawTicker::new(self.symbol, last_price);
        ticker.open_price_24h = lenient_decimal(self.prev_price_24h.as_deref());
        ticker.change_percent_24h = change_fraction.map(|f| (f * Decimal::ONE_HUNDRED).round_dp(2));
        ticker.high_24h = lenient_decimal(self.high_price_24h.as_deref());
        ticker.low_24h = lenient_decimal(self.low_price_24h.as_deref());
        ticker.volume_24h = lenient_decimal(self.volume_24h.as_deref());
        ticker.turnover_24h = lenient_decimal(self.turnover_24h.as_deref());
        ticker.bid = lenient_decimal(self.bid1_price.as_deref());
        ticker.ask = lenient_decimal(self.ask1_price.as_deref());
        ticker.warning = delivery_warning(self.delivery_time.as_deref());
        Some(ticker)
    }
}

/// Dated contracts carry a delivery timestamp in milliseconds; perpetuals
/// send `0`.
fn delivery_warning(delivery_time: Option<&str>) -> Option<String> {
    let millis: i64 = delivery_time?.trim().parse().ok()?;
    if millis <= 0 {
        return None;
    }
    let at = DateTime::from_timestamp_millis(millis)?;
    Some(format!(
        "delivery at {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ))
}

// =============================================================================
// Source
// =============================================================================

/// Bybit market data source.
#[derive(Debug, Clone)]
pub struct BybitSource {
    client: UpstreamClient,
    base_url: String,
}

impl BybitSource {
    /// Create a source against a base URL such as `https://api.bybit.com`.
    #[must_use]
    pub const fn new(client: UpstreamClient, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<ListResult<T>, SourceError> {
        let envelope: Envelope<T> = self
            .client
            .get_json(Upstream::Bybit, &format!("{}{path}", self.base_url), query)
            .await?;

        if envelope.ret_code != 0 {
            return Err(SourceError::Api {
                code: envelope.ret_code.to_string(),
                message: envelope.ret_msg,
            });
        }
        envelope
            .result
            .ok_or_else(|| SourceError::Decode("response has no result".to_string()))
    }
}

#[async_trait]
impl MarketDataSource for BybitSource {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    fn supports(&self, _category: Category) -> bool {
        true
    }

    async fn fetch_tickers(&self, category: Category) -> Result<Vec<RawTicker>, SourceError> {
        let result: ListResult<BybitTicker> = self
            .get_list(TICKERS_PATH, &[("category", category.bybit_name())])
            .await?;
        Ok(result
            .list
            .into_iter()
            .filter_map(BybitTicker::into_raw)
            .collect())
    }

    async fn fetch_instruments(&self, category: Category) -> Result<Vec<Instrument>, SourceError> {
        let mut instruments = Vec::new();
        let mut cursor = String::new();

        for _ in 0..MAX_INSTRUMENT_PAGES {
            let mut query = vec![
                ("category", category.bybit_name()),
                ("limit", INSTRUMENTS_PAGE_LIMIT),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.as_str()));
            }

            let page: ListResult<BybitInstrument> = self.get_list(INSTRUMENTS_PATH, &query).await?;
            instruments.extend(
                page.list
                    .into_iter()
                    .filter(|i| i.status.as_deref().is_none_or(|s| s == "Trading"))
                    .map(|i| normalize(&i.symbol, category)),
            );

            match page.next_page_cursor.filter(|c| !c.is_empty()) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        Ok(instruments)
    }
}
