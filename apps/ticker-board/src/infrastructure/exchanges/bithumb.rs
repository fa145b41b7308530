//! Bithumb public API (KRW spot market).
//!
//! `ticker/ALL_KRW` returns one object per currency keyed by the currency
//! code plus a `date` string; raw symbols are built as `<CUR>_KRW`.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::lenient_decimal;
use crate::application::ports::{MarketDataSource, SourceError};
use crate::domain::market::{Category, Exchange};
use crate::domain::symbol::{Instrument, normalize};
use crate::domain::ticker::RawTicker;
use crate::infrastructure::metrics::Upstream;
use crate::infrastructure::upstream::UpstreamClient;

/// All-KRW ticker endpoint.
pub const TICKERS_PATH: &str = "/public/ticker/ALL_KRW";

/// Order book endpoint of one currency.
#[must_use]
pub fn orderbook_path(currency: &str) -> String {
    format!("/public/orderbook/{}_KRW", currency.to_uppercase())
}

const SUCCESS_STATUS: &str = "0000";

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BithumbTicker {
    opening_price: Option<String>,
    closing_price: Option<String>,
    min_price: Option<String>,
    max_price: Option<String>,
    #[serde(rename = "units_traded_24H")]
    units_traded_24h: Option<String>,
    #[serde(rename = "acc_trade_value_24H")]
    acc_trade_value_24h: Option<String>,
    #[serde(rename = "fluctate_24H")]
    fluctate_24h: Option<String>,
    #[serde(rename = "fluctate_rate_24H")]
    fluctate_rate_24h: Option<String>,
}

impl BithumbTicker {
    fn into_raw(self, currency: &str) -> Option<RawTicker> {
        let last_price = lenient_decimal(self.closing_price.as_deref())?;
        let mut ticker = RawTicker::new(format!("{currency}_KRW"), last_price);
        ticker.open_price_24h = lenient_decimal(self.opening_price.as_deref());
        ticker.change_24h = lenient_decimal(self.fluctate_24h.as_deref());
        ticker.change_percent_24h = lenient_decimal(self.fluctate_rate_24h.as_deref());
        ticker.high_24h = lenient_decimal(self.max_price.as_deref());
        ticker.low_24h = lenient_decimal(self.min_price.as_deref());
        ticker.volume_24h = lenient_decimal(self.units_traded_24h.as_deref());
        ticker.turnover_24h = lenient_decimal(self.acc_trade_value_24h.as_deref());
        Some(ticker)
    }
}

#[derive(Debug, Deserialize)]
struct OrderBook {
    #[serde(default)]
    bids: Vec<OrderBookLevel>,
    #[serde(default)]
    asks: Vec<OrderBookLevel>,
}

#[derive(Debug, Deserialize)]
struct OrderBookLevel {
    price: String,
}

/// Best bid and ask of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestQuote {
    /// Highest bid.
    pub bid: Option<Decimal>,
    /// Lowest ask.
    pub ask: Option<Decimal>,
}

// =============================================================================
// Source
// =============================================================================

/// Bithumb market data source (spot only).
#[derive(Debug, Clone)]
pub struct BithumbSource {
    client: UpstreamClient,
    base_url: String,
}

impl BithumbSource {
    /// Create a source against a base URL such as `https://api.bithumb.com`.
    #[must_use]
    pub const fn new(client: UpstreamClient, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, SourceError> {
        let envelope: Envelope<T> = self
            .client
            .get_json(Upstream::Bithumb, &format!("{}{path}", self.base_url), &[])
            .await?;

        if envelope.status != SUCCESS_STATUS {
            return Err(SourceError::Api {
                code: envelope.status,
                message: envelope.message.unwrap_or_default(),
            });
        }
        envelope
            .data
            .ok_or_else(|| SourceError::Decode("response has no data".to_string()))
    }

    async fn fetch_all(&self) -> Result<Vec<RawTicker>, SourceError> {
        let data: HashMap<String, serde_json::Value> = self.get_data(TICKERS_PATH).await?;

        let mut tickers: Vec<RawTicker> = data
            .into_iter()
            .filter(|(_, value)| value.is_object())
            .filter_map(|(currency, value)| {
                serde_json::from_value::<BithumbTicker>(value)
                    .inspect_err(|e| {
                        tracing::debug!(%currency, error = %e, "Skipping malformed Bithumb ticker");
                    })
                    .ok()?
                    .into_raw(&currency)
            })
            .collect();
        tickers.sort_by(|a, b| a.raw_symbol.cmp(&b.raw_symbol));
        Ok(tickers)
    }

    /// Best bid and ask of one currency from its order book.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Bithumb reports an error
    /// status (unknown currencies included).
    pub async fn best_quote(&self, currency: &str) -> Result<BestQuote, SourceError> {
        let book: OrderBook = self.get_data(&orderbook_path(currency)).await?;
        let best = |levels: &[OrderBookLevel]| {
            levels
                .first()
                .and_then(|level| lenient_decimal(Some(level.price.as_str())))
        };
        Ok(BestQuote {
            bid: best(&book.bids),
            ask: best(&book.asks),
        })
    }
}

#[async_trait]
impl MarketDataSource for BithumbSource {
    fn exchange(&self) -> Exchange {
        Exchange::Bithumb
    }

    fn supports(&self, category: Category) -> bool {
        matches!(category, Category::Spot)
    }

    async fn fetch_tickers(&self, category: Category) -> Result<Vec<RawTicker>, SourceError> {
        if !self.supports(category) {
            return Err(SourceError::UnsupportedCategory {
                exchange: Exchange::Bithumb,
                category,
            });
        }
        self.fetch_all().await
    }

    /// Bithumb has no instrument endpoint; the ticker list doubles as one.
    async fn fetch_instruments(&self, category: Category) -> Result<Vec<Instrument>, SourceError> {
        Ok(self
            .fetch_tickers(category)
            .await?
            .iter()
            .map(|t| normalize(&t.raw_symbol, category))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_with(server: &MockServer) -> BithumbSource {
        BithumbSource::new(
            UpstreamClient::new(Duration::from_secs(2)).unwrap(),
            server.uri(),
        )
    }

    #[tokio::test]
    async fn all_krw_tickers_are_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TICKERS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0000",
                "data": {
                    "BTC": {
                        "opening_price": "101000000",
                        "closing_price": "103000000",
                        "min_price": "100500000",
                        "max_price": "103500000",
                        "units_traded_24H": "1520.3",
                        "acc_trade_value_24H": "155000000000.5",
                        "fluctate_24H": "2000000",
                        "fluctate_rate_24H": "1.98"
                    },
                    "XRP": { "closing_price": "905.5" },
                    "date": "1717000000000"
                }
            })))
            .mount(&server)
            .await;

        let source = source_with(&server);
        let tickers = source.fetch_tickers(Category::Spot).await.unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].raw_symbol, "BTC_KRW");
        assert_eq!(tickers[0].change_percent_24h, Decimal::from_str("1.98").ok());
        assert_eq!(tickers[1].raw_symbol, "XRP_KRW");

        let instruments = source.fetch_instruments(Category::Spot).await.unwrap();
        assert_eq!(instruments[0].integrated_symbol, "BTC/KRW");
    }

    #[tokio::test]
    async fn error_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "5600",
                "message": "Please try again"
            })))
            .mount(&server)
            .await;

        let err = source_with(&server)
            .fetch_tickers(Category::Spot)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Api { ref code, .. } if code == "5600"));
    }

    #[tokio::test]
    async fn best_quote_from_orderbook() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/public/orderbook/ETH_KRW"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "0000",
                "data": {
                    "order_currency": "ETH",
                    "payment_currency": "KRW",
                    "bids": [{ "price": "4100000", "quantity": "1.2" }],
                    "asks": [{ "price": "4101000", "quantity": "0.5" }]
                }
            })))
            .mount(&server)
            .await;

        let quote = source_with(&server).best_quote("eth").await.unwrap();
        assert_eq!(quote.bid, Some(Decimal::from(4_100_000)));
        assert_eq!(quote.ask, Some(Decimal::from(4_101_000)));
    }

    #[tokio::test]
    async fn derivatives_are_unsupported() {
        let server = MockServer::start().await;
        let err = source_with(&server)
            .fetch_tickers(Category::Linear)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedCategory { .. }));
    }
}
