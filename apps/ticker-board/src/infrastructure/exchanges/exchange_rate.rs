//! ExchangeRate-API open access endpoint (`/v6/latest/{BASE}`).

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::application::ports::{ExchangeRateSource, SourceError};
use crate::infrastructure::metrics::Upstream;
use crate::infrastructure::upstream::UpstreamClient;

/// Latest rates endpoint of a base currency.
#[must_use]
pub fn latest_path(base: &str) -> String {
    format!("/v6/latest/{}", base.to_uppercase())
}

#[derive(Debug, Deserialize)]
struct LatestRates {
    result: String,
    #[serde(default, rename = "error-type")]
    error_type: Option<String>,
    #[serde(default)]
    rates: HashMap<String, serde_json::Number>,
}

/// Fiat rates from ExchangeRate-API.
#[derive(Debug, Clone)]
pub struct ExchangeRateApiSource {
    client: UpstreamClient,
    base_url: String,
}

impl ExchangeRateApiSource {
    /// Create a source against a base URL such as `https://open.er-api.com`.
    #[must_use]
    pub const fn new(client: UpstreamClient, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl ExchangeRateSource for ExchangeRateApiSource {
    async fn fetch_rate(&self, base: &str, quote: &str) -> Result<Decimal, SourceError> {
        let url = format!("{}{}", self.base_url, latest_path(base));
        let latest: LatestRates = self
            .client
            .get_json(Upstream::ExchangeRate, &url, &[])
            .await?;

        if latest.result != "success" {
            return Err(SourceError::Api {
                code: latest.result,
                message: latest.error_type.unwrap_or_default(),
            });
        }

        let quote = quote.to_uppercase();
        let number = latest
            .rates
            .get(&quote)
            .ok_or_else(|| SourceError::NotFound(format!("rate {base}/{quote}")))?;

        // Numbers go through their text form so no binary float rounding
        // leaks into the decimal.
        let text = number.to_string();
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .map_err(|e| SourceError::Decode(format!("rate {text}: {e}")))
    }
}
