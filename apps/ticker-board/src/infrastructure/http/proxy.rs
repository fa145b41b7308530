//! Proxy Routes
//!
//! Each route forwards a single GET to a fixed upstream URL and relays the
//! JSON body unchanged with `Cache-Control: public, max-age=N`. Any upstream
//! failure (network, non-success status, invalid JSON) becomes a 500 with
//! an `{"error": ...}` body; an unknown category is a 400.

use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::Value;

use super::{ApiError, AppState};
use crate::domain::market::Category;
use crate::infrastructure::exchanges::binance::BinanceEndpoint;
use crate::infrastructure::exchanges::{bithumb, bybit};
use crate::infrastructure::metrics::{self, Upstream};

/// Proxy routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/bybit/tickers/{category}", get(bybit_tickers))
        .route("/api/bybit/instruments/{category}", get(bybit_instruments))
        .route("/api/binance/tickers/{category}", get(binance_tickers))
        .route(
            "/api/binance/exchange-info/{category}",
            get(binance_exchange_info),
        )
        .route("/api/bithumb/tickers", get(bithumb_tickers))
        .route("/api/bithumb/orderbook/{currency}", get(bithumb_orderbook))
}

/// Relayed upstream JSON with its cache policy.
#[derive(Debug)]
pub struct Proxied {
    max_age: Duration,
    body: Value,
}

/// `Cache-Control` value for a max-age.
#[must_use]
pub fn cache_control(max_age: Duration) -> String {
    format!("public, max-age={}", max_age.as_secs())
}

impl IntoResponse for Proxied {
    fn into_response(self) -> Response {
        (
            [(header::CACHE_CONTROL, cache_control(self.max_age))],
            Json(self.body),
        )
            .into_response()
    }
}

struct Target<'a> {
    route: &'static str,
    upstream: Upstream,
    url: String,
    query: &'a [(&'a str, &'a str)],
    max_age: Duration,
}

async fn relay(state: &AppState, target: Target<'_>) -> Result<Proxied, ApiError> {
    let result = state
        .client
        .get_json::<Value>(target.upstream, &target.url, target.query)
        .await;
    metrics::record_proxy_request(target.route, result.is_ok());

    Ok(Proxied {
        max_age: target.max_age,
        body: result?,
    })
}

// =============================================================================
// Bybit
// =============================================================================

async fn bybit_tickers(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Proxied, ApiError> {
    let category: Category = category.parse()?;
    relay(
        &state,
        Target {
            route: "bybit_tickers",
            upstream: Upstream::Bybit,
            url: format!("{}{}", state.upstream.bybit, bybit::TICKERS_PATH),
            query: &[("category", category.bybit_name())],
            max_age: state.cache_policy.tickers_max_age,
        },
    )
    .await
}

async fn bybit_instruments(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Proxied, ApiError> {
    let category: Category = category.parse()?;
    relay(
        &state,
        Target {
            route: "bybit_instruments",
            upstream: Upstream::Bybit,
            url: format!("{}{}", state.upstream.bybit, bybit::INSTRUMENTS_PATH),
            query: &[
                ("category", category.bybit_name()),
                ("limit", bybit::INSTRUMENTS_PAGE_LIMIT),
            ],
            max_age: state.cache_policy.instruments_max_age,
        },
    )
    .await
}

// =============================================================================
// Binance
// =============================================================================

fn binance_endpoint(state: &AppState, category: &str) -> Result<BinanceEndpoint, ApiError> {
    let category: Category = category.parse()?;
    BinanceEndpoint::for_category(category, &state.upstream).ok_or_else(|| {
        ApiError::BadRequest(format!("binance does not offer the {category} category"))
    })
}

async fn binance_tickers(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Proxied, ApiError> {
    let endpoint = binance_endpoint(&state, &category)?;
    relay(
        &state,
        Target {
            route: "binance_tickers",
            upstream: endpoint.upstream,
            url: endpoint.tickers_url(),
            query: &[],
            max_age: state.cache_policy.tickers_max_age,
        },
    )
    .await
}

async fn binance_exchange_info(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Proxied, ApiError> {
    let endpoint = binance_endpoint(&state, &category)?;
    relay(
        &state,
        Target {
            route: "binance_exchange_info",
            upstream: endpoint.upstream,
            url: endpoint.exchange_info_url(),
            query: &[],
            max_age: state.cache_policy.instruments_max_age,
        },
    )
    .await
}

// =============================================================================
// Bithumb
// =============================================================================

async fn bithumb_tickers(State(state): State<AppState>) -> Result<Proxied, ApiError> {
    relay(
        &state,
        Target {
            route: "bithumb_tickers",
            upstream: Upstream::Bithumb,
            url: format!("{}{}", state.upstream.bithumb, bithumb::TICKERS_PATH),
            query: &[],
            max_age: state.cache_policy.tickers_max_age,
        },
    )
    .await
}

async fn bithumb_orderbook(
    State(state): State<AppState>,
    Path(currency): Path<String>,
) -> Result<Proxied, ApiError> {
    let currency = validate_currency(&currency)?;
    relay(
        &state,
        Target {
            route: "bithumb_orderbook",
            upstream: Upstream::Bithumb,
            url: format!(
                "{}{}",
                state.upstream.bithumb,
                bithumb::orderbook_path(currency)
            ),
            query: &[],
            max_age: state.cache_policy.tickers_max_age,
        },
    )
    .await
}

/// Currency codes are short ASCII alphanumerics.
pub(crate) fn validate_currency(currency: &str) -> Result<&str, ApiError> {
    let currency = currency.trim();
    if currency.is_empty()
        || currency.len() > 16
        || !currency.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(ApiError::BadRequest(format!(
            "invalid currency code: {currency}"
        )));
    }
    Ok(currency)
}
