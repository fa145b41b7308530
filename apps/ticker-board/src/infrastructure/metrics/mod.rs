//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Upstream**: requests to exchange and rate APIs by outcome, latency
//! - **Proxy**: requests served by the proxy routes
//! - **Boards**: poll cycles by outcome, poll duration, symbol counts
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::domain::market::MarketKey;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)] // Startup-only; a missing recorder is unrecoverable
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Upstream
    describe_counter!(
        "ticker_board_upstream_requests_total",
        "Total requests to upstream APIs by outcome"
    );
    describe_histogram!(
        "ticker_board_upstream_request_seconds",
        "Upstream request latency"
    );

    // Proxy
    describe_counter!(
        "ticker_board_proxy_requests_total",
        "Total proxy route requests by outcome"
    );

    // Boards
    describe_counter!(
        "ticker_board_polls_total",
        "Total board poll cycles by outcome"
    );
    describe_histogram!(
        "ticker_board_poll_seconds",
        "Time to fetch and apply one board poll"
    );
    describe_gauge!(
        "ticker_board_symbols",
        "Number of symbols on each board"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for upstream APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Bybit v5 market API.
    Bybit,
    /// Binance spot API.
    BinanceSpot,
    /// Binance USDⓈ-M futures API.
    BinanceUm,
    /// Binance COIN-M futures API.
    BinanceCm,
    /// Bithumb public API.
    Bithumb,
    /// ExchangeRate-API.
    ExchangeRate,
}

impl Upstream {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bybit => "bybit",
            Self::BinanceSpot => "binance_spot",
            Self::BinanceUm => "binance_um",
            Self::BinanceCm => "binance_cm",
            Self::Bithumb => "bithumb",
            Self::ExchangeRate => "exchange_rate",
        }
    }
}

const fn outcome(success: bool) -> &'static str {
    if success { "ok" } else { "error" }
}

/// Record one upstream request.
pub fn record_upstream_request(upstream: Upstream, success: bool, duration: Duration) {
    counter!(
        "ticker_board_upstream_requests_total",
        "upstream" => upstream.as_str(),
        "outcome" => outcome(success)
    )
    .increment(1);
    histogram!(
        "ticker_board_upstream_request_seconds",
        "upstream" => upstream.as_str()
    )
    .record(duration.as_secs_f64());
}

/// Record one proxy route request.
pub fn record_proxy_request(route: &'static str, success: bool) {
    counter!(
        "ticker_board_proxy_requests_total",
        "route" => route,
        "outcome" => outcome(success)
    )
    .increment(1);
}

/// Record one board poll cycle.
pub fn record_poll(market: MarketKey, success: bool, duration: Duration) {
    counter!(
        "ticker_board_polls_total",
        "market" => market.to_string(),
        "outcome" => outcome(success)
    )
    .increment(1);
    histogram!(
        "ticker_board_poll_seconds",
        "market" => market.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Update the symbol count of a board.
#[allow(clippy::cast_precision_loss)]
pub fn set_board_symbols(market: MarketKey, count: usize) {
    gauge!(
        "ticker_board_symbols",
        "market" => market.to_string()
    )
    .set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_as_str() {
        assert_eq!(Upstream::Bybit.as_str(), "bybit");
        assert_eq!(Upstream::BinanceSpot.as_str(), "binance_spot");
        assert_eq!(Upstream::BinanceUm.as_str(), "binance_um");
        assert_eq!(Upstream::BinanceCm.as_str(), "binance_cm");
        assert_eq!(Upstream::Bithumb.as_str(), "bithumb");
        assert_eq!(Upstream::ExchangeRate.as_str(), "exchange_rate");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(outcome(true), "ok");
        assert_eq!(outcome(false), "error");
    }
}
