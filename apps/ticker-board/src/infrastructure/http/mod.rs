//! HTTP API (Driver Adapter)
//!
//! Axum router serving two groups of routes on the API port:
//!
//! - [`proxy`]: forwards one GET to a fixed upstream URL and relays the JSON
//!   with a `Cache-Control` header
//! - [`boards`]: board views, premium, settings and the instrument cache

pub mod boards;
pub mod error;
pub mod proxy;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::{ApiError, ErrorBody};

use crate::application::ports::MarketDataSource;
use crate::application::services::{BoardRegistry, InstrumentCache, PremiumService, SettingsService};
use crate::domain::market::Exchange;
use crate::infrastructure::config::UpstreamSettings;
use crate::infrastructure::exchanges::BithumbSource;
use crate::infrastructure::upstream::UpstreamClient;

/// `Cache-Control` max-ages of proxied responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Ticker responses.
    pub tickers_max_age: Duration,
    /// Instrument and exchange info responses.
    pub instruments_max_age: Duration,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Upstream client used by the proxy routes.
    pub client: UpstreamClient,
    /// Upstream base URLs.
    pub upstream: Arc<UpstreamSettings>,
    /// Proxy caching policy.
    pub cache_policy: CachePolicy,
    /// Boards.
    pub boards: Arc<BoardRegistry>,
    /// Instrument cache.
    pub instruments: Arc<InstrumentCache>,
    /// Market data sources by exchange.
    pub sources: Arc<HashMap<Exchange, Arc<dyn MarketDataSource>>>,
    /// Bithumb source for order book quotes.
    pub bithumb: BithumbSource,
    /// Premium view, when both boards it compares are configured.
    pub premium: Option<Arc<PremiumService>>,
    /// Display settings.
    pub settings: Arc<SettingsService>,
}

/// Create the HTTP router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(proxy::routes())
        .merge(boards::routes())
        .with_state(state)
}

/// API HTTP server.
pub struct ApiServer {
    port: u16,
    state: AppState,
    cancel: CancellationToken,
}

impl ApiServer {
    /// Create a new API server.
    #[must_use]
    pub const fn new(port: u16, state: AppState, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the API server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the server fails while running.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let app = create_router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind API server to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("API server error: {0}")]
    ServerFailed(String),
}
