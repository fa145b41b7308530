//! Ticker Board Binary
//!
//! Starts the exchange proxy, the ticker board pollers and the health server.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-board
//! ```
//!
//! # Environment Variables
//!
//! All optional.
//! - `TICKER_BOARD_BOARDS`: Comma separated `exchange:category` list
//!   (default: `bybit:spot,bybit:linear,binance:spot,bithumb:spot`)
//! - `TICKER_BOARD_API_PORT`: Proxy and board API port (default: 8080)
//! - `TICKER_BOARD_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `TICKER_BOARD_POLL_INTERVAL_MS`: Default poll interval for every exchange
//! - `TICKER_BOARD_{BYBIT,BINANCE,BITHUMB}_POLL_MS`: Per-exchange poll intervals
//! - `TICKER_BOARD_RATE_POLL_SECS`: USD→KRW refresh interval (default: 600)
//! - `TICKER_BOARD_STORE_PATH`: Key/value store file (default: ticker-board-store.json)
//! - `TICKER_BOARD_INSTRUMENT_CACHE_TTL_SECS`: Instrument list lifetime (default: 86400)
//! - `TICKER_BOARD_SNAPSHOT_INTERVAL_SECS`: Snapshot write interval (default: 30)
//! - `TICKER_BOARD_TICKERS_MAX_AGE_SECS`, `TICKER_BOARD_INSTRUMENTS_MAX_AGE_SECS`:
//!   `Cache-Control` max-age of proxied responses
//! - `TICKER_BOARD_HTTP_TIMEOUT_MS`: Upstream request timeout (default: 5000)
//! - `BYBIT_BASE_URL`, `BINANCE_{SPOT,UM,CM}_BASE_URL`, `BITHUMB_BASE_URL`,
//!   `EXCHANGE_RATE_BASE_URL`: Upstream overrides
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: ticker-board)
//! - `RUST_LOG`: Log level (default: info)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use ticker_board::application::ports::{KeyValueStore, MarketDataSource};
use ticker_board::infrastructure::exchanges::{BithumbSource, ExchangeRateApiSource, source_for};
use ticker_board::infrastructure::http::CachePolicy;
use ticker_board::infrastructure::storage::FileStore;
use ticker_board::infrastructure::telemetry;
use ticker_board::infrastructure::upstream::UpstreamClient;
use ticker_board::{
    ApiServer, AppState, BoardConfig, BoardRegistry, Category, Exchange, HealthServer,
    HealthServerState, InstrumentCache, MarketKey, PollerHandle, PremiumService, SettingsService,
    TickerBoard, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Ticker Board");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = BoardConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Persistent key/value store
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.cache.store_path)?);
    let instruments = Arc::new(InstrumentCache::new(
        Arc::clone(&store),
        config.cache.instrument_ttl,
    ));
    let settings = Arc::new(SettingsService::new(Arc::clone(&store)));

    // Upstream sources, one per configured exchange
    let client = UpstreamClient::new(config.upstream.timeout)?;
    let sources: HashMap<Exchange, Arc<dyn MarketDataSource>> = Exchange::all()
        .iter()
        .map(|&exchange| (exchange, source_for(exchange, &client, &config.upstream)))
        .collect();

    refresh_stale_instruments(&config, &sources, &instruments).await;

    // Boards, primed from the cached instrument list
    let mut registry = BoardRegistry::new();
    for &market in &config.boards {
        let Some(source) = sources.get(&market.exchange) else {
            continue;
        };
        let board = TickerBoard::new(
            market,
            Arc::clone(source),
            Arc::clone(&instruments),
            config.cache.snapshot_interval,
        );
        let restored = board.prime_from_cache();
        tracing::info!(market = %market, restored, "Board created");
        registry.insert(Arc::new(board));
    }
    let registry = Arc::new(registry);

    // KRW premium compares the Bithumb KRW board with the Bybit USDT board
    let krw_market = MarketKey::new(Exchange::Bithumb, Category::Spot);
    let usdt_market = MarketKey::new(Exchange::Bybit, Category::Spot);
    let premium = (config.has_board(krw_market) && config.has_board(usdt_market)).then(|| {
        let rates = Arc::new(ExchangeRateApiSource::new(
            client.clone(),
            config.upstream.exchange_rate.clone(),
        ));
        Arc::new(PremiumService::new(
            rates,
            registry.get(krw_market),
            registry.get(usdt_market),
        ))
    });

    // Pollers
    let mut pollers: Vec<PollerHandle> = registry
        .iter()
        .map(|board| {
            let interval = config.poll.interval_for(board.market().exchange);
            PollerHandle::spawn(board.clone(), interval, &shutdown_token)
        })
        .collect();
    if let Some(premium) = &premium {
        pollers.push(PollerHandle::spawn(
            premium.clone(),
            config.poll.rate,
            &shutdown_token,
        ));
    }
    tracing::info!(pollers = pollers.len(), "Pollers started");

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&registry),
        premium.clone(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Initialize API server
    let app_state = AppState {
        client: client.clone(),
        upstream: Arc::new(config.upstream.clone()),
        cache_policy: CachePolicy {
            tickers_max_age: config.cache.tickers_max_age,
            instruments_max_age: config.cache.instruments_max_age,
        },
        boards: Arc::clone(&registry),
        instruments: Arc::clone(&instruments),
        sources: Arc::new(sources),
        bithumb: BithumbSource::new(client, config.upstream.bithumb.clone()),
        premium,
        settings,
    };
    let api_server = ApiServer::new(config.server.api_port, app_state, shutdown_token.clone());

    // Spawn health server
    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn API server
    let api_task = tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "API server error");
        }
    });

    tracing::info!("Ticker board ready");

    await_shutdown(shutdown_token).await;

    let drain = async {
        join_all(pollers.into_iter().map(PollerHandle::stop)).await;
        let _ = tokio::join!(health_task, api_task);
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Shutdown timed out"
        );
    }

    tracing::info!("Ticker board stopped");
    Ok(())
}

/// Refresh instrument lists that are missing or older than the cache TTL.
///
/// Exchanges are refreshed concurrently; a failure leaves the previous list
/// in place and the boards start with whatever is cached.
async fn refresh_stale_instruments(
    config: &BoardConfig,
    sources: &HashMap<Exchange, Arc<dyn MarketDataSource>>,
    instruments: &InstrumentCache,
) {
    let now = Utc::now();
    let refreshes = sources.iter().filter_map(|(&exchange, source)| {
        let stale: Vec<Category> = config
            .categories_for(exchange)
            .into_iter()
            .filter(|&category| instruments.is_stale(MarketKey::new(exchange, category), now))
            .collect();
        (!stale.is_empty()).then(|| async move { instruments.refresh(source.as_ref(), &stale).await })
    });

    for report in join_all(refreshes).await {
        if !report.is_success() {
            tracing::warn!(
                exchange = report.exchange.as_str(),
                failed = report.failed.len(),
                "Starting with stale instrument cache"
            );
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &BoardConfig) {
    let boards: Vec<String> = config.boards.iter().map(ToString::to_string).collect();
    tracing::info!(
        boards = %boards.join(","),
        api_port = config.server.api_port,
        health_port = config.server.health_port,
        store_path = %config.cache.store_path.display(),
        "Configuration loaded"
    );
    tracing::debug!(
        bybit = %config.upstream.bybit,
        binance_spot = %config.upstream.binance_spot,
        binance_um = %config.upstream.binance_um,
        binance_cm = %config.upstream.binance_cm,
        bithumb = %config.upstream.bithumb,
        exchange_rate = %config.upstream.exchange_rate,
        "Upstream endpoints"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
