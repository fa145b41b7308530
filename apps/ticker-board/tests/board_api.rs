//! Board API Integration Tests
//!
//! Tests board refresh and views, the instrument cache routes, display
//! settings and health readiness through the HTTP routers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ticker_board::application::ports::KeyValueStore;
use ticker_board::infrastructure::config::UpstreamSettings;
use ticker_board::infrastructure::exchanges::{BithumbSource, source_for};
use ticker_board::infrastructure::health;
use ticker_board::infrastructure::http::CachePolicy;
use ticker_board::infrastructure::storage::MemoryStore;
use ticker_board::infrastructure::upstream::UpstreamClient;
use ticker_board::{
    AppState, BoardRegistry, Category, Exchange, HealthServerState, InstrumentCache, MarketKey,
    SettingsService, TickerBoard, create_router,
};

struct TestApp {
    router: Router,
    registry: Arc<BoardRegistry>,
    store: Arc<MemoryStore>,
}

/// Build the API with a Bybit spot board against the mock server.
fn setup_app(server: &MockServer) -> TestApp {
    let upstream = UpstreamSettings {
        bybit: server.uri(),
        bithumb: server.uri(),
        timeout: Duration::from_secs(2),
        ..UpstreamSettings::default()
    };
    let client = UpstreamClient::new(upstream.timeout).unwrap();
    let store = Arc::new(MemoryStore::new());
    let kv: Arc<dyn KeyValueStore> = store.clone();
    let instruments = Arc::new(InstrumentCache::new(
        Arc::clone(&kv),
        Duration::from_secs(86_400),
    ));
    let sources = Exchange::all()
        .iter()
        .map(|&exchange| (exchange, source_for(exchange, &client, &upstream)))
        .collect::<HashMap<_, _>>();

    let market = MarketKey::new(Exchange::Bybit, Category::Spot);
    let mut registry = BoardRegistry::new();
    registry.insert(Arc::new(TickerBoard::new(
        market,
        Arc::clone(&sources[&Exchange::Bybit]),
        Arc::clone(&instruments),
        Duration::from_secs(30),
    )));
    let registry = Arc::new(registry);

    let router = create_router(AppState {
        client: client.clone(),
        bithumb: BithumbSource::new(client, upstream.bithumb.clone()),
        upstream: Arc::new(upstream),
        cache_policy: CachePolicy {
            tickers_max_age: Duration::from_secs(1),
            instruments_max_age: Duration::from_secs(3_600),
        },
        boards: Arc::clone(&registry),
        instruments,
        sources: Arc::new(sources),
        premium: None,
        settings: Arc::new(SettingsService::new(kv)),
    });

    TestApp {
        router,
        registry,
        store,
    }
}

async fn mount_bybit_spot(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v5/market/tickers"))
        .and(query_param("category", "spot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "result": {
                "list": [
                    { "symbol": "BTCUSDT", "lastPrice": "64000.5", "turnover24h": "900000000" },
                    { "symbol": "ETHUSDT", "lastPrice": "3000.25", "turnover24h": "400000000" },
                    { "symbol": "ETHBTC", "lastPrice": "0.0469", "turnover24h": "120" }
                ]
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v5/market/instruments-info"))
        .and(query_param("category", "spot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "result": {
                "list": [
                    { "symbol": "BTCUSDT", "status": "Trading" },
                    { "symbol": "ETHUSDT", "status": "Trading" }
                ],
                "nextPageCursor": ""
            }
        })))
        .mount(server)
        .await;
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, value)
}

#[tokio::test]
async fn refresh_then_view_board() {
    let server = MockServer::start().await;
    mount_bybit_spot(&server).await;
    let app = setup_app(&server);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/boards/bybit/spot/refresh",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbols"], 3);
    assert_eq!(body["polls"], 1);
    assert!(body["lastError"].is_null());

    let (status, body) = send(
        &app.router,
        Method::GET,
        "/api/boards/bybit/spot?quote=usdt&sort=price&order=asc",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"], 2);
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows[0]["integratedSymbol"], "ETH/USDT");
    assert_eq!(rows[0]["formattedPrice"], "3000.25");
    assert_eq!(rows[1]["integratedSymbol"], "BTC/USDT");

    let (_, body) = send(&app.router, Method::GET, "/api/boards/bybit/spot?limit=1", None).await;
    assert_eq!(body["matched"], 3);
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["rows"][0]["rawSymbol"], "BTCUSDT");
}

#[tokio::test]
async fn board_errors_map_to_status_codes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let app = setup_app(&server);

    let (status, _) = send(&app.router, Method::GET, "/api/boards/binance/spot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, Method::GET, "/api/boards/bybit/spot?sort=mood", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/api/boards/bybit/spot/refresh",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (_, boards) = send(&app.router, Method::GET, "/api/boards", None).await;
    assert_eq!(boards[0]["errors"], 1);
    assert!(boards[0]["lastError"].is_string());
}

#[tokio::test]
async fn instrument_cache_refresh_and_read() {
    let server = MockServer::start().await;
    mount_bybit_spot(&server).await;
    let app = setup_app(&server);

    let (status, _) = send(&app.router, Method::GET, "/api/instruments/bybit/spot", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app.router, Method::POST, "/api/instruments/bybit/refresh", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, Method::GET, "/api/instruments/bybit/spot", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pairs"].as_array().unwrap().len(), 2);

    // Nothing configured for Binance
    let (status, _) = send(&app.router, Method::POST, "/api/instruments/binance/refresh", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_round_trip_through_store() {
    let server = MockServer::start().await;
    let app = setup_app(&server);

    let (status, body) = send(&app.router, Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["colorMode"], "green-up");

    let update = json!({
        "colorMode": "red-up",
        "animationDurationMs": 300,
        "showChangePercent": false,
        "showPremiumPercent": true
    });
    let (status, _) = send(&app.router, Method::PUT, "/api/settings", Some(update.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.get("color-mode").as_deref(), Some("red-up"));

    let (_, body) = send(&app.router, Method::GET, "/api/settings", None).await;
    assert_eq!(body, update);

    let too_slow = json!({
        "colorMode": "red-up",
        "animationDurationMs": 60_000,
        "showChangePercent": false,
        "showPremiumPercent": true
    });
    let (status, _) = send(&app.router, Method::PUT, "/api/settings", Some(too_slow)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn premium_needs_both_boards() {
    let server = MockServer::start().await;
    let app = setup_app(&server);

    let (status, body) = send(&app.router, Method::GET, "/api/premium", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn readiness_follows_board_contents() {
    let server = MockServer::start().await;
    mount_bybit_spot(&server).await;
    let app = setup_app(&server);
    let health = health::router(Arc::new(HealthServerState::new(
        "test".to_string(),
        Arc::clone(&app.registry),
        None,
    )));

    let (status, _) = send(&health, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let board = app
        .registry
        .get(MarketKey::new(Exchange::Bybit, Category::Spot))
        .unwrap();
    board.refresh().await.unwrap();

    let (status, _) = send(&health, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&health, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
