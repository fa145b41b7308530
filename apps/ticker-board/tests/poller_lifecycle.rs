//! Poller Lifecycle Integration Tests
//!
//! Tests that pollers refresh boards on their interval, never overlap
//! fetches, and stop for good once stopped or dropped.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ticker_board::infrastructure::exchanges::BybitSource;
use ticker_board::infrastructure::storage::MemoryStore;
use ticker_board::infrastructure::upstream::UpstreamClient;
use ticker_board::{
    Category, Exchange, InstrumentCache, MarketKey, PollTarget, PollerHandle, TickerBoard,
};

/// Target whose fetch takes longer than the poll interval.
#[derive(Default)]
struct SlowTarget {
    polls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl PollTarget for SlowTarget {
    fn label(&self) -> String {
        "slow".to_string()
    }

    async fn poll_once(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.polls.fetch_add(1, Ordering::SeqCst);
    }
}

async fn bybit_board(server: &MockServer) -> Arc<TickerBoard> {
    Mock::given(method("GET"))
        .and(path("/v5/market/tickers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "retCode": 0,
            "result": { "list": [{ "symbol": "BTCUSDT", "lastPrice": "64000" }] }
        })))
        .mount(server)
        .await;

    let client = UpstreamClient::new(Duration::from_secs(2)).unwrap();
    Arc::new(TickerBoard::new(
        MarketKey::new(Exchange::Bybit, Category::Spot),
        Arc::new(BybitSource::new(client, server.uri())),
        Arc::new(InstrumentCache::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(86_400),
        )),
        Duration::from_secs(30),
    ))
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |r| r.len())
}

#[tokio::test]
async fn board_poller_refreshes_until_stopped() {
    let server = MockServer::start().await;
    let board = bybit_board(&server).await;
    let shutdown = CancellationToken::new();

    let handle = PollerHandle::spawn(board.clone(), Duration::from_millis(20), &shutdown);
    assert_eq!(handle.label(), "bybit:spot");

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(request_count(&server).await >= 2);
    assert_eq!(board.status().symbols, 1);

    handle.stop().await;
    let stopped_at = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(request_count(&server).await, stopped_at);
}

#[tokio::test]
async fn dropping_the_handle_stops_polling() {
    let server = MockServer::start().await;
    let board = bybit_board(&server).await;
    let shutdown = CancellationToken::new();

    let handle = PollerHandle::spawn(board, Duration::from_millis(20), &shutdown);
    tokio::time::sleep(Duration::from_millis(60)).await;
    drop(handle);

    // Let an in-flight fetch settle
    tokio::time::sleep(Duration::from_millis(50)).await;
    let dropped_at = request_count(&server).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(request_count(&server).await, dropped_at);
}

#[tokio::test]
async fn slow_fetches_never_overlap() {
    let target = Arc::new(SlowTarget::default());
    let shutdown = CancellationToken::new();

    let handle = PollerHandle::spawn(target.clone(), Duration::from_millis(5), &shutdown);
    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.stop().await;

    assert!(target.polls.load(Ordering::SeqCst) >= 2);
    assert_eq!(target.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_token_stops_every_poller() {
    let shutdown = CancellationToken::new();
    let first = Arc::new(SlowTarget::default());
    let second = Arc::new(SlowTarget::default());

    let handles = [
        PollerHandle::spawn(first, Duration::from_millis(10), &shutdown),
        PollerHandle::spawn(second, Duration::from_millis(10), &shutdown),
    ];
    shutdown.cancel();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(handles.iter().all(|h| !h.is_running()));
}
