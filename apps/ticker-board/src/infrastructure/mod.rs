//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the HTTP surfaces and pollers.

/// Configuration loaded from the environment.
pub mod config;

/// Exchange and exchange-rate API adapters.
pub mod exchanges;

/// Health check HTTP endpoint.
pub mod health;

/// Proxy and board HTTP API.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Periodic polling tasks.
pub mod poller;

/// Key/value store adapters.
pub mod storage;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Shared HTTP client for upstream APIs.
pub mod upstream;
