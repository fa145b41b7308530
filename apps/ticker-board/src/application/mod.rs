//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for exchanges, rate providers and storage.
pub mod ports;

/// Boards, instrument cache, premium and settings services.
pub mod services;
