//! Configuration Module
//!
//! Configuration loading for the ticker board service.

mod settings;

pub use settings::{
    BoardConfig, CacheSettings, ConfigError, PollSettings, ServerSettings, UpstreamSettings,
    is_supported,
};
