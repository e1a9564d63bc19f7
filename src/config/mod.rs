//! Configuration module

mod app_config;

pub use app_config::{ActionConfig, AppConfig, LogFormat, LoggingConfig, PlatformConfig};
