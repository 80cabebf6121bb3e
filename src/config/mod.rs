//! Runtime configuration.
//!
//! The [`Config`] struct doubles as the CLI parser; all options have
//! defaults so the relay starts with no arguments.

mod constants;
mod types;

pub use constants::*;
pub use types::{LogFormat, LogLevel};

use std::time::Duration;

use clap::Parser;

/// Command-line options and configuration.
///
/// This struct is automatically generated by `clap` from the field
/// attributes. All options have sensible defaults and can be overridden via
/// command-line flags.
///
/// # Examples
///
/// ```bash
/// # Basic usage
/// music_relay
///
/// # Custom port and an extra mirror in front of the defaults
/// music_relay --port 8080 --endpoint https://my-mirror.example.com
///
/// # Route escalated attempts through a forward proxy
/// music_relay --proxy http://proxy1.example.com:8080
/// ```
#[derive(Debug, Clone, Parser)]
#[command(
    name = "music_relay",
    about = "Relays NetEase Cloud Music API calls across upstream mirrors with failover and rate limiting."
)]
pub struct Config {
    /// Address to bind the relay server to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port for the relay server
    #[arg(long, default_value_t = 3001)]
    pub port: u16,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Upstream mirror base URL, in priority order (repeatable).
    ///
    /// When omitted, the built-in primary/backup/tertiary mirrors are used.
    #[arg(long = "endpoint")]
    pub endpoints: Vec<String>,

    /// Forward proxy URL for escalated attempts (repeatable).
    ///
    /// Accepts http, https and socks5 URLs. Malformed entries are rejected
    /// at startup rather than silently producing an unusable transport
    /// configuration.
    #[arg(long = "proxy")]
    pub proxies: Vec<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, default_value_t = REQUEST_TIMEOUT_SECS)]
    pub timeout_seconds: u64,
}

impl Config {
    /// Configured mirrors, falling back to the built-in priority list.
    pub fn endpoints_or_default(&self) -> Vec<String> {
        if self.endpoints.is_empty() {
            vec![
                PRIMARY_API_BASE.to_string(),
                BACKUP_API_BASE.to_string(),
                TERTIARY_API_BASE.to_string(),
            ]
        } else {
            self.endpoints.clone()
        }
    }

    /// Per-attempt timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            endpoints: Vec::new(),
            proxies: Vec::new(),
            timeout_seconds: REQUEST_TIMEOUT_SECS,
        }
    }
}
