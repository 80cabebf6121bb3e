//! music_relay library: failover relay core for NetEase Cloud Music API mirrors.
//!
//! This library provides the building blocks of a small relay service that
//! forwards browser requests to a set of third-party upstream mirrors while
//! enforcing a global outbound rate budget, tracking per-endpoint health,
//! failing over across mirrors in priority order and rotating through
//! forward proxies once direct attempts start failing.
//!
//! # Example
//!
//! ```no_run
//! use music_relay::{run, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     port: 3001,
//!     ..Default::default()
//! };
//!
//! run(config).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context.

#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod error_handling;
pub mod health;
pub mod initialization;
pub mod rate_limit;
pub mod server;

// Re-export public API
pub use config::{Config, LogFormat, LogLevel};
pub use dispatch::{dispatch_with_retry, DispatchOptions, DispatcherState};
pub use error_handling::{ErrorStats, ErrorType, RelayError};
pub use server::{router, run, AppState};
