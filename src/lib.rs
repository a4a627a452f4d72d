//! # bookgate
//!
//! Admission gateway for a restaurant booking web application.
//!
//! Every request is classified into an endpoint category (login, booking,
//! payment, search and so on), keyed by client address and checked against
//! that category's bucket before it reaches a handler. Permanently blocked
//! addresses are rejected first. Operators inspect and reset state through
//! an admin API.
//!
//! ## Embedding the gate
//!
//! ```rust,no_run
//! use bookgate::core::rate_limit::{AdmissionControl, InMemoryBlocklist, RateLimiter, RequestInfo};
//! use bookgate::config::RateLimitConfig;
//! use std::sync::Arc;
//!
//! let config = RateLimitConfig::default();
//! let limiter = Arc::new(RateLimiter::new(&config));
//! let control = AdmissionControl::new(&config, limiter, Arc::new(InMemoryBlocklist::new()));
//!
//! let outcome = control.evaluate(&RequestInfo::new("/login", "POST", "203.0.113.7"));
//! assert!(outcome.is_forward());
//! ```
//!
//! ## Gateway mode
//!
//! ```rust,no_run
//! use bookgate::{Config, Gateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config/gateway.yaml").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod config;
pub mod core;
pub mod server;
pub mod utils;

pub use config::Config;
pub use utils::error::{GatewayError, Result};

use tracing::info;

/// The admission gateway: configuration plus the HTTP server built from it
pub struct Gateway {
    config: Config,
    server: server::HttpServer,
}

impl Gateway {
    /// Create a new gateway instance
    pub fn new(config: Config) -> Result<Self> {
        info!("Creating new gateway instance");
        let server = server::HttpServer::new(&config)?;
        Ok(Self { config, server })
    }

    /// Run the gateway server
    pub async fn run(self) -> Result<()> {
        info!(
            "Starting bookgate on {}",
            self.config.server().bind_address()
        );
        self.server.start().await
    }
}

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Gateway build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub build_time: &'static str,
    pub git_hash: &'static str,
}

/// Build metadata baked in by the build script
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION,
        build_time: env!("BUILD_TIME"),
        git_hash: env!("GIT_HASH"),
    }
}
