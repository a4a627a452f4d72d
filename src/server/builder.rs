//! Server builder and run_server function

use crate::config::Config;
use crate::server::server::HttpServer;
use crate::utils::error::{GatewayError, Result};
use std::path::Path;
use tracing::info;

/// Server builder for easier configuration
pub struct ServerBuilder {
    config: Option<Config>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self { config: None }
    }

    /// Set configuration
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the HTTP server
    pub fn build(self) -> Result<HttpServer> {
        let config = self
            .config
            .ok_or_else(|| GatewayError::Config("Configuration is required".to_string()))?;

        HttpServer::new(&config)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the server with an already loaded configuration
pub async fn run_server(config: Config) -> Result<()> {
    info!("Starting bookgate admission gateway");

    let server = ServerBuilder::new().with_config(config.clone()).build()?;
    info!(
        "Server starting at: http://{}:{}",
        config.server().host,
        config.server().port
    );
    info!("Endpoints:");
    info!("   GET  /health - Health check");
    info!("   GET  /version - Build information");
    info!("   *    /admin/rate-limiting/api/* - Rate limiting administration");
    info!(
        "Rate limiting {} ({:?})",
        if config.rate_limit().enabled { "enabled" } else { "disabled" },
        config.rate_limit().strategy
    );

    server.start().await
}

/// Load configuration from `path` (or `config/gateway.yaml`) and run
pub async fn run_from_path(path: Option<&Path>) -> Result<()> {
    let config = Config::load(path).await?;
    run_server(config).await
}
