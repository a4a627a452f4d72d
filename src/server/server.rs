//! HTTP server core implementation

use crate::config::{Config, ServerConfig};
use crate::core::rate_limit::IpBlocklist;
use crate::server::middleware::AdmissionGate;
use crate::server::routes;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_web::{
    App, HttpServer as ActixHttpServer,
    middleware::DefaultHeaders,
    web,
};
use std::time::Duration;
use tracing::info;
use tracing_actix_web::TracingLogger;

/// HTTP server
pub struct HttpServer {
    /// Server configuration
    config: ServerConfig,
    /// Application state
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: &Config) -> Result<Self> {
        info!("Creating HTTP server");
        config.validate()?;

        let state = AppState::new(config.clone());
        let blocked = state.blocklist.active()?.len();
        if blocked > 0 {
            info!("Loaded {} permanently blocked addresses", blocked);
        }

        Ok(Self {
            config: config.gateway.server.clone(),
            state,
        })
    }

    /// Create a server over prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config.gateway.server.clone(),
            state,
        }
    }

    /// Create the Actix-web application
    pub fn create_app(
        state: web::Data<AppState>,
    ) -> App<
        impl actix_web::dev::ServiceFactory<
            actix_web::dev::ServiceRequest,
            Config = (),
            Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(state)
            .wrap(AdmissionGate::new())
            .wrap(DefaultHeaders::new().add(("Server", "bookgate")))
            .wrap(TracingLogger::default())
            .configure(routes::health::configure_routes)
            .configure(routes::admin::configure_routes)
    }

    /// Start the HTTP server with the idle bucket and monitoring retention sweeps
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.config.bind_address();

        info!("Starting HTTP server on {}", bind_addr);

        let sweep_every = Duration::from_secs(
            self.state
                .config
                .rate_limit()
                .eviction
                .sweep_interval_secs
                .max(1),
        );
        let sweeper = self.state.limiter.clone().start_eviction_task(sweep_every);
        let retention_every = Duration::from_secs(
            self.state
                .config
                .rate_limit()
                .monitoring
                .retention_interval_secs
                .max(1),
        );
        let retention = self.state.monitor.clone().start_retention_task(retention_every);

        let state = web::Data::new(self.state);
        let mut server = ActixHttpServer::new(move || Self::create_app(state.clone()));
        if let Some(workers) = self.config.workers {
            server = server.workers(workers);
        }

        let server = server
            .bind(&bind_addr)
            .map_err(|e| format_bind_error(e, &bind_addr))?
            .run();

        info!("HTTP server listening on {}", bind_addr);

        let result = server
            .await
            .map_err(|e| GatewayError::server(format!("Server error: {}", e)));
        sweeper.abort();
        retention.abort();
        result?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

fn format_bind_error(e: std::io::Error, bind_addr: &str) -> GatewayError {
    match e.kind() {
        std::io::ErrorKind::AddrInUse => GatewayError::server(format!(
            "Address {} is already in use; stop the other process or change server.port",
            bind_addr
        )),
        std::io::ErrorKind::PermissionDenied => GatewayError::server(format!(
            "Permission denied binding {}; ports below 1024 need elevated privileges",
            bind_addr
        )),
        _ => GatewayError::server(format!("Failed to bind {}: {}", bind_addr, e)),
    }
}
