//! HTTP server implementation
//!
//! This module provides the HTTP server, the admission middleware and the
//! health and admin routes.

pub mod builder;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use builder::{ServerBuilder, run_server};
pub use server::HttpServer;
pub use state::AppState;
