//! Error handling for the gateway
//!
//! This module defines the error type used throughout the gateway and its
//! mapping onto HTTP responses.

mod response;
mod types;

pub use response::{ErrorDetail, ErrorResponse};
pub use types::{GatewayError, Result};
