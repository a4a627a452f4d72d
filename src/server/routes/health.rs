//! Health check and version endpoints

use crate::server::routes::ApiResponse;
use crate::server::state::AppState;
use actix_web::{HttpResponse, Result as ActixResult, web};
use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, error};

/// Configure health check routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/version", web::get().to(version_info));
}

/// Health status response
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: Cow<'static, str>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: Cow<'static, str>,
    pub uptime_seconds: u64,
    pub rate_limiting_enabled: bool,
    /// `None` when the bucket store could not be reached
    pub tracked_buckets: Option<usize>,
}

/// Liveness plus bucket store reachability
pub async fn health_check(state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    debug!("Health check requested");

    let tracked_buckets = match state.limiter.bucket_count() {
        Ok(count) => Some(count),
        Err(e) => {
            error!("Bucket store unreachable during health check: {}", e);
            None
        }
    };

    let health_status = HealthStatus {
        status: if tracked_buckets.is_some() {
            Cow::Borrowed("healthy")
        } else {
            Cow::Borrowed("degraded")
        },
        timestamp: chrono::Utc::now(),
        version: Cow::Borrowed(env!("CARGO_PKG_VERSION")),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        rate_limiting_enabled: state.config.rate_limit().enabled,
        tracked_buckets,
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(health_status)))
}

#[derive(Debug, Clone, Serialize)]
struct VersionInfo {
    version: Cow<'static, str>,
    build_time: Cow<'static, str>,
    git_hash: Cow<'static, str>,
}

async fn version_info() -> HttpResponse {
    debug!("Version info requested");

    HttpResponse::Ok().json(ApiResponse::success(VersionInfo {
        version: Cow::Borrowed(env!("CARGO_PKG_VERSION")),
        build_time: Cow::Borrowed(env!("BUILD_TIME")),
        git_hash: Cow::Borrowed(env!("GIT_HASH")),
    }))
}
