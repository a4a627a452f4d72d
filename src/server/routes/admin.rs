//! Rate limiting administration endpoints
//!
//! Access control for this scope is enforced in front of the gateway.

use crate::core::rate_limit::{BlockedIp, Category, IpBlocklist, normalize_ip};
use crate::server::routes::ApiResponse;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_web::http::header;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::info;

/// Mount point of the admin API
pub const ADMIN_SCOPE: &str = "/admin/rate-limiting/api";

const DEFAULT_TOP_LIMIT: usize = 10;
const MAX_TOP_LIMIT: usize = 100;
const DEFAULT_DAYS_TO_KEEP: u32 = 30;
/// A century; anything longer keeps everything anyway
const MAX_DAYS_TO_KEEP: u32 = 36_500;

/// Configure admin routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope(ADMIN_SCOPE)
            .route("/statistics", web::get().to(statistics))
            .route("/blocked-ips", web::get().to(blocked_ips))
            .route("/top-blocked", web::get().to(top_blocked))
            .route("/ip/{ip}", web::get().to(ip_details))
            .route("/reset-ip/{ip}", web::post().to(reset_ip))
            .route("/block-ip-permanent", web::post().to(block_ip_permanent))
            .route("/unblock-ip/{ip}", web::post().to(unblock_ip))
            .route("/edit-block-reason/{ip}", web::post().to(edit_block_reason))
            .route("/clear-all-blocks", web::post().to(clear_all_blocks))
            .route("/permanently-blocked", web::get().to(permanently_blocked))
            .route("/reset-all-limits", web::post().to(reset_all_limits))
            .route("/threat-intelligence/{ip}", web::get().to(threat_intelligence))
            .route("/alerts", web::get().to(alerts))
            .route("/clear-alerts/{ip}", web::post().to(clear_alerts))
            .route("/cleanup", web::post().to(cleanup))
            .route("/export-data", web::get().to(export_data)),
    );
}

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    pub days_to_keep: Option<u32>,
}

/// Body of a manual permanent block
#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    pub ip: String,
    pub reason: String,
    #[serde(default)]
    pub blocked_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReasonRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
struct IpDetails {
    ip: String,
    statistics: Option<crate::core::rate_limit::IpStatistics>,
    buckets: Vec<crate::core::rate_limit::BucketInfo>,
    blocked_requests: Vec<crate::core::rate_limit::BlockedRequest>,
    alerts: Vec<crate::core::rate_limit::Alert>,
    permanent_block: Option<BlockedIp>,
}

fn parse_ip(raw: &str) -> Result<String> {
    raw.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_canonical().to_string())
        .map_err(|_| GatewayError::bad_request(format!("Invalid IP address: {}", raw)))
}

async fn statistics(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = state.monitor.overall_statistics()?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(stats)))
}

async fn blocked_ips(state: web::Data<AppState>) -> Result<HttpResponse> {
    let ips = state.monitor.list_blocked_ips();
    let meta = serde_json::json!({ "total": ips.len() });
    Ok(HttpResponse::Ok().json(ApiResponse::success_with_meta(ips, meta)))
}

async fn top_blocked(
    state: web::Data<AppState>,
    query: web::Query<TopQuery>,
) -> Result<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_LIMIT)
        .clamp(1, MAX_TOP_LIMIT);
    Ok(HttpResponse::Ok().json(ApiResponse::success(state.monitor.top_blocked_ips(limit))))
}

async fn ip_details(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let ip = normalize_ip(&path.into_inner());
    let details = IpDetails {
        statistics: state.monitor.ip_statistics(&ip),
        buckets: state.monitor.bucket_info(&ip)?,
        blocked_requests: state.monitor.blocked_requests_for_ip(&ip),
        alerts: state.monitor.alerts_for_ip(&ip),
        permanent_block: state.blocklist.get(&ip)?,
        ip,
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(details)))
}

async fn reset_ip(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ResetQuery>,
) -> Result<HttpResponse> {
    let ip = normalize_ip(&path.into_inner());

    let data = match query.category.as_deref() {
        Some(raw) => {
            let category: Category = raw.parse().map_err(GatewayError::bad_request)?;
            if category.is_exempt() {
                return Err(GatewayError::bad_request("The exempt category has no buckets"));
            }
            let reset = state.monitor.reset_rate_limit_for_category(&ip, category)?;
            serde_json::json!({ "ip": ip, "category": category, "reset": reset })
        }
        None => {
            let buckets = state.monitor.reset_rate_limit_for_ip(&ip)?;
            serde_json::json!({ "ip": ip, "buckets_reset": buckets })
        }
    };

    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

async fn block_ip_permanent(
    state: web::Data<AppState>,
    body: web::Json<BlockRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();
    let ip = parse_ip(&request.ip)?;
    if request.reason.trim().is_empty() {
        return Err(GatewayError::validation("A reason is required"));
    }

    let blocked_by = request.blocked_by.as_deref().unwrap_or("admin");
    let record = state.monitor.block_ip_permanently(
        &ip,
        request.reason.trim(),
        blocked_by,
        request.notes.as_deref(),
    )?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(record)))
}

async fn unblock_ip(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let ip = normalize_ip(&path.into_inner());
    if !state.monitor.unblock_ip(&ip)? {
        return Err(GatewayError::not_found(format!("{} is not blocked", ip)));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        serde_json::json!({ "ip": ip, "unblocked": true }),
    )))
}

async fn edit_block_reason(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReasonRequest>,
) -> Result<HttpResponse> {
    let ip = normalize_ip(&path.into_inner());
    let reason = body.reason.trim();
    if reason.is_empty() {
        return Err(GatewayError::validation("A reason is required"));
    }
    if !state.monitor.update_block_reason(&ip, reason)? {
        return Err(GatewayError::not_found(format!("{} is not blocked", ip)));
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        serde_json::json!({ "ip": ip, "reason": reason }),
    )))
}

async fn clear_all_blocks(state: web::Data<AppState>) -> Result<HttpResponse> {
    let cleared = state.monitor.clear_all_blocks()?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        serde_json::json!({ "cleared_count": cleared }),
    )))
}

async fn reset_all_limits(state: web::Data<AppState>) -> Result<HttpResponse> {
    let report = state.monitor.reset_all_rate_limits()?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

async fn threat_intelligence(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let ip = parse_ip(&path.into_inner())?;
    let report = state.monitor.threat_intelligence(&ip)?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

async fn permanently_blocked(state: web::Data<AppState>) -> Result<HttpResponse> {
    let records = state.monitor.permanently_blocked_ips()?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(records)))
}

async fn alerts(
    state: web::Data<AppState>,
    query: web::Query<AlertQuery>,
) -> Result<HttpResponse> {
    let alerts = match query.ip.as_deref() {
        Some(ip) => state.monitor.alerts_for_ip(&normalize_ip(ip)),
        None => state.monitor.alerts(),
    };
    Ok(HttpResponse::Ok().json(ApiResponse::success(alerts)))
}

async fn clear_alerts(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let ip = normalize_ip(&path.into_inner());
    let cleared = state.monitor.clear_alerts(&ip);
    Ok(HttpResponse::Ok().json(ApiResponse::success(
        serde_json::json!({ "ip": ip, "cleared": cleared }),
    )))
}

async fn cleanup(
    state: web::Data<AppState>,
    query: web::Query<CleanupQuery>,
) -> Result<HttpResponse> {
    let days = query.days_to_keep.unwrap_or(DEFAULT_DAYS_TO_KEEP);
    if days > MAX_DAYS_TO_KEEP {
        return Err(GatewayError::bad_request(format!(
            "days_to_keep must be at most {}",
            MAX_DAYS_TO_KEEP
        )));
    }
    let report = state.monitor.cleanup_older_than(days);
    info!("Admin cleanup kept the last {} days", days);
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

async fn export_data(state: web::Data<AppState>) -> Result<HttpResponse> {
    let export = state.monitor.export()?;
    let filename = format!(
        "rate-limiting-export-{}.json",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    );
    Ok(HttpResponse::Ok()
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ))
        .json(export))
}
