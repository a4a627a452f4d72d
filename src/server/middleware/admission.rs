//! Admission middleware
//!
//! Runs before every handler: exempt paths pass straight through, blocked
//! addresses get 403 and throttled clients get 429 or a redirect. Allowed
//! responses carry the current limit headers.

use super::helpers::{
    apply_rate_limit_headers, blocked_response, redirect_response, request_info,
    throttled_response,
};
use crate::config::models::RejectionStyle;
use crate::core::rate_limit::Admission;
use crate::server::state::AppState;
use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::web;
use futures::future::{Ready, ready};
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info, warn};

/// Admission middleware for Actix-web
#[derive(Debug, Clone, Default)]
pub struct AdmissionGate;

impl AdmissionGate {
    pub fn new() -> Self {
        Self
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdmissionGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type InitError = ();
    type Transform = AdmissionGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdmissionGateService { service }))
    }
}

/// Service implementation for the admission middleware
pub struct AdmissionGateService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AdmissionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            error!("Application state missing, admission checks skipped");
            let fut = self.service.call(req);
            return Box::pin(async move { Ok(fut.await?.map_into_left_body()) });
        };

        let info = request_info(&req);

        match state.admission.evaluate(&info) {
            Admission::Forward { decision, .. } => {
                if decision.is_some() {
                    state.monitor.record_allowed(&info.client_ip);
                }
                let fut = self.service.call(req);
                Box::pin(async move {
                    let mut res = fut.await?;
                    if let Some(decision) = decision {
                        apply_rate_limit_headers(res.headers_mut(), &decision);
                    }
                    Ok(res.map_into_left_body())
                })
            }
            Admission::Blocked { category } => {
                info!(
                    "Rejected permanently blocked {} on {} ({})",
                    info.client_ip, info.path, category
                );
                let res = req.into_response(blocked_response());
                Box::pin(async move { Ok(res.map_into_right_body()) })
            }
            Admission::Throttled { decision, style } => {
                warn!(
                    "Rate limit exceeded for {} on {} {} ({}, retry in {}s)",
                    info.client_ip, info.method, info.path, decision.category, decision.retry_after_secs
                );

                if let Err(e) = state.monitor.record_blocked(
                    &info.client_ip,
                    &info.path,
                    info.user_agent.as_deref(),
                    decision.category,
                ) {
                    error!("Failed to record blocked request for {}: {}", info.client_ip, e);
                }

                let response = match style {
                    RejectionStyle::Redirect => redirect_response(&info.path, &decision),
                    RejectionStyle::Json => throttled_response(&decision),
                };
                let res = req.into_response(response);
                Box::pin(async move { Ok(res.map_into_right_body()) })
            }
        }
    }
}
