//! Test fixtures and factories
//!
//! All factories build real gateway state, not mocks.

use actix_web::http::Method;
use actix_web::test::TestRequest;
use actix_web::web;
use bookgate::config::Config;
use bookgate::server::AppState;

/// Factory for gateway state
pub struct GatewayFactory;

impl GatewayFactory {
    /// State with every built-in default
    pub fn default_state() -> web::Data<AppState> {
        Self::from_yaml("{}")
    }

    /// State from an inline YAML document
    pub fn from_yaml(yaml: &str) -> web::Data<AppState> {
        let config = Config::from_yaml_str(yaml).expect("test config should be valid");
        web::Data::new(AppState::new(config))
    }

    /// State where `category` allows `capacity` requests per `window_secs`
    pub fn with_policy(category: &str, capacity: u32, window_secs: u64) -> web::Data<AppState> {
        Self::from_yaml(&format!(
            "rate_limit:\n  policies:\n    {}:\n      capacity: {}\n      window_secs: {}\n",
            category, capacity, window_secs
        ))
    }
}

/// Factory for requests arriving through a proxy
pub struct RequestFactory;

impl RequestFactory {
    pub fn get(uri: &str, ip: &str) -> TestRequest {
        TestRequest::get()
            .uri(uri)
            .insert_header(("X-Forwarded-For", ip.to_string()))
    }

    pub fn post(uri: &str, ip: &str) -> TestRequest {
        TestRequest::post()
            .uri(uri)
            .insert_header(("X-Forwarded-For", ip.to_string()))
    }

    /// Form post sent by browser JavaScript
    pub fn ajax_post(uri: &str, ip: &str) -> TestRequest {
        Self::post(uri, ip).insert_header(("X-Requested-With", "XMLHttpRequest"))
    }

    /// Admin API request
    pub fn admin(method: Method, path: &str) -> TestRequest {
        TestRequest::default()
            .method(method)
            .uri(&format!("/admin/rate-limiting/api{}", path))
            .insert_header(("X-Forwarded-For", "10.0.0.1"))
    }
}
