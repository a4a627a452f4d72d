//! Admission gate integration tests
//!
//! Requests go through the full application built by `HttpServer::create_app`.
//! Application paths such as `/login` have no handler here, so admitted
//! requests end in 404 while carrying the rate limit headers.

#[cfg(test)]
mod tests {
    use crate::common::{GatewayFactory, RateLimitAssertions, RequestFactory, assert_status};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use bookgate::core::rate_limit::{BlockedIp, IpBlocklist};
    use bookgate::server::HttpServer;

    // ==================== Login Form Flow ====================

    #[actix_web::test]
    async fn test_login_form_is_redirected_after_five_attempts() {
        let state = GatewayFactory::default_state();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        for expected in [4, 3, 2, 1, 0] {
            let res = test::call_service(&app, RequestFactory::post("/login", "1.2.3.4").to_request()).await;
            assert_status(&res, StatusCode::NOT_FOUND);
            res.assert_limit(5);
            res.assert_remaining(expected);
        }

        let res = test::call_service(&app, RequestFactory::post("/login", "1.2.3.4").to_request()).await;
        assert_status(&res, StatusCode::FOUND);
        assert_eq!(res.header_str("location"), Some("/login?ratelimit=1"));
        res.assert_retry_after_within(300);
    }

    #[actix_web::test]
    async fn test_ajax_login_gets_json_429() {
        let state = GatewayFactory::with_policy("login", 1, 300);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        test::call_service(&app, RequestFactory::ajax_post("/login", "1.2.3.4").to_request()).await;
        let res = test::call_service(&app, RequestFactory::ajax_post("/login", "1.2.3.4").to_request()).await;

        assert_status(&res, StatusCode::TOO_MANY_REQUESTS);
        res.assert_remaining(0);
        res.assert_retry_after_within(300);
        assert!(res.header_str("x-ratelimit-reset").is_some());

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "Rate limit exceeded");
        assert_eq!(body["category"], "login");
        assert!(body["retryAfter"].as_u64().unwrap() >= 1);
    }

    #[actix_web::test]
    async fn test_api_login_gets_json_429() {
        let state = GatewayFactory::with_policy("login", 1, 300);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        test::call_service(&app, RequestFactory::post("/api/auth/login", "9.9.9.9").to_request()).await;
        let res = test::call_service(&app, RequestFactory::post("/api/auth/login", "9.9.9.9").to_request()).await;
        assert_status(&res, StatusCode::TOO_MANY_REQUESTS);
    }

    // ==================== Identity and Isolation ====================

    #[actix_web::test]
    async fn test_clients_are_keyed_by_first_forwarded_address() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let first = test::TestRequest::post()
            .uri("/payment/deposit")
            .insert_header(("X-Forwarded-For", "1.2.3.4, 5.6.7.8"))
            .to_request();
        test::call_service(&app, first).await;

        // same client behind a different proxy chain
        let res = test::call_service(&app, RequestFactory::post("/payment/deposit", "1.2.3.4").to_request()).await;
        assert_status(&res, StatusCode::TOO_MANY_REQUESTS);

        let res = test::call_service(&app, RequestFactory::post("/payment/deposit", "5.6.7.8").to_request()).await;
        assert_status(&res, StatusCode::NOT_FOUND);
        res.assert_remaining(0);
    }

    #[actix_web::test]
    async fn test_reads_on_write_only_category_fall_through_to_general() {
        let state = GatewayFactory::with_policy("booking", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        test::call_service(&app, RequestFactory::post("/booking/new", "2.2.2.2").to_request()).await;
        let res = test::call_service(&app, RequestFactory::post("/booking/new", "2.2.2.2").to_request()).await;
        assert_status(&res, StatusCode::FOUND);

        let res = test::call_service(&app, RequestFactory::get("/booking/new", "2.2.2.2").to_request()).await;
        assert_status(&res, StatusCode::NOT_FOUND);
        res.assert_limit(100);
        res.assert_remaining(99);
    }

    // ==================== Exempt and Blocked ====================

    #[actix_web::test]
    async fn test_health_and_static_assets_bypass_the_gate() {
        let state = GatewayFactory::default_state();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let res = test::call_service(&app, RequestFactory::get("/health", "3.3.3.3").to_request()).await;
        assert_status(&res, StatusCode::OK);
        res.assert_not_evaluated();

        let res = test::call_service(&app, RequestFactory::get("/images/logo.png", "3.3.3.3").to_request()).await;
        res.assert_not_evaluated();

        assert_eq!(state.limiter.bucket_count().unwrap(), 0);
    }

    #[actix_web::test]
    async fn test_permanently_blocked_address_gets_403() {
        let state = GatewayFactory::default_state();
        state
            .blocklist
            .block(BlockedIp::new("6.6.6.6", "card testing", "admin"))
            .unwrap();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let res = test::call_service(&app, RequestFactory::get("/restaurants", "6.6.6.6").to_request()).await;
        assert_status(&res, StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["code"], "PERMANENTLY_BLOCKED");

        let res = test::call_service(&app, RequestFactory::get("/restaurants", "7.7.7.7").to_request()).await;
        assert_status(&res, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_configured_block_applies_from_startup() {
        let state = GatewayFactory::from_yaml("rate_limit:\n  blocked_ips:\n    - 192.0.2.44\n");
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let res = test::call_service(&app, RequestFactory::get("/menu", "192.0.2.44").to_request()).await;
        assert_status(&res, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn test_disabled_rate_limiting_adds_no_headers() {
        let state = GatewayFactory::from_yaml("rate_limit:\n  enabled: false\n");
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        for _ in 0..10 {
            let res = test::call_service(&app, RequestFactory::post("/register", "4.4.4.4").to_request()).await;
            assert_status(&res, StatusCode::NOT_FOUND);
            res.assert_not_evaluated();
        }
    }

    // ==================== Monitoring ====================

    #[actix_web::test]
    async fn test_denials_are_recorded_for_operators() {
        let state = GatewayFactory::with_policy("review", 1, 300);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        for _ in 0..6 {
            let req = RequestFactory::post("/reviews/12", "8.8.4.4")
                .insert_header(("User-Agent", "review-bot/1.0"))
                .to_request();
            test::call_service(&app, req).await;
        }

        let history = state.monitor.blocked_requests_for_ip("8.8.4.4");
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].path, "/reviews/12");
        assert_eq!(history[0].user_agent.as_deref(), Some("review-bot/1.0"));
        assert_eq!(state.monitor.alerts_for_ip("8.8.4.4").len(), 1);
    }
}
