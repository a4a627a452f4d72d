//! Admin API integration tests

#[cfg(test)]
mod tests {
    use crate::common::{GatewayFactory, RequestFactory, assert_status};
    use actix_web::http::{Method, StatusCode};
    use actix_web::test;
    use bookgate::server::HttpServer;
    use serde_json::{Value, json};

    /// Drive `count` denied payment posts from `ip`; the first post takes the only token
    macro_rules! throttle {
        ($app:expr, $ip:expr, $count:expr) => {
            for _ in 0..=$count {
                test::call_service(&$app, RequestFactory::post("/payment/deposit", $ip).to_request()).await;
            }
        };
    }

    macro_rules! json_ok {
        ($app:expr, $req:expr) => {{
            let res = test::call_service(&$app, $req).await;
            assert_status(&res, StatusCode::OK);
            let body: Value = test::read_body_json(res).await;
            body
        }};
    }

    #[actix_web::test]
    async fn test_statistics_reflect_denials() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "1.1.1.1", 3);
        throttle!(app, "2.2.2.2", 1);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/statistics").to_request());
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total_blocked_requests"], 4);
        assert_eq!(body["data"]["unique_blocked_ips"], 2);
        assert_eq!(body["data"]["blocked_by_category"]["payment"], 4);
    }

    #[actix_web::test]
    async fn test_blocked_ips_and_top_blocked() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "1.1.1.1", 1);
        throttle!(app, "2.2.2.2", 4);
        throttle!(app, "3.3.3.3", 2);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/blocked-ips").to_request());
        assert_eq!(body["meta"]["total"], 3);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/top-blocked?limit=2").to_request());
        let top = body["data"].as_array().unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0]["ip"], "2.2.2.2");
        assert_eq!(top[1]["ip"], "3.3.3.3");
    }

    #[actix_web::test]
    async fn test_ip_details_lists_buckets_and_history() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "4.4.4.4", 2);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/ip/4.4.4.4").to_request());
        let data = &body["data"];
        assert_eq!(data["ip"], "4.4.4.4");
        assert_eq!(data["statistics"]["blocked_count"], 2);
        assert_eq!(data["blocked_requests"].as_array().unwrap().len(), 2);

        let buckets = data["buckets"].as_array().unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0]["category"], "payment");
        assert_eq!(buckets[0]["blocked"], true);
        assert!(data["permanent_block"].is_null());
    }

    #[actix_web::test]
    async fn test_reset_ip_restores_access() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "5.5.5.5", 1);

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/reset-ip/5.5.5.5").to_request());
        assert_eq!(body["data"]["buckets_reset"], 1);

        let res = test::call_service(&app, RequestFactory::post("/payment/deposit", "5.5.5.5").to_request()).await;
        assert_status(&res, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_reset_single_category() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "5.5.5.6", 1);

        let body = json_ok!(
            app,
            RequestFactory::admin(Method::POST, "/reset-ip/5.5.5.6?category=payment").to_request()
        );
        assert_eq!(body["data"]["reset"], true);

        let res = test::call_service(
            &app,
            RequestFactory::admin(Method::POST, "/reset-ip/5.5.5.6?category=nonsense").to_request(),
        )
        .await;
        assert_status(&res, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_manual_block_and_unblock() {
        let state = GatewayFactory::default_state();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let req = RequestFactory::admin(Method::POST, "/block-ip-permanent")
            .set_json(json!({ "ip": "6.6.6.6", "reason": "scraping", "notes": "ticket 42" }))
            .to_request();
        let body = json_ok!(app, req);
        assert_eq!(body["data"]["ip"], "6.6.6.6");
        assert_eq!(body["data"]["blocked_by"], "admin");
        assert_eq!(body["data"]["notes"], "ticket 42");

        let res = test::call_service(&app, RequestFactory::get("/menu", "6.6.6.6").to_request()).await;
        assert_status(&res, StatusCode::FORBIDDEN);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/permanently-blocked").to_request());
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/unblock-ip/6.6.6.6").to_request());
        assert_eq!(body["data"]["unblocked"], true);

        let res = test::call_service(&app, RequestFactory::get("/menu", "6.6.6.6").to_request()).await;
        assert_status(&res, StatusCode::NOT_FOUND);

        let res = test::call_service(
            &app,
            RequestFactory::admin(Method::POST, "/unblock-ip/6.6.6.6").to_request(),
        )
        .await;
        assert_status(&res, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_block_rejects_bad_input() {
        let state = GatewayFactory::default_state();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let req = RequestFactory::admin(Method::POST, "/block-ip-permanent")
            .set_json(json!({ "ip": "not-an-ip", "reason": "x" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_status(&res, StatusCode::BAD_REQUEST);

        let req = RequestFactory::admin(Method::POST, "/block-ip-permanent")
            .set_json(json!({ "ip": "7.7.7.7", "reason": "  " }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_status(&res, StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_alerts_filter_and_clear() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "8.8.8.8", 5);
        throttle!(app, "9.9.9.9", 5);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/alerts").to_request());
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/alerts?ip=8.8.8.8").to_request());
        let alerts = body["data"].as_array().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["kind"], "HIGH_FREQUENCY_BLOCK");
        assert_eq!(alerts[0]["level"], "warning");

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/clear-alerts/8.8.8.8").to_request());
        assert_eq!(body["data"]["cleared"], 1);
        assert_eq!(state.monitor.alerts().len(), 1);
    }

    #[actix_web::test]
    async fn test_cleanup_keeps_recent_history() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "1.2.3.4", 2);

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/cleanup").to_request());
        assert_eq!(body["data"]["requests_removed"], 0);
        assert_eq!(state.monitor.blocked_requests_for_ip("1.2.3.4").len(), 2);
    }

    #[actix_web::test]
    async fn test_export_is_an_attachment() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "1.2.3.4", 1);

        let res = test::call_service(&app, RequestFactory::admin(Method::GET, "/export-data").to_request()).await;
        assert_status(&res, StatusCode::OK);
        let disposition = res
            .headers()
            .get("content-disposition")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"rate-limiting-export-"));

        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["statistics"]["total_blocked_requests"], 1);
        assert!(body["ip_statistics"].is_array());
        assert!(body["exported_at"].is_string());
    }

    #[actix_web::test]
    async fn test_admin_calls_are_rate_limited_as_admin() {
        let state = GatewayFactory::with_policy("admin", 2, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        for _ in 0..2 {
            let res = test::call_service(&app, RequestFactory::admin(Method::GET, "/statistics").to_request()).await;
            assert_status(&res, StatusCode::OK);
        }
        let res = test::call_service(&app, RequestFactory::admin(Method::GET, "/statistics").to_request()).await;
        assert_status(&res, StatusCode::TOO_MANY_REQUESTS);
    }

    #[actix_web::test]
    async fn test_cleanup_rejects_out_of_range_days() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "1.2.3.4", 1);

        let res = test::call_service(
            &app,
            RequestFactory::admin(Method::POST, "/cleanup?days_to_keep=4294967295").to_request(),
        )
        .await;
        assert_status(&res, StatusCode::BAD_REQUEST);

        let body = json_ok!(
            app,
            RequestFactory::admin(Method::POST, "/cleanup?days_to_keep=36500").to_request()
        );
        assert_eq!(body["data"]["requests_removed"], 0);
        assert_eq!(state.monitor.blocked_requests_for_ip("1.2.3.4").len(), 1);
    }

    #[actix_web::test]
    async fn test_reset_all_limits_restores_every_client() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "1.1.1.1", 2);
        throttle!(app, "2.2.2.2", 2);

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/reset-all-limits").to_request());
        // two payment buckets plus the admin bucket of this very call
        assert_eq!(body["data"]["buckets_reset"], 3);
        assert_eq!(body["data"]["alerts_cleared"], 0);

        for ip in ["1.1.1.1", "2.2.2.2"] {
            let res = test::call_service(&app, RequestFactory::post("/payment/deposit", ip).to_request()).await;
            assert_status(&res, StatusCode::NOT_FOUND);
        }
        assert!(state.monitor.list_blocked_ips().is_empty());
    }

    #[actix_web::test]
    async fn test_clear_all_blocks() {
        let state = GatewayFactory::from_yaml("rate_limit:\n  blocked_ips: [\"192.0.2.1\"]\n");
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let req = RequestFactory::admin(Method::POST, "/block-ip-permanent")
            .set_json(json!({ "ip": "192.0.2.2", "reason": "scraping" }))
            .to_request();
        json_ok!(app, req);

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/clear-all-blocks").to_request());
        assert_eq!(body["data"]["cleared_count"], 2);

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/permanently-blocked").to_request());
        assert!(body["data"].as_array().unwrap().is_empty());

        for ip in ["192.0.2.1", "192.0.2.2"] {
            let res = test::call_service(&app, RequestFactory::get("/menu", ip).to_request()).await;
            assert_status(&res, StatusCode::NOT_FOUND);
        }
    }

    #[actix_web::test]
    async fn test_edit_block_reason() {
        let state = GatewayFactory::default_state();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let req = RequestFactory::admin(Method::POST, "/block-ip-permanent")
            .set_json(json!({ "ip": "203.0.113.5", "reason": "scraping" }))
            .to_request();
        json_ok!(app, req);

        let req = RequestFactory::admin(Method::POST, "/edit-block-reason/203.0.113.5")
            .set_json(json!({ "reason": " card testing " }))
            .to_request();
        let body = json_ok!(app, req);
        assert_eq!(body["data"]["reason"], "card testing");

        let body = json_ok!(app, RequestFactory::admin(Method::GET, "/permanently-blocked").to_request());
        assert_eq!(body["data"][0]["reason"], "card testing");

        let req = RequestFactory::admin(Method::POST, "/edit-block-reason/203.0.113.5")
            .set_json(json!({ "reason": "" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_status(&res, StatusCode::BAD_REQUEST);

        let req = RequestFactory::admin(Method::POST, "/edit-block-reason/203.0.113.6")
            .set_json(json!({ "reason": "unknown" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_status(&res, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_threat_intelligence_scores_denials() {
        let state = GatewayFactory::with_policy("payment", 1, 60);
        let app = test::init_service(HttpServer::create_app(state.clone())).await;
        throttle!(app, "3.3.3.3", 9);

        let body = json_ok!(
            app,
            RequestFactory::admin(Method::GET, "/threat-intelligence/3.3.3.3").to_request()
        );
        let data = &body["data"];
        assert_eq!(data["total_requests"], 10);
        assert_eq!(data["successful_requests"], 1);
        assert_eq!(data["failed_requests"], 9);
        assert_eq!(data["failure_rate"], 90.0);
        assert_eq!(data["risk_score"], 100);
        assert_eq!(data["risk_level"], "HIGH");
        assert_eq!(data["suspicious"], true);
        assert_eq!(data["permanently_blocked"], false);

        let body = json_ok!(
            app,
            RequestFactory::admin(Method::GET, "/threat-intelligence/3.3.3.4").to_request()
        );
        assert_eq!(body["data"]["total_requests"], 0);
        assert_eq!(body["data"]["risk_level"], "MINIMAL");

        let res = test::call_service(
            &app,
            RequestFactory::admin(Method::GET, "/threat-intelligence/not-an-ip").to_request(),
        )
        .await;
        assert_status(&res, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_manual_block_matches_any_spelling_of_the_address() {
        let state = GatewayFactory::default_state();
        let app = test::init_service(HttpServer::create_app(state.clone())).await;

        let req = RequestFactory::admin(Method::POST, "/block-ip-permanent")
            .set_json(json!({ "ip": "2001:db8::1", "reason": "abuse" }))
            .to_request();
        json_ok!(app, req);

        let res = test::call_service(&app, RequestFactory::get("/menu", "2001:DB8:0::1").to_request()).await;
        assert_status(&res, StatusCode::FORBIDDEN);

        let body = json_ok!(app, RequestFactory::admin(Method::POST, "/unblock-ip/2001:DB8::1").to_request());
        assert_eq!(body["data"]["ip"], "2001:db8::1");

        let res = test::call_service(&app, RequestFactory::get("/menu", "2001:db8::1").to_request()).await;
        assert_status(&res, StatusCode::NOT_FOUND);
    }
}
