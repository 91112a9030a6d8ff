use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use doorlock_api::{
    adapters::{actuator::RemoteActuator, memory::MemoryStore},
    config::{Config, SeedCredential},
    web::{
        self,
        state::{AppState, Stores},
    },
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tracing::Level;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SURNAME: &str = "Novak";
const PASSWORD: &str = "secret";
const PASSCODE: &str = "123456";

fn test_config(actuator_url: String, require_auth_for_admin: bool) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        seed: SeedCredential {
            surname: SURNAME.to_string(),
            password: PASSWORD.to_string(),
            passcode: PASSCODE.to_string(),
        },
        log_level: Level::INFO,
        jwt_secret: "test-secret-0123456789".to_string(),
        actuator_url,
        actuator_ws_url: None,
        actuator_timeout: Duration::from_secs(2),
        secure_cookies: false,
        cors_origin: "http://localhost:3000".parse().unwrap(),
        require_auth_for_admin,
    }
}

fn build_state(actuator: &MockServer, require_auth_for_admin: bool) -> Arc<AppState> {
    let config = Arc::new(test_config(actuator.uri(), require_auth_for_admin));
    let store = Arc::new(MemoryStore::seeded(SURNAME, PASSWORD, PASSCODE).unwrap());
    let device = Arc::new(RemoteActuator::new(actuator.uri(), Duration::from_secs(2)).unwrap());
    Arc::new(AppState::new(config, Stores::memory(store), device))
}

fn build_app(actuator: &MockServer) -> Router {
    web::router(build_state(actuator, false))
}

fn request(method: &str, uri: &str, body: Option<Value>, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, set_cookie, body)
}

/// Logs in and returns the `token=...` pair for a Cookie header.
async fn login(app: &Router) -> String {
    let (status, set_cookie, _) = send(
        app,
        request(
            "POST",
            "/auth/login",
            Some(json!({ "surname": SURNAME, "password": PASSWORD })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    set_cookie
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn login_sets_a_two_hour_http_only_cookie() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let (status, set_cookie, body) = send(
        &app,
        request(
            "POST",
            "/auth/login",
            Some(json!({ "surname": SURNAME, "password": PASSWORD })),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["surname"], SURNAME);
    assert!(body["user"].get("passcode").is_none());

    let cookie = set_cookie.unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=7200"));
}

#[tokio::test]
async fn wrong_secret_is_rejected_and_logged() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    for surname in [SURNAME, "Nobody"] {
        let (status, set_cookie, _) = send(
            &app,
            request(
                "POST",
                "/auth/login",
                Some(json!({ "surname": surname, "password": "wrong" })),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(set_cookie.is_none());
    }

    let (_, _, logs) = send(&app, request("GET", "/logs?type=failed_attempt", None, None)).await;
    assert_eq!(logs.as_array().unwrap().len(), 2);
    assert_eq!(logs[0]["success"], false);
}

#[tokio::test]
async fn lock_requires_a_valid_session() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let (status, _, _) = send(&app, request("POST", "/door/lock", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &app,
        request("POST", "/door/lock", None, Some("token=not.a.jwt")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unlock_forwards_the_session_as_bearer_and_flips_status() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);
    let cookie = login(&app).await;
    let token = cookie.trim_start_matches("token=").to_string();

    Mock::given(method("GET"))
        .and(path("/api/open-door"))
        .and(header_eq("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&actuator)
        .await;

    let (_, _, before) = send(&app, request("GET", "/door/status", None, Some(&cookie))).await;
    assert_eq!(before["locked"], true);

    let (status, _, body) = send(&app, request("POST", "/door/unlock", None, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, _, after) = send(&app, request("GET", "/door/status", None, Some(&cookie))).await;
    assert_eq!(after["locked"], false);

    let (_, _, logs) = send(&app, request("GET", "/logs?type=unlock", None, None)).await;
    assert_eq!(logs[0]["user"], SURNAME);
    assert_eq!(logs[0]["success"], true);
}

#[tokio::test]
async fn toggle_unlocks_a_locked_door() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);
    let cookie = login(&app).await;

    Mock::given(method("GET"))
        .and(path("/api/open-door"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&actuator)
        .await;

    let (status, _, body) = send(&app, request("POST", "/door/toggle", None, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isLocked"], false);
}

#[tokio::test]
async fn actuator_failure_is_a_bad_gateway() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);
    let cookie = login(&app).await;

    Mock::given(method("GET"))
        .and(path("/api/lock-door"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&actuator)
        .await;

    let (status, _, body) = send(&app, request("POST", "/door/lock", None, Some(&cookie))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("Actuator unreachable"));

    let (_, _, logs) = send(&app, request("GET", "/logs?type=lock", None, None)).await;
    assert_eq!(logs[0]["success"], false);
}

#[tokio::test]
async fn passcode_verification_is_exact() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let cases = [
        (PASSCODE, StatusCode::OK),
        ("654321", StatusCode::UNAUTHORIZED),
        ("12a456", StatusCode::UNAUTHORIZED),
        ("", StatusCode::UNAUTHORIZED),
    ];
    for (candidate, expected) in cases {
        let (status, _, _) = send(
            &app,
            request(
                "POST",
                "/door/verify-passcode",
                Some(json!({ "passcode": candidate })),
                None,
            ),
        )
        .await;
        assert_eq!(status, expected, "candidate {:?}", candidate);
    }
}

#[tokio::test]
async fn passcode_update_requires_six_digits() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    for bad in ["12345", "1234567", "12345a"] {
        let (status, _, _) = send(
            &app,
            request(
                "POST",
                "/door/update-passcode",
                Some(json!({ "passcode": bad })),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "passcode {:?}", bad);
    }

    let (status, _, body) = send(
        &app,
        request(
            "POST",
            "/door/update-passcode",
            Some(json!({ "passcode": "654321" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, _, _) = send(
        &app,
        request(
            "POST",
            "/door/verify-passcode",
            Some(json!({ "passcode": "654321" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn surname_can_be_read_and_renamed() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let (_, _, body) = send(&app, request("GET", "/door/surname", None, None)).await;
    assert_eq!(body["surname"], SURNAME);

    let (status, _, _) = send(
        &app,
        request(
            "POST",
            "/door/update-surname",
            Some(json!({ "surname": "  " })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        request(
            "POST",
            "/door/update-surname",
            Some(json!({ "surname": "Dvorak" })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, body) = send(&app, request("GET", "/door/surname", None, None)).await;
    assert_eq!(body["surname"], "Dvorak");
}

#[tokio::test]
async fn logs_filter_by_type_and_paginate() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    for _ in 0..3 {
        send(&app, request("POST", "/doorbell/trigger", None, None)).await;
    }
    login(&app).await;

    let (_, _, all) = send(&app, request("GET", "/logs?type=all", None, None)).await;
    assert_eq!(all.as_array().unwrap().len(), 4);
    assert_eq!(all[0]["type"], "login");

    let (_, _, page) = send(
        &app,
        request("GET", "/logs?type=doorbell&limit=2&offset=2", None, None),
    )
    .await;
    assert_eq!(page.as_array().unwrap().len(), 1);
    assert_eq!(page[0]["user"], "Visitor");

    let (status, _, _) = send(&app, request("GET", "/logs?type=burglary", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_merge_partial_updates() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let (_, _, defaults) = send(&app, request("GET", "/settings", None, None)).await;
    assert_eq!(defaults["autoLockDelay"], 30);
    assert_eq!(defaults["homeKitPin"], "123-45-678");

    let (status, _, updated) = send(
        &app,
        request(
            "PATCH",
            "/settings",
            Some(json!({ "doorbellEnabled": false })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["doorbellEnabled"], false);
    assert_eq!(updated["autoLockDelay"], 30);
}

#[tokio::test]
async fn household_users_crud() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let (status, _, created) = send(
        &app,
        request(
            "POST",
            "/users",
            Some(json!({
                "name": "Eva",
                "email": "eva@example.com",
                "role": "guest",
                "passcode": "111111"
            })),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["isActive"], true);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, _, patched) = send(
        &app,
        request(
            "PATCH",
            &format!("/users/{}", id),
            Some(json!({ "isActive": false })),
            None,
        ),
    )
    .await;
    assert_eq!(patched["isActive"], false);
    assert_eq!(patched["name"], "Eva");

    let (status, _, _) = send(&app, request("DELETE", &format!("/users/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, request("DELETE", &format!("/users/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, logs) = send(&app, request("GET", "/logs", None, None)).await;
    assert_eq!(logs[0]["type"], "user_removed");
    assert_eq!(logs[1]["type"], "user_added");
}

#[tokio::test]
async fn admin_routes_can_require_a_session() {
    let actuator = MockServer::start().await;
    let app = web::router(build_state(&actuator, true));

    let (status, _, _) = send(&app, request("GET", "/settings", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app).await;
    let (status, _, _) = send(&app, request("GET", "/settings", None, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_is_acknowledged_without_touching_the_cookie() {
    let actuator = MockServer::start().await;
    let app = build_app(&actuator);

    let (status, set_cookie, body) = send(&app, request("POST", "/auth/logout", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(set_cookie.is_none());
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn doorbell_is_logged_and_rings_the_chime() {
    let actuator = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ring"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&actuator)
        .await;
    let app = build_app(&actuator);

    let (status, _, body) = send(&app, request("POST", "/doorbell/trigger", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // The chime is rung from a background task.
    let mut rung = false;
    for _ in 0..50 {
        let requests = actuator.received_requests().await.unwrap_or_default();
        if requests.iter().any(|r| r.url.path() == "/api/ring") {
            rung = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(rung);

    let (_, _, logs) = send(&app, request("GET", "/logs?type=doorbell", None, None)).await;
    assert_eq!(logs[0]["user"], "Visitor");
}
