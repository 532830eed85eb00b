mod common;

use axum::http::StatusCode;
use common::{TestApp, PASSWORD};
use serde_json::json;

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = TestApp::new();
    let body = json!({ "email": "a@x.com", "password": PASSWORD });

    let first = app.post("/api/register", body.clone(), None).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["message"], "User registered successfully");

    let second = app
        .post(
            "/api/register",
            json!({ "email": "A@x.com", "password": "another-password" }),
            None,
        )
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.body["error"], "Email already registered");

    let login = app.post("/api/login", body, None).await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_registration_payloads_are_rejected() {
    let app = TestApp::new();

    let bad_email = app
        .post("/api/register", json!({ "email": "nope", "password": PASSWORD }), None)
        .await;
    assert_eq!(bad_email.status, StatusCode::BAD_REQUEST);

    let empty_password = app
        .post("/api/register", json!({ "email": "a@x.com", "password": "" }), None)
        .await;
    assert_eq!(empty_password.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn short_passwords_register_and_log_in() {
    let app = TestApp::new();

    let register = app
        .post("/api/register", json!({ "email": "a@x.com", "password": "pw1" }), None)
        .await;
    assert_eq!(register.status, StatusCode::CREATED);

    let login = app
        .post("/api/login", json!({ "email": "a@x.com", "password": "pw1" }), None)
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert!(login.session_cookie().is_some());
}

#[tokio::test]
async fn missing_fields_are_a_bad_request_with_a_json_error() {
    let app = TestApp::new();

    let no_email = app.post("/api/register", json!({ "password": PASSWORD }), None).await;
    assert_eq!(no_email.status, StatusCode::BAD_REQUEST);
    assert!(no_email.body["error"].is_string());

    let no_password = app.post("/api/register", json!({ "email": "a@x.com" }), None).await;
    assert_eq!(no_password.status, StatusCode::BAD_REQUEST);
    assert!(no_password.body["error"].is_string());

    let login_no_password = app.post("/api/login", json!({ "email": "a@x.com" }), None).await;
    assert_eq!(login_no_password.status, StatusCode::BAD_REQUEST);
    assert!(login_no_password.body["error"].is_string());

    let login_no_email = app.post("/api/login", json!({ "password": PASSWORD }), None).await;
    assert_eq!(login_no_email.status, StatusCode::BAD_REQUEST);
    assert!(login_no_email.body["error"].is_string());
}

#[tokio::test]
async fn login_sets_cookie_only_on_success() {
    let app = TestApp::new();
    app.post("/api/register", json!({ "email": "a@x.com", "password": PASSWORD }), None)
        .await;

    let wrong = app
        .post("/api/login", json!({ "email": "a@x.com", "password": "wrong-password" }), None)
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"], "Invalid credentials");
    assert!(wrong.session_cookie().is_none());

    let unknown = app
        .post("/api/login", json!({ "email": "b@x.com", "password": PASSWORD }), None)
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body, wrong.body);

    let ok = app
        .post("/api/login", json!({ "email": "a@x.com", "password": PASSWORD }), None)
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.body["message"], "Login successful");
    assert_eq!(ok.body["subscription_status"], "Not Subscribed");
    assert!(ok.session_cookie().is_some());
    assert!(ok.set_cookie.unwrap().contains("HttpOnly"));
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let app = TestApp::new();
    let cookie = app.signed_in("a@x.com").await;

    let quota = app.get("/api/account/quota", Some(&cookie)).await;
    assert_eq!(quota.status, StatusCode::OK);

    let logout = app.post("/api/logout", json!({}), Some(&cookie)).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body["message"], "Logged out successfully");

    let after = app.get("/api/account/quota", Some(&cookie)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = TestApp::new();

    let chat = app.post("/api/chat", json!({ "message": "hi" }), None).await;
    assert_eq!(chat.status, StatusCode::UNAUTHORIZED);
    assert_eq!(chat.body["error"], "Unauthorized, please log in");

    let forged = app
        .get(
            "/api/chat_history",
            Some("session_id=00000000-0000-0000-0000-000000000000"),
        )
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);

    let garbage = app.get("/api/conversations", Some("session_id=not-a-uuid")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_is_not_limited_per_client() {
    let app = TestApp::new();

    for email in ["a@x.com", "b@x.com", "c@x.com", "d@x.com"] {
        let response = app
            .post("/api/register", json!({ "email": email, "password": PASSWORD }), None)
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }
}

#[tokio::test]
async fn repeated_login_failures_lock_the_email() {
    let app = TestApp::new();
    app.post("/api/register", json!({ "email": "a@x.com", "password": PASSWORD }), None)
        .await;

    for _ in 0..5 {
        let response = app
            .post("/api/login", json!({ "email": "a@x.com", "password": "wrong-password" }), None)
            .await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    let locked = app
        .post("/api/login", json!({ "email": "a@x.com", "password": PASSWORD }), None)
        .await;
    assert_eq!(locked.status, StatusCode::TOO_MANY_REQUESTS);
}
