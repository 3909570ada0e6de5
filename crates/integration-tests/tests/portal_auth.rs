//! Integration tests for login, logout and the session cookie.

use axum::http::StatusCode;
use ilia_portal_admin::baas::memory::Operation;
use ilia_portal_core::Role;
use ilia_portal_integration_tests::TestApp;

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_root_redirects_home() {
    let app = TestApp::new();
    app.get("/", None).await.assert_redirect("/home");

    let home = app.get("/home", None).await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.body.contains("href=\"/login\""));
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let app = TestApp::new();
    let response = app.get("/home", None).await;
    assert_eq!(response.headers["x-frame-options"], "DENY");
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert!(response.headers.contains_key("content-security-policy"));
}

#[tokio::test]
async fn test_login_with_wrong_password_shows_error() {
    let app = TestApp::new();
    app.add_account("member@ilia.test", Role::User).await;

    let response = app
        .post_form("/login", "email=member@ilia.test&password=nope", None)
        .await;
    response.assert_redirect("/login?error=credentials");
    assert!(response.cookie.is_none());

    let page = app.get("/login?error=credentials", None).await;
    assert!(page.body.contains("Email or password is incorrect."));
}

#[tokio::test]
async fn test_login_rejects_malformed_email_without_backend_call() {
    let app = TestApp::new();

    let response = app
        .post_form("/login", "email=not-an-email&password=secret", None)
        .await;
    response.assert_redirect("/login?error=email");
    assert_eq!(app.backend.call_count(Operation::SignIn).await, 0);
}

#[tokio::test]
async fn test_login_then_logout() {
    let app = TestApp::new();
    app.add_account("member@ilia.test", Role::User).await;

    let cookie = app.login("member@ilia.test").await;

    let home = app.get("/home", Some(&cookie)).await;
    assert!(home.body.contains("Signed in as member@ilia.test"));
    app.get("/login", Some(&cookie))
        .await
        .assert_redirect("/home");

    app.post_form("/logout", "", Some(&cookie))
        .await
        .assert_redirect("/login");
    assert_eq!(app.backend.call_count(Operation::SignOut).await, 1);

    app.get("/account/profile", Some(&cookie))
        .await
        .assert_redirect("/login");
}
