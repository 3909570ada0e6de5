//! Integration tests for the console's access gate.

use axum::http::StatusCode;
use ilia_portal_core::Role;
use ilia_portal_integration_tests::TestApp;

#[tokio::test]
async fn test_anonymous_is_sent_to_login_before_any_fetch() {
    let app = TestApp::new();
    app.backend.add_news("Hello", "world", true).await;

    app.get("/admin", None).await.assert_redirect("/login");
    app.post_form("/admin/users/refresh", "", None)
        .await
        .assert_redirect("/login");

    let calls = app.backend.calls().await;
    assert!(
        calls.iter().all(|call| !call.operation.is_collection_fetch()),
        "unexpected calls: {calls:?}"
    );
}

#[tokio::test]
async fn test_non_admin_is_sent_home_before_any_fetch() {
    let app = TestApp::new();
    app.add_account("member@ilia.test", Role::User).await;
    let cookie = app.login("member@ilia.test").await;
    app.backend.clear_calls().await;

    app.get("/admin", Some(&cookie)).await.assert_redirect("/home");

    let calls = app.backend.calls().await;
    assert!(calls.iter().all(|call| !call.operation.is_collection_fetch()));

    // Still signed in: home is not a logout.
    let home = app.get("/home", Some(&cookie)).await;
    assert!(home.body.contains("Signed in as member@ilia.test"));
}

#[tokio::test]
async fn test_admin_sees_dashboard_first() {
    let app = TestApp::new();
    app.add_account("admin@ilia.test", Role::Admin).await;
    app.backend.add_news("One", "body", true).await;
    app.backend.add_news("Two", "body", false).await;
    let cookie = app.login("admin@ilia.test").await;

    let page = app.get("/admin", Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains("<h2>Dashboard</h2>"));
    assert!(page.body.contains("<tr><th>News items</th><td>2</td></tr>"));
    assert!(page.body.contains("<tr><th>Published</th><td>1</td></tr>"));
    assert!(page.body.contains("<tr><th>Users</th><td>1</td></tr>"));
}

#[tokio::test]
async fn test_placeholder_tabs() {
    let app = TestApp::new();
    app.add_account("admin@ilia.test", Role::Admin).await;
    let cookie = app.login("admin@ilia.test").await;

    app.post_form("/admin/tab", "tab=stats", Some(&cookie))
        .await
        .assert_redirect("/admin");
    let page = app.get("/admin", Some(&cookie)).await;
    assert!(page.body.contains("<h2>Statistics</h2>"));
    assert!(!page.body.contains("<h2>Dashboard</h2>"));
}

async fn two_admins(app: &TestApp) -> (ilia_portal_core::Identity, String, String) {
    let first = app.add_account("first@ilia.test", Role::Admin).await;
    app.add_account("second@ilia.test", Role::Admin).await;
    let first_cookie = app.login("first@ilia.test").await;
    let second_cookie = app.login("second@ilia.test").await;

    let page = app.get("/admin", Some(&first_cookie)).await;
    assert_eq!(page.status, StatusCode::OK);
    (first, first_cookie, second_cookie)
}

async fn demote(app: &TestApp, target: &ilia_portal_core::Identity, cookie: &str) {
    app.post_form(
        &format!("/admin/users/{}/role", target.id),
        "current=admin",
        Some(cookie),
    )
    .await
    .assert_redirect("/admin");
    assert_eq!(
        app.backend.profile(target.id).await.expect("profile").role,
        Role::User
    );
}

#[tokio::test]
async fn test_demoted_admin_loses_cached_console() {
    let app = TestApp::new();
    let (first, first_cookie, second_cookie) = two_admins(&app).await;

    demote(&app, &first, &second_cookie).await;

    app.get("/admin", Some(&first_cookie))
        .await
        .assert_redirect("/home");

    let home = app.get("/home", Some(&first_cookie)).await;
    assert!(home.body.contains("Signed in as first@ilia.test"));
}

#[tokio::test]
async fn test_demoted_admin_actions_are_sent_home() {
    let app = TestApp::new();
    let (first, first_cookie, second_cookie) = two_admins(&app).await;

    demote(&app, &first, &second_cookie).await;

    app.post_form("/admin/users/refresh", "", Some(&first_cookie))
        .await
        .assert_redirect("/home");
    app.get("/admin", Some(&first_cookie))
        .await
        .assert_redirect("/home");
}
