//! Integration tests for Ilia Portal.
//!
//! The tests drive the complete router (sessions, security headers, routes)
//! in-process with `tower::ServiceExt::oneshot`, backed by the in-memory
//! backend, so no network or external services are needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p ilia-portal-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `portal_auth` - login, logout, session handling
//! - `portal_profile` - profile self-service
//! - `console_access` - access gate redirects
//! - `console_users` - user directory paging, sorting, role toggles
//! - `console_news` - news editing, publishing, deletion

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use secrecy::SecretString;
use tower::ServiceExt;
use url::Url;

use ilia_portal_admin::baas::memory::MemoryBackend;
use ilia_portal_admin::config::{BaasConfig, ConsoleConfig, PortalConfig};
use ilia_portal_admin::state::AppState;
use ilia_portal_core::{Email, Identity, Role};

/// Password given to every seeded account.
pub const PASSWORD: &str = "correct-horse-battery";

/// Multipart boundary used by [`TestApp::post_multipart`].
const BOUNDARY: &str = "ilia-portal-test-boundary";

/// A response with its body collected.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    /// `Location` header of redirects.
    pub location: Option<String>,
    /// `name=value` part of the session cookie, if one was set.
    pub cookie: Option<String>,
    pub headers: axum::http::HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Assert a post/redirect/get redirect to `target`.
    #[track_caller]
    pub fn assert_redirect(&self, target: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {}", self.body);
        assert_eq!(self.location.as_deref(), Some(target));
    }
}

/// The portal router plus the backend behind it.
pub struct TestApp {
    pub backend: MemoryBackend,
    router: Router,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Portal with the default console settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_console(ConsoleConfig::default())
    }

    /// Portal with a custom directory page size.
    #[must_use]
    pub fn with_page_size(page_size: u32) -> Self {
        Self::with_console(ConsoleConfig {
            page_size,
            ..ConsoleConfig::default()
        })
    }

    /// Portal whose consoles are discarded after `idle_timeout`.
    #[must_use]
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self::with_console(ConsoleConfig {
            idle_timeout,
            ..ConsoleConfig::default()
        })
    }

    fn with_console(console: ConsoleConfig) -> Self {
        let backend = MemoryBackend::new();
        let state = AppState::new(test_config(console), Arc::new(backend.clone()));
        Self {
            backend,
            router: ilia_portal_admin::app(state),
        }
    }

    /// Seed an account with [`PASSWORD`].
    pub async fn add_account(&self, email: &str, role: Role) -> Identity {
        self.backend
            .add_account(
                Email::parse(email).expect("valid test email"),
                PASSWORD,
                None,
                role,
            )
            .await
    }

    /// Log in and return the session cookie.
    pub async fn login(&self, email: &str) -> String {
        let body = format!("email={email}&password={PASSWORD}");
        let response = self.post_form("/login", &body, None).await;
        response.assert_redirect("/home");
        response.cookie.expect("login sets the session cookie")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> TestResponse {
        let mut request = Request::builder().method("GET").uri(path);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::empty()).expect("valid request"))
            .await
    }

    /// POST a urlencoded form body.
    pub async fn post_form(&self, path: &str, body: &str, cookie: Option<&str>) -> TestResponse {
        let mut request = Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        self.send(request.body(Body::from(body.to_string())).expect("valid request"))
            .await
    }

    /// POST a single file field as `multipart/form-data`.
    pub async fn post_multipart(
        &self,
        path: &str,
        field: &str,
        content_type: &str,
        bytes: &[u8],
        cookie: &str,
    ) -> TestResponse {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(body))
            .expect("valid request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let location = headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");

        TestResponse {
            status,
            location,
            cookie,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

fn test_config(console: ConsoleConfig) -> PortalConfig {
    PortalConfig {
        host: "127.0.0.1".parse().expect("valid address"),
        port: 3001,
        base_url: "http://localhost:3001".to_string(),
        log_json: false,
        baas: BaasConfig {
            url: Url::parse("http://localhost:54321").expect("valid url"),
            anon_key: SecretString::from("unused-by-the-memory-backend"),
            avatar_bucket: "avatars".to_string(),
        },
        console,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
        tls: None,
    }
}
