//! Ilia Portal web server library.
//!
//! Login, profile self-service and the access-gated admin console, served
//! over a backend-as-a-service collaborator. Exposed as a library so the
//! integration tests can drive the full router against the in-memory backend.
//!
//! # Security
//!
//! The backend enforces every access rule. The console's own role check
//! only decides what to render.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod baas;
pub mod config;
pub mod console;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, routing::get};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use middleware::{create_session_layer, security_headers_middleware};
use state::AppState;

/// Build the portal router with sessions, security headers and request
/// tracing applied.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .merge(routes::routes())
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
