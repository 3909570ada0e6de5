//! HTTP middleware for the portal.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request tracing)
//! 3. Security headers
//! 4. Session layer (tower-sessions, in-memory store)

pub mod auth;
pub mod security_headers;
pub mod session;

pub use auth::{
    IdentityRejection, OptionalIdentity, RequireIdentity, clear_current_identity,
    set_current_identity,
};
pub use security_headers::security_headers_middleware;
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
