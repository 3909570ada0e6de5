//! HTTP route handlers for the portal.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Health check (see lib.rs)
//!
//! # Public
//! GET  /                                - Redirect to /home
//! GET  /home                            - Landing page
//! GET  /news                            - News feed
//!
//! # Auth (email + password against the backend)
//! GET  /login                           - Login page
//! POST /login                           - Sign in
//! POST /logout                          - Sign out
//!
//! # Profile (signed in)
//! GET  /account/profile                 - Own profile
//! POST /account/profile/display-name    - Change display name
//! POST /account/profile/avatar          - Upload avatar (multipart)
//!
//! # Console (admins; see routes::console)
//! GET  /admin                           - Console
//! POST /admin/...                       - Console actions (post/redirect/get)
//! ```

pub mod auth;
pub mod console;
pub mod home;
pub mod news;
pub mod profile;

use axum::Router;

use crate::models::CurrentIdentity;
use crate::state::AppState;

/// Header navigation shown on every page.
#[derive(Debug, Clone, Default)]
pub struct Chrome {
    /// Signed-in email; `None` shows the login link.
    pub email: Option<String>,
}

impl Chrome {
    #[must_use]
    pub fn for_identity(current: Option<&CurrentIdentity>) -> Self {
        Self {
            email: current.map(|c| c.email.to_string()),
        }
    }
}

/// Build the complete router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(home::router())
        .merge(news::router())
        .merge(auth::router())
        .merge(profile::router())
        .merge(console::router())
}
