//! Authentication route handlers.
//!
//! Email and password sign-in against the backend's auth service. The
//! resulting identity and access token live in the server-side session.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::Chrome;
use crate::console::{HOME_ROUTE, LOGIN_ROUTE};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalIdentity, clear_current_identity, set_current_identity};
use crate::services::{PortalAuthError, PortalAuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Query parameters for error display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub error: Option<String>,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(LOGIN_ROUTE, get(login_page).post(login))
        .route("/logout", post(logout))
}

/// Error code carried through the post/redirect/get cycle.
const fn error_code(error: &PortalAuthError) -> &'static str {
    match error {
        PortalAuthError::InvalidEmail(_) => "email",
        PortalAuthError::MissingPassword => "password",
        PortalAuthError::InvalidCredentials => "credentials",
        PortalAuthError::Backend(_) => "unavailable",
    }
}

fn error_message(code: &str) -> String {
    match code {
        "email" => "Enter a valid email address.",
        "password" => "Enter your password.",
        "credentials" => "Email or password is incorrect.",
        "session" => "Your session could not be started. Please try again.",
        _ => "Sign-in is unavailable right now. Please try again later.",
    }
    .to_string()
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
///
/// GET /login
async fn login_page(
    OptionalIdentity(current): OptionalIdentity,
    Query(query): Query<MessageQuery>,
) -> Response {
    if current.is_some() {
        return Redirect::to(HOME_ROUTE).into_response();
    }

    LoginTemplate {
        chrome: Chrome::default(),
        error: query.error.as_deref().map(error_message),
    }
    .into_response()
}

/// Handle login form submission.
///
/// POST /login
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    let service = PortalAuthService::new(state.connector());

    let current = match service
        .sign_in(form.email.trim(), SecretString::from(form.password))
        .await
    {
        Ok(current) => current,
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            let target = format!("{LOGIN_ROUTE}?error={}", error_code(&e));
            return Redirect::to(&target).into_response();
        }
    };

    if let Err(e) = set_current_identity(&session, &current).await {
        tracing::error!("Failed to set session: {}", e);
        return Redirect::to(&format!("{LOGIN_ROUTE}?error=session")).into_response();
    }

    set_sentry_user(&current.id.to_string(), Some(current.email.as_str()));
    Redirect::to(HOME_ROUTE).into_response()
}

/// Sign out, drop the session's console and clear the session.
///
/// POST /logout
#[instrument(skip_all)]
async fn logout(
    State(state): State<AppState>,
    OptionalIdentity(current): OptionalIdentity,
    session: Session,
) -> impl IntoResponse {
    if let Some(current) = current {
        PortalAuthService::new(state.connector()).sign_out(&current).await;
        state.consoles().close(current.console_key).await;
    }

    if let Err(e) = clear_current_identity(&session).await {
        tracing::error!("Failed to clear session: {}", e);
    }
    clear_sentry_user();

    Redirect::to(LOGIN_ROUTE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ilia_portal_core::EmailError;

    #[test]
    fn test_every_error_code_has_a_message() {
        let unknown = error_message("something-else");
        for error in [
            PortalAuthError::InvalidEmail(EmailError::Empty),
            PortalAuthError::MissingPassword,
            PortalAuthError::InvalidCredentials,
        ] {
            assert_ne!(error_message(error_code(&error)), unknown);
        }
    }
}
