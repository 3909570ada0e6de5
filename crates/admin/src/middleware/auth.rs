//! Authentication extractors for the portal.
//!
//! Provides extractors for requiring a signed-in identity in route handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::console::LOGIN_ROUTE;
use crate::models::{CurrentIdentity, session_keys};

/// Extractor that requires a signed-in identity.
///
/// If nobody is signed in, redirects to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireIdentity(current): RequireIdentity,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", current.email)
/// }
/// ```
pub struct RequireIdentity(pub CurrentIdentity);

/// Error returned when a signed-in identity is required but missing.
pub enum IdentityRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// Session layer missing from the stack.
    MissingSession,
}

impl IntoResponse for IdentityRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_ROUTE).into_response(),
            Self::MissingSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

impl<S> FromRequestParts<S> for RequireIdentity
where
    S: Send + Sync,
{
    type Rejection = IdentityRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Get the session from extensions (set by SessionManagerLayer)
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or(IdentityRejection::MissingSession)?;

        let current: CurrentIdentity = session
            .get(session_keys::CURRENT_IDENTITY)
            .await
            .ok()
            .flatten()
            .ok_or(IdentityRejection::RedirectToLogin)?;

        Ok(Self(current))
    }
}

/// Extractor that optionally gets the signed-in identity.
///
/// Unlike `RequireIdentity`, this does not reject anonymous requests.
pub struct OptionalIdentity(pub Option<CurrentIdentity>);

impl<S> FromRequestParts<S> for OptionalIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let current = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentIdentity>(session_keys::CURRENT_IDENTITY)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(current))
    }
}

/// Store the signed-in identity in the session.
///
/// Cycles the session id first so a pre-login cookie cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_identity(
    session: &Session,
    current: &CurrentIdentity,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_IDENTITY, current).await
}

/// Remove the signed-in identity from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_identity(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentIdentity>(session_keys::CURRENT_IDENTITY)
        .await?;
    session.flush().await
}
