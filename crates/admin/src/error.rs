//! Unified error handling for the portal.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::baas::BaasError;
use crate::services::{PortalAuthError, ProfileError};

/// Application-level error type for the portal.
#[derive(Debug, Error)]
pub enum AppError {
    /// Backend call failed.
    #[error("Backend error: {0}")]
    Baas(#[from] BaasError),

    /// Sign-in or sign-out failed.
    #[error("Auth error: {0}")]
    Auth(#[from] PortalAuthError),

    /// Profile operation failed.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Session store could not be read or written.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not signed in.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Baas(e) => baas_status(e),
            Self::Auth(PortalAuthError::Backend(e)) => baas_status(e),
            Self::Auth(PortalAuthError::InvalidCredentials) | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Auth(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Profile(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            Self::Profile(ProfileError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Profile(ProfileError::Backend(e)) => baas_status(e),
            Self::Profile(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn baas_status(error: &BaasError) -> StatusCode {
    match error {
        BaasError::Unauthorized | BaasError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        BaasError::Forbidden(_) => StatusCode::FORBIDDEN,
        BaasError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Portal request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "Backend service error".to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Set the Sentry user context from a signed-in identity.
pub fn set_sentry_user(identity_id: &str, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(identity_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
