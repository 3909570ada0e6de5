//! Portal authentication error types.

use thiserror::Error;

use crate::baas::BaasError;

/// Errors that can occur during sign-in and sign-out.
#[derive(Debug, Error)]
pub enum PortalAuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] ilia_portal_core::EmailError),

    /// Password field left empty.
    #[error("password is required")]
    MissingPassword,

    /// Email/password pair rejected.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Backend error.
    #[error("backend error: {0}")]
    Backend(BaasError),
}

impl From<BaasError> for PortalAuthError {
    fn from(e: BaasError) -> Self {
        match e {
            BaasError::InvalidCredentials => Self::InvalidCredentials,
            other => Self::Backend(other),
        }
    }
}
