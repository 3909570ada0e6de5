//! Profile service error types.

use thiserror::Error;

use crate::baas::BaasError;

/// Errors that can occur during profile self-service.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Display name failed validation.
    #[error(transparent)]
    InvalidDisplayName(#[from] ilia_portal_core::DisplayNameError),

    /// Avatar upload failed validation.
    #[error("{0}")]
    InvalidAvatar(String),

    /// No profile row for the signed-in identity.
    #[error("profile not found")]
    NotFound,

    /// Backend error.
    #[error("backend error: {0}")]
    Backend(#[from] BaasError),
}

impl ProfileError {
    /// Whether the error was caused by user input rather than the system.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidDisplayName(_) | Self::InvalidAvatar(_))
    }
}
