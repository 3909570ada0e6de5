//! Session-related types for portal authentication.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ilia_portal_core::{Email, Identity, IdentityId};

use crate::baas::{AccessToken, SignedIn};

/// Session-stored identity.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentIdentity {
    /// Auth-service user id.
    pub id: IdentityId,
    /// Sign-in email.
    pub email: Email,
    /// Backend access token issued at sign-in.
    access_token: String,
    /// Key of this browser session's console instance.
    pub console_key: Uuid,
}

impl CurrentIdentity {
    /// Session state for a fresh sign-in, with a new console key.
    #[must_use]
    pub fn from_sign_in(signed_in: &SignedIn) -> Self {
        Self {
            id: signed_in.identity.id,
            email: signed_in.identity.email.clone(),
            access_token: signed_in.access_token.expose().to_owned(),
            console_key: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn access_token(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone())
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
        }
    }
}

impl std::fmt::Debug for CurrentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .field("console_key", &self.console_key)
            .finish()
    }
}

/// One-shot message shown on the next render of a page, then dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub is_error: bool,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            is_error: false,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            is_error: true,
            message: message.into(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the signed-in identity.
    pub const CURRENT_IDENTITY: &str = "current_identity";

    /// Key for the profile page's pending [`super::Flash`].
    pub const PROFILE_FLASH: &str = "profile_flash";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signed_in() -> SignedIn {
        SignedIn {
            identity: Identity {
                id: IdentityId::random(),
                email: Email::parse("ilia@ilia.test").unwrap(),
            },
            access_token: AccessToken::new("token-value-123"),
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let current = CurrentIdentity::from_sign_in(&signed_in());
        let debug_output = format!("{current:?}");
        assert!(debug_output.contains("ilia@ilia.test"));
        assert!(!debug_output.contains("token-value-123"));
    }

    #[test]
    fn test_each_sign_in_gets_its_own_console() {
        let signed_in = signed_in();
        let first = CurrentIdentity::from_sign_in(&signed_in);
        let second = CurrentIdentity::from_sign_in(&signed_in);
        assert_ne!(first.console_key, second.console_key);
        assert_eq!(first.access_token().expose(), "token-value-123");
        assert_eq!(first.identity(), signed_in.identity);
    }
}
