//! Portal authentication service.
//!
//! Email/password sign-in against the backend's auth service. The resulting
//! identity and access token live in the server-side session.

mod error;

pub use error::PortalAuthError;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use ilia_portal_core::Email;

use crate::baas::BackendConnector;
use crate::models::CurrentIdentity;

/// Portal authentication service.
pub struct PortalAuthService<'a> {
    connector: &'a dyn BackendConnector,
}

impl<'a> PortalAuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(connector: &'a dyn BackendConnector) -> Self {
        Self { connector }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `PortalAuthError::InvalidEmail` or `MissingPassword` for bad
    /// input (no backend call is made), `InvalidCredentials` if the backend
    /// rejects the pair, and `Backend` for anything else.
    #[instrument(skip(self, password))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: SecretString,
    ) -> Result<CurrentIdentity, PortalAuthError> {
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(PortalAuthError::MissingPassword);
        }

        let signed_in = self.connector.sign_in(&email, &password).await?;
        info!(identity_id = %signed_in.identity.id, "Signed in");
        Ok(CurrentIdentity::from_sign_in(&signed_in))
    }

    /// Revoke the session's access token.
    ///
    /// Failures are logged and otherwise ignored; the local session is
    /// cleared either way.
    #[instrument(skip_all, fields(identity_id = %current.id))]
    pub async fn sign_out(&self, current: &CurrentIdentity) {
        if let Err(e) = self.connector.sign_out(&current.access_token()).await {
            warn!(error = %e, "Backend sign-out failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::baas::memory::{MemoryBackend, Operation};
    use ilia_portal_core::Role;

    async fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .add_account(Email::parse("ilia@ilia.test").unwrap(), "hunter22", None, Role::User)
            .await;
        backend
    }

    #[tokio::test]
    async fn test_sign_in() {
        let backend = backend().await;
        let service = PortalAuthService::new(&backend);

        let current = service
            .sign_in("ilia@ilia.test", SecretString::from("hunter22"))
            .await
            .unwrap();
        assert_eq!(current.email.as_str(), "ilia@ilia.test");

        let wrong = service
            .sign_in("ilia@ilia.test", SecretString::from("nope"))
            .await;
        assert!(matches!(wrong, Err(PortalAuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_bad_input_skips_backend() {
        let backend = backend().await;
        let service = PortalAuthService::new(&backend);

        assert!(matches!(
            service.sign_in("not-an-email", SecretString::from("x")).await,
            Err(PortalAuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            service.sign_in("ilia@ilia.test", SecretString::from("")).await,
            Err(PortalAuthError::MissingPassword)
        ));
        assert_eq!(backend.call_count(Operation::SignIn).await, 0);
    }

    #[tokio::test]
    async fn test_sign_out_revokes_token() {
        let backend = backend().await;
        let service = PortalAuthService::new(&backend);
        let current = service
            .sign_in("ilia@ilia.test", SecretString::from("hunter22"))
            .await
            .unwrap();

        service.sign_out(&current).await;
        let session = backend.session(Some(&current.access_token()));
        assert_eq!(session.current_identity().await.unwrap(), None);
    }
}
