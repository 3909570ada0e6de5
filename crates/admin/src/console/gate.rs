//! Console entry check.

use tracing::{debug, instrument, warn};

use ilia_portal_core::Profile;

use super::{HOME_ROUTE, LOGIN_ROUTE, SessionObserver};
use crate::baas::Backend;

/// Outcome of [`AccessGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Caller is an admin; carries their profile.
    Authorized(Profile),
    /// Caller must be sent elsewhere.
    Redirect(&'static str),
}

/// Decides whether the current session may enter the console.
///
/// This is a navigation decision only. The backend rejects privileged calls
/// from non-admins on its own.
pub struct AccessGate<'a> {
    observer: &'a SessionObserver,
    backend: &'a dyn Backend,
}

impl<'a> AccessGate<'a> {
    #[must_use]
    pub fn new(observer: &'a SessionObserver, backend: &'a dyn Backend) -> Self {
        Self { observer, backend }
    }

    /// Resolve the identity, fetch its profile and check the role.
    ///
    /// A failed or empty profile lookup counts as "not an admin".
    #[instrument(skip(self))]
    pub async fn authorize(&self) -> GateDecision {
        let Some(identity) = self.observer.current() else {
            debug!("No identity, redirecting to login");
            return GateDecision::Redirect(LOGIN_ROUTE);
        };

        let profile = match self.backend.get_profile(identity.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(identity_id = %identity.id, error = %e, "Profile lookup failed at console entry");
                None
            }
        };

        match profile {
            Some(profile) if profile.is_admin() => GateDecision::Authorized(profile),
            _ => {
                debug!(identity_id = %identity.id, "Not an admin, redirecting home");
                GateDecision::Redirect(HOME_ROUTE)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::baas::BackendConnector;
    use crate::baas::memory::{MemoryBackend, Operation};
    use ilia_portal_core::{Email, Role};

    #[tokio::test]
    async fn test_anonymous_goes_to_login_without_backend_calls() {
        let backend = MemoryBackend::new();
        let session = backend.session(None);
        let observer = SessionObserver::default();

        let decision = AccessGate::new(&observer, session.as_ref()).authorize().await;
        assert_eq!(decision, GateDecision::Redirect(LOGIN_ROUTE));
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_user_goes_home() {
        let backend = MemoryBackend::new();
        let user = backend
            .add_account(Email::parse("u@ilia.test").unwrap(), "pw", None, Role::User)
            .await;
        let session = backend.session_for(&user).await;
        let observer = SessionObserver::new(Some(user));

        let decision = AccessGate::new(&observer, session.as_ref()).authorize().await;
        assert_eq!(decision, GateDecision::Redirect(HOME_ROUTE));
    }

    #[tokio::test]
    async fn test_profile_failure_is_not_admin() {
        let backend = MemoryBackend::new();
        let admin = backend
            .add_account(Email::parse("a@ilia.test").unwrap(), "pw", None, Role::Admin)
            .await;
        let session = backend.session_for(&admin).await;
        let observer = SessionObserver::new(Some(admin));

        backend.fail_next(Operation::GetProfile).await;
        let decision = AccessGate::new(&observer, session.as_ref()).authorize().await;
        assert_eq!(decision, GateDecision::Redirect(HOME_ROUTE));

        let decision = AccessGate::new(&observer, session.as_ref()).authorize().await;
        assert!(matches!(decision, GateDecision::Authorized(p) if p.is_admin()));
    }
}
