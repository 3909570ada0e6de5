//! Per-session console instances.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{ConsoleShell, SessionObserver};
use crate::baas::BackendConnector;
use crate::config::ConsoleConfig;
use crate::models::CurrentIdentity;

/// Maximum number of live consoles.
const MAX_CONSOLES: u64 = 1_000;

/// Keeps one [`ConsoleShell`] per signed-in browser session.
///
/// A console is mounted (gate plus initial loads) the first time it is
/// opened and dropped after the configured idle time, on logout, or when
/// the cache is full.
#[derive(Clone)]
pub struct ConsoleRegistry {
    connector: Arc<dyn BackendConnector>,
    consoles: Cache<Uuid, Arc<ConsoleShell>>,
    page_size: u32,
}

impl ConsoleRegistry {
    #[must_use]
    pub fn new(connector: Arc<dyn BackendConnector>, config: ConsoleConfig) -> Self {
        Self {
            connector,
            consoles: Cache::builder()
                .max_capacity(MAX_CONSOLES)
                .time_to_idle(config.idle_timeout)
                .build(),
            page_size: config.page_size,
        }
    }

    /// The console for this session, mounting it if needed.
    ///
    /// Anonymous callers still go through the gate, which sends them to the
    /// login page without touching the backend.
    ///
    /// # Errors
    ///
    /// Returns the route to redirect to when the gate refuses entry.
    #[instrument(skip_all)]
    pub async fn open(
        &self,
        current: Option<&CurrentIdentity>,
    ) -> Result<Arc<ConsoleShell>, &'static str> {
        let Some(current) = current else {
            let backend = self.connector.session(None);
            return ConsoleShell::mount(SessionObserver::default(), backend, self.page_size)
                .await
                .map(Arc::new);
        };

        let shell = self
            .consoles
            .try_get_with(current.console_key, self.mount(current))
            .await
            .map_err(|target| *target)?;

        if shell.session_active() {
            return Ok(shell);
        }

        // The session ended while the console was cached; mount afresh.
        debug!(console_key = %current.console_key, "Replacing console for ended session");
        self.consoles.invalidate(&current.console_key).await;
        self.consoles
            .try_get_with(current.console_key, self.mount(current))
            .await
            .map_err(|target| *target)
    }

    async fn mount(&self, current: &CurrentIdentity) -> Result<Arc<ConsoleShell>, &'static str> {
        let token = current.access_token();
        let backend = self.connector.session(Some(&token));

        let observer = SessionObserver::default();
        if let Err(e) = observer.refresh_from(backend.as_ref()).await {
            warn!(error = %e, "Could not resolve session identity");
        }

        ConsoleShell::mount(observer, backend, self.page_size)
            .await
            .map(Arc::new)
    }

    /// Drop a session's console and tell its listeners the session ended.
    pub async fn close(&self, console_key: Uuid) {
        if let Some(shell) = self.consoles.remove(&console_key).await {
            shell.observer().publish(None);
        }
    }

    /// Number of cached consoles.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.consoles.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Idle time before a console is discarded.
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.consoles.policy().time_to_idle()
    }
}

impl std::fmt::Debug for ConsoleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleRegistry")
            .field("consoles", &self.consoles.entry_count())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::baas::memory::{MemoryBackend, Operation};
    use crate::console::{HOME_ROUTE, LOGIN_ROUTE};
    use ilia_portal_core::{Email, Role};
    use secrecy::SecretString;

    async fn signed_in(backend: &MemoryBackend, email: &str, role: Role) -> CurrentIdentity {
        let email = Email::parse(email).unwrap();
        backend.add_account(email.clone(), "pw", None, role).await;
        let signed_in = backend
            .sign_in(&email, &SecretString::from("pw"))
            .await
            .unwrap();
        CurrentIdentity::from_sign_in(&signed_in)
    }

    fn registry(backend: &MemoryBackend) -> ConsoleRegistry {
        ConsoleRegistry::new(Arc::new(backend.clone()), ConsoleConfig::default())
    }

    #[tokio::test]
    async fn test_open_reuses_console() {
        let backend = MemoryBackend::new();
        let admin = signed_in(&backend, "a@ilia.test", Role::Admin).await;
        let registry = registry(&backend);

        let first = registry.open(Some(&admin)).await.unwrap();
        let loads = backend.call_count(Operation::ListNews).await;
        let second = registry.open(Some(&admin)).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.call_count(Operation::ListNews).await, loads);
    }

    #[tokio::test]
    async fn test_refusals_are_not_cached() {
        let backend = MemoryBackend::new();
        let user = signed_in(&backend, "u@ilia.test", Role::User).await;
        let registry = registry(&backend);

        assert_eq!(registry.open(Some(&user)).await.err(), Some(HOME_ROUTE));
        assert_eq!(registry.open(None).await.err(), Some(LOGIN_ROUTE));
        registry.consoles.run_pending_tasks().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_ends_session() {
        let backend = MemoryBackend::new();
        let admin = signed_in(&backend, "a@ilia.test", Role::Admin).await;
        let registry = registry(&backend);

        let shell = registry.open(Some(&admin)).await.unwrap();
        let mut subscription = shell.observer().subscribe();

        registry.close(admin.console_key).await;
        assert_eq!(subscription.changed().await, Some(None));
        assert!(!shell.session_active());
    }

    #[test]
    fn test_idle_timeout_from_config() {
        let registry = registry(&MemoryBackend::new());
        assert_eq!(
            registry.idle_timeout(),
            Some(ConsoleConfig::default().idle_timeout)
        );
    }
}
