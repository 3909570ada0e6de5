//! Application state shared across handlers.

use std::sync::Arc;

use crate::baas::{AccessToken, Backend, BackendConnector};
use crate::config::PortalConfig;
use crate::console::ConsoleRegistry;
use crate::models::CurrentIdentity;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. Holds the configuration, the backend
/// connector and the per-session console registry.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: PortalConfig,
    connector: Arc<dyn BackendConnector>,
    consoles: ConsoleRegistry,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: PortalConfig, connector: Arc<dyn BackendConnector>) -> Self {
        let consoles = ConsoleRegistry::new(Arc::clone(&connector), config.console);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                connector,
                consoles,
            }),
        }
    }

    /// Get a reference to the portal configuration.
    #[must_use]
    pub fn config(&self) -> &PortalConfig {
        &self.inner.config
    }

    /// Get the backend connector (sign-in, sign-out, session handles).
    #[must_use]
    pub fn connector(&self) -> &dyn BackendConnector {
        self.inner.connector.as_ref()
    }

    /// Get the per-session console registry.
    #[must_use]
    pub fn consoles(&self) -> &ConsoleRegistry {
        &self.inner.consoles
    }

    /// Backend handle acting as the signed-in identity.
    #[must_use]
    pub fn backend_for(&self, current: &CurrentIdentity) -> Arc<dyn Backend> {
        let token: AccessToken = current.access_token();
        self.inner.connector.session(Some(&token))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.inner.config)
            .field("consoles", &self.inner.consoles)
            .finish_non_exhaustive()
    }
}
