//! The admin console.
//!
//! An access-gated dashboard for managing user roles and news content,
//! composed from small components:
//!
//! - [`SessionObserver`] - observable cell holding the current identity
//! - [`AccessGate`] - decides whether a caller may enter the console
//! - [`PagedSortedDirectory`] - server-side paged and sorted user directory
//! - [`RoleToggleController`] - flips a user's role and refreshes the directory
//! - [`ContentEditor`] - news list plus a single create/update edit buffer
//! - [`ConsoleShell`] - tab state machine composing all of the above
//! - [`ConsoleRegistry`] - one shell per browser session, expiring when idle
//!
//! Components never patch their collections after a mutation; they refetch
//! from the backend. Responses to superseded requests are discarded.

pub mod directory;
pub mod gate;
pub mod news;
pub mod registry;
pub mod roles;
pub mod session;
pub mod shell;

use thiserror::Error;

use crate::baas::BaasError;

pub use directory::PagedSortedDirectory;
pub use gate::{AccessGate, GateDecision};
pub use news::{ContentEditor, EditBuffer};
pub use registry::ConsoleRegistry;
pub use roles::RoleToggleController;
pub use session::{SessionObserver, SessionSubscription};
pub use shell::{ConsoleShell, ConsoleView, DashboardSummary, Flow, PageMove, Tab};

/// Where unauthenticated callers are sent.
pub const LOGIN_ROUTE: &str = "/login";

/// Where authenticated non-admins are sent.
pub const HOME_ROUTE: &str = "/home";

/// The console itself.
pub const CONSOLE_ROUTE: &str = "/admin";

/// Failures surfaced by console components.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Caller may not be here; navigate away instead of rendering an error.
    #[error("redirect to {0}")]
    Redirect(&'static str),

    /// Loading a collection failed. Last-good data stays visible.
    #[error("failed to load {resource}: {source}")]
    Fetch {
        resource: &'static str,
        #[source]
        source: BaasError,
    },

    /// A mutation was rejected. Nothing local changed.
    #[error("{action} failed: {source}")]
    Mutation {
        action: &'static str,
        #[source]
        source: BaasError,
    },

    /// Input rejected before any backend call.
    #[error("{0}")]
    Validation(String),
}

impl ConsoleError {
    /// A failed collection load. A backend refusal on role grounds means the
    /// caller is no longer an admin and must leave the console.
    #[must_use]
    pub fn fetch(resource: &'static str, source: BaasError) -> Self {
        match source {
            BaasError::Forbidden(_) => Self::Redirect(HOME_ROUTE),
            source => Self::Fetch { resource, source },
        }
    }

    /// A rejected mutation, mapped like [`ConsoleError::fetch`].
    #[must_use]
    pub fn mutation(action: &'static str, source: BaasError) -> Self {
        match source {
            BaasError::Forbidden(_) => Self::Redirect(HOME_ROUTE),
            source => Self::Mutation { action, source },
        }
    }

    /// Whether the backend reported the session as missing or expired.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(
            self,
            Self::Fetch {
                source: BaasError::Unauthorized,
                ..
            } | Self::Mutation {
                source: BaasError::Unauthorized,
                ..
            }
        )
    }
}

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    /// CSS modifier used by the templates.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A transient message shown once on the next render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expiry_detection() {
        let expired = ConsoleError::Fetch {
            resource: "users",
            source: BaasError::Unauthorized,
        };
        assert!(expired.is_session_expired());

        let forbidden = ConsoleError::Mutation {
            action: "role change",
            source: BaasError::Forbidden("policy".to_string()),
        };
        assert!(!forbidden.is_session_expired());
        assert!(!ConsoleError::Validation("x".to_string()).is_session_expired());
    }

    #[test]
    fn test_forbidden_means_leave_for_home() {
        let demoted =
            ConsoleError::mutation("role change", BaasError::Forbidden("policy".to_string()));
        assert!(matches!(demoted, ConsoleError::Redirect(HOME_ROUTE)));

        let demoted = ConsoleError::fetch("users", BaasError::Forbidden("policy".to_string()));
        assert!(matches!(demoted, ConsoleError::Redirect(HOME_ROUTE)));

        let unavailable =
            ConsoleError::fetch("users", BaasError::Unavailable("down".to_string()));
        assert!(matches!(unavailable, ConsoleError::Fetch { resource: "users", .. }));
    }
}
