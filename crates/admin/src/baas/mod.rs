//! Backend-as-a-service collaborator.
//!
//! Every piece of persistent state the portal touches (identities, profiles,
//! news, avatars) lives in an external BaaS that provides session auth, a
//! record store guarded by row-level policies, an object store, and named
//! remote procedures for privileged mutations.
//!
//! # Architecture
//!
//! - [`BackendConnector`] - signs users in and out and hands out session-bound
//!   [`Backend`] handles
//! - [`Backend`] - the per-caller contract used by the console and the
//!   profile service
//! - [`client`] - HTTP implementation (auth, REST, RPC and storage endpoints)
//! - `memory` - in-process implementation with emulated access policies
//!   (feature `memory-backend`, always available to unit tests)
//!
//! # Security
//!
//! The backend is the security boundary. Console-side role checks only decide
//! what to render; a non-admin's privileged calls are rejected by the backend
//! regardless of what the portal believes.

pub mod client;
#[cfg(any(test, feature = "memory-backend"))]
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use ilia_portal_core::{
    DisplayName, Email, Identity, IdentityId, NewsDraft, NewsId, NewsItem, PageRequest, Profile,
    Role,
};

pub use client::{BaasClient, BaasSession};

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BaasError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an unexpected error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Caller has no valid session.
    #[error("Unauthorized: session missing or expired")]
    Unauthorized,

    /// Caller's session is valid but a row-level policy rejected the call.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Record not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Email/password pair was rejected by the auth service.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Backend is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// A backend access token issued at sign-in.
///
/// Kept in a [`SecretString`] so it never shows up in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// The raw bearer token.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Result of a successful password sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub identity: Identity,
    pub access_token: AccessToken,
}

/// Self-service profile changes.
///
/// Only the display name is owner-editable; role changes go through
/// [`Backend::set_role`].
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<DisplayName>,
}

/// Signs users in and out and creates session-bound backend handles.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    /// Exchange an email/password pair for an identity and access token.
    async fn sign_in(&self, email: &Email, password: &SecretString) -> Result<SignedIn, BaasError>;

    /// Revoke an access token.
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BaasError>;

    /// A backend handle acting as the token's owner, or anonymously.
    fn session(&self, token: Option<&AccessToken>) -> Arc<dyn Backend>;
}

/// The backend contract, bound to one caller's session.
///
/// Methods marked privileged are admin-only per backend policy.
#[async_trait]
pub trait Backend: Send + Sync {
    /// The identity this handle acts as, if its session is valid.
    async fn current_identity(&self) -> Result<Option<Identity>, BaasError>;

    /// Fetch one profile. `Ok(None)` when no row exists or is visible.
    async fn get_profile(&self, id: IdentityId) -> Result<Option<Profile>, BaasError>;

    /// Owner-only profile update.
    async fn update_profile(&self, id: IdentityId, update: &ProfileUpdate) -> Result<(), BaasError>;

    /// Privileged: one page of the profile directory.
    async fn fetch_directory_page(&self, request: PageRequest) -> Result<Vec<Profile>, BaasError>;

    /// Privileged: exact number of profiles.
    async fn fetch_directory_count(&self) -> Result<u64, BaasError>;

    /// Privileged: set a profile's role.
    async fn set_role(&self, target: IdentityId, role: Role) -> Result<(), BaasError>;

    /// All news visible to the caller, newest first.
    async fn list_news(&self) -> Result<Vec<NewsItem>, BaasError>;

    /// Privileged: create a news item.
    async fn create_news(&self, draft: &NewsDraft) -> Result<(), BaasError>;

    /// Privileged: replace a news item's title and content.
    async fn update_news(&self, id: NewsId, draft: &NewsDraft) -> Result<(), BaasError>;

    /// Privileged: delete a news item.
    async fn delete_news(&self, id: NewsId) -> Result<(), BaasError>;

    /// Privileged: set a news item's publish flag.
    async fn set_news_published(&self, id: NewsId, published: bool) -> Result<(), BaasError>;

    /// Owner-only: store the avatar image, replacing any previous one.
    async fn upload_avatar(
        &self,
        id: IdentityId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BaasError>;

    /// Public URL of an identity's avatar. Deterministic; the object may not exist.
    fn avatar_url(&self, id: IdentityId) -> String;
}

/// Object key for an identity's avatar.
#[must_use]
pub fn avatar_object_key(id: IdentityId) -> String {
    format!("{id}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiJ9.super-secret");
        let debug_output = format!("{token:?}");
        assert!(!debug_output.contains("super-secret"));
        assert_eq!(token.expose(), "eyJhbGciOiJIUzI1NiJ9.super-secret");
    }

    #[test]
    fn test_avatar_object_key() {
        let id = IdentityId::random();
        assert_eq!(avatar_object_key(id), format!("{id}.png"));
    }
}
