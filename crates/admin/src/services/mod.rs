//! Business logic services for the portal.
//!
//! # Services
//!
//! - `auth` - email/password sign-in against the backend
//! - `profile` - profile self-service (display name, avatar)

pub mod auth;
pub mod profile;

pub use auth::{PortalAuthError, PortalAuthService};
pub use profile::{MAX_AVATAR_BYTES, ProfileError, ProfileService, ProfileView};
