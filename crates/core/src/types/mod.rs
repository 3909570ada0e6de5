//! Core types for the Ilia Portal.
//!
//! This module provides type-safe wrappers for the portal's domain concepts.

pub mod directory;
pub mod email;
pub mod id;
pub mod news;
pub mod profile;
pub mod role;

pub use directory::{DirectoryPage, PageRequest, SortKey, SortOrder, total_pages};
pub use email::{Email, EmailError};
pub use id::*;
pub use news::{NewsDraft, NewsDraftError, NewsItem};
pub use profile::{DisplayName, DisplayNameError, Identity, Profile};
pub use role::{Role, RoleParseError};
