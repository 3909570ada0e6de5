//! Identities and profiles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::IdentityId;
use super::role::Role;

/// The authenticated session principal, as issued by the backend's auth service.
///
/// The portal only ever reads identities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Auth-service user id; profiles share it.
    pub id: IdentityId,
    /// Sign-in email.
    pub email: Email,
}

/// Application-level record describing a user's display name and role.
///
/// Exactly one profile exists per identity; the backend provisions it at
/// signup. The owner may change `display_name`, an admin may change `role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the owning [`Identity::id`].
    pub id: IdentityId,
    /// Public display name, unset until the owner picks one.
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
    /// Console role.
    #[serde(default)]
    pub role: Role,
    /// When the profile row was provisioned.
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Whether this profile may enter the console.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// The display name if one is set and non-blank.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Errors that can occur when validating a [`DisplayName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DisplayNameError {
    /// Nothing but whitespace was entered.
    #[error("display name cannot be empty")]
    Empty,
    /// Too short or too long after trimming.
    #[error("display name must be {min} to {max} characters")]
    Length {
        /// Minimum characters.
        min: usize,
        /// Maximum characters.
        max: usize,
    },
}

/// A validated, trimmed display name.
///
/// ```
/// use ilia_portal_core::DisplayName;
///
/// assert_eq!(DisplayName::parse("  ilia  ").unwrap().as_str(), "ilia");
/// assert!(DisplayName::parse("  ").is_err());
/// assert!(DisplayName::parse("ab").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// Minimum length in characters.
    pub const MIN_CHARS: usize = 3;
    /// Maximum length in characters.
    pub const MAX_CHARS: usize = 20;

    /// Trim and validate a display name.
    ///
    /// Length is counted in characters, so multi-byte names get the same
    /// budget as ASCII ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the trimmed input is empty or its length falls
    /// outside `MIN_CHARS..=MAX_CHARS`.
    pub fn parse(raw: &str) -> Result<Self, DisplayNameError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DisplayNameError::Empty);
        }

        let chars = trimmed.chars().count();
        if !(Self::MIN_CHARS..=Self::MAX_CHARS).contains(&chars) {
            return Err(DisplayNameError::Length {
                min: Self::MIN_CHARS,
                max: Self::MAX_CHARS,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_bounds() {
        assert!(DisplayName::parse("abc").is_ok());
        assert!(DisplayName::parse(&"x".repeat(20)).is_ok());
        assert_eq!(
            DisplayName::parse(&"x".repeat(21)),
            Err(DisplayNameError::Length { min: 3, max: 20 })
        );
        assert_eq!(DisplayName::parse("\n\t"), Err(DisplayNameError::Empty));
    }

    #[test]
    fn test_display_name_counts_characters() {
        // Three characters, nine bytes.
        assert!(DisplayName::parse("衣李亜").is_ok());
    }

    #[test]
    fn test_profile_wire_format() {
        let json = r#"{
            "id": "6f1c2b8e-3a44-4a8e-9f0e-1d2c3b4a5f60",
            "displayName": "ilia",
            "role": "admin",
            "created_at": "2025-01-02T03:04:05Z"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert!(profile.is_admin());
        assert_eq!(profile.display_name(), Some("ilia"));
    }

    #[test]
    fn test_profile_missing_role_is_user() {
        let json = r#"{
            "id": "6f1c2b8e-3a44-4a8e-9f0e-1d2c3b4a5f60",
            "displayName": null,
            "created_at": "2025-01-02T03:04:05Z"
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.role, Role::User);
        assert_eq!(profile.display_name(), None);
    }
}
