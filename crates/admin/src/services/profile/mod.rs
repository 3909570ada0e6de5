//! Profile self-service.
//!
//! Lets a signed-in user see their profile, change their display name and
//! replace their avatar. Role changes are not possible here.

mod error;

pub use error::ProfileError;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use ilia_portal_core::{DisplayName, Identity, IdentityId, Role};

use crate::baas::{Backend, ProfileUpdate};

/// Largest accepted avatar upload.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

/// A user's own profile, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub email: String,
    /// `None` until the user picks a display name.
    pub display_name: Option<String>,
    pub role: Role,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

impl ProfileView {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Profile self-service operations for the session's own identity.
pub struct ProfileService<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ProfileService<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Load the profile for `identity`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` if the backend has no visible profile
    /// row, or `ProfileError::Backend` if the lookup failed.
    #[instrument(skip_all, fields(identity_id = %identity.id))]
    pub async fn load(&self, identity: &Identity) -> Result<ProfileView, ProfileError> {
        let profile = self
            .backend
            .get_profile(identity.id)
            .await?
            .ok_or(ProfileError::NotFound)?;

        Ok(ProfileView {
            email: identity.email.to_string(),
            display_name: profile.display_name().map(str::to_owned),
            role: profile.role,
            avatar_url: self.backend.avatar_url(identity.id),
            created_at: profile.created_at,
        })
    }

    /// Validate and store a new display name. Returns the stored value.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidDisplayName` before any backend call if
    /// the trimmed name is empty or not 3 to 20 characters long.
    #[instrument(skip(self, raw))]
    pub async fn update_display_name(
        &self,
        id: IdentityId,
        raw: &str,
    ) -> Result<DisplayName, ProfileError> {
        let name = DisplayName::parse(raw)?;
        self.backend
            .update_profile(
                id,
                &ProfileUpdate {
                    display_name: Some(name.clone()),
                },
            )
            .await?;

        info!(identity_id = %id, "Display name updated");
        Ok(name)
    }

    /// Validate and store an avatar image, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::InvalidAvatar` before any backend call if the
    /// upload is empty, larger than [`MAX_AVATAR_BYTES`], or not an image.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        id: IdentityId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ProfileError> {
        validate_avatar(&bytes, content_type)?;
        self.backend.upload_avatar(id, bytes, content_type).await?;

        info!(identity_id = %id, "Avatar uploaded");
        Ok(())
    }
}

fn validate_avatar(bytes: &[u8], content_type: &str) -> Result<(), ProfileError> {
    if bytes.is_empty() {
        return Err(ProfileError::InvalidAvatar(
            "Choose an image to upload".to_string(),
        ));
    }
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(ProfileError::InvalidAvatar(
            "Avatar images must be 2 MB or smaller".to_string(),
        ));
    }
    if !content_type.starts_with("image/") {
        return Err(ProfileError::InvalidAvatar(
            "Avatars must be image files".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::baas::memory::{MemoryBackend, Operation};
    use ilia_portal_core::Email;

    async fn setup() -> (MemoryBackend, Identity, std::sync::Arc<dyn Backend>) {
        let backend = MemoryBackend::new();
        let identity = backend
            .add_account(Email::parse("ilia@ilia.test").unwrap(), "pw", None, Role::User)
            .await;
        let session = backend.session_for(&identity).await;
        (backend, identity, session)
    }

    #[tokio::test]
    async fn test_load_without_display_name() {
        let (_, identity, session) = setup().await;
        let view = ProfileService::new(session.as_ref()).load(&identity).await.unwrap();

        assert_eq!(view.display_name, None);
        assert!(!view.is_admin());
        assert!(view.avatar_url.ends_with(&format!("{}.png", identity.id)));
    }

    #[tokio::test]
    async fn test_display_name_is_trimmed_and_validated() {
        let (backend, identity, session) = setup().await;
        let service = ProfileService::new(session.as_ref());

        let stored = service
            .update_display_name(identity.id, "  Ilia  ")
            .await
            .unwrap();
        assert_eq!(stored.as_str(), "Ilia");
        assert_eq!(
            backend.profile(identity.id).await.unwrap().display_name(),
            Some("Ilia")
        );

        backend.clear_calls().await;
        let err = service.update_display_name(identity.id, "ab").await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.call_count(Operation::UpdateProfile).await, 0);
    }

    #[tokio::test]
    async fn test_avatar_validation() {
        let (backend, identity, session) = setup().await;
        let service = ProfileService::new(session.as_ref());

        assert!(
            service
                .upload_avatar(identity.id, Vec::new(), "image/png")
                .await
                .unwrap_err()
                .is_validation()
        );
        assert!(
            service
                .upload_avatar(identity.id, vec![0; MAX_AVATAR_BYTES + 1], "image/png")
                .await
                .unwrap_err()
                .is_validation()
        );
        assert!(
            service
                .upload_avatar(identity.id, vec![1, 2, 3], "text/plain")
                .await
                .unwrap_err()
                .is_validation()
        );
        assert_eq!(backend.call_count(Operation::UploadAvatar).await, 0);

        service
            .upload_avatar(identity.id, vec![1, 2, 3], "image/jpeg")
            .await
            .unwrap();
        let stored = backend.avatar(identity.id).await.unwrap();
        assert_eq!(stored.bytes, vec![1, 2, 3]);
        assert_eq!(stored.content_type, "image/jpeg");
    }
}
