//! Profile self-service route handlers.
//!
//! Form posts store a one-shot [`Flash`] in the session and redirect back to
//! the profile page, which shows it once.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::Chrome;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireIdentity;
use crate::models::{Flash, session_keys};
use crate::services::{MAX_AVATAR_BYTES, ProfileError, ProfileService, ProfileView};
use crate::state::AppState;

const PROFILE_ROUTE: &str = "/account/profile";

/// Multipart field carrying the avatar image.
const AVATAR_FIELD: &str = "avatar";

/// Display name form data.
#[derive(Debug, Deserialize)]
pub struct DisplayNameForm {
    pub display_name: String,
}

/// Profile details formatted for the page.
#[derive(Debug, Clone)]
pub struct ProfileCardView {
    pub email: String,
    pub display_name: String,
    /// Prefilled into the display name input.
    pub display_name_value: String,
    pub role: String,
    pub is_admin: bool,
    pub avatar_url: String,
    pub member_since: String,
}

impl From<&ProfileView> for ProfileCardView {
    fn from(view: &ProfileView) -> Self {
        Self {
            email: view.email.clone(),
            display_name: view
                .display_name
                .clone()
                .unwrap_or_else(|| "Not set".to_string()),
            display_name_value: view.display_name.clone().unwrap_or_default(),
            role: view.role.as_str().to_string(),
            is_admin: view.is_admin(),
            avatar_url: view.avatar_url.clone(),
            member_since: view.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/profile.html")]
pub struct ProfileTemplate {
    pub chrome: Chrome,
    pub profile: ProfileCardView,
    pub flash: Option<Flash>,
    pub max_avatar_mb: usize,
}

/// Build the profile router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(PROFILE_ROUTE, get(profile_page))
        .route("/account/profile/display-name", post(update_display_name))
        .route(
            "/account/profile/avatar",
            // Let oversized files reach validation instead of failing the body read.
            post(upload_avatar).layer(DefaultBodyLimit::max(MAX_AVATAR_BYTES * 2)),
        )
}

/// GET /account/profile
#[instrument(skip_all, fields(identity_id = %current.id))]
async fn profile_page(
    State(state): State<AppState>,
    RequireIdentity(current): RequireIdentity,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let backend = state.backend_for(&current);
    let view = ProfileService::new(backend.as_ref())
        .load(&current.identity())
        .await?;

    let flash = session
        .remove::<Flash>(session_keys::PROFILE_FLASH)
        .await?;

    Ok(ProfileTemplate {
        chrome: Chrome::for_identity(Some(&current)),
        profile: ProfileCardView::from(&view),
        flash,
        max_avatar_mb: MAX_AVATAR_BYTES / (1024 * 1024),
    })
}

/// POST /account/profile/display-name
#[instrument(skip_all, fields(identity_id = %current.id))]
async fn update_display_name(
    State(state): State<AppState>,
    RequireIdentity(current): RequireIdentity,
    session: Session,
    Form(form): Form<DisplayNameForm>,
) -> Result<Redirect, AppError> {
    let backend = state.backend_for(&current);
    let flash = match ProfileService::new(backend.as_ref())
        .update_display_name(current.id, &form.display_name)
        .await
    {
        Ok(name) => Flash::success(format!("Display name changed to {}", name.as_str())),
        Err(e) => flash_for(&e),
    };

    session.insert(session_keys::PROFILE_FLASH, flash).await?;
    Ok(Redirect::to(PROFILE_ROUTE))
}

/// POST /account/profile/avatar
#[instrument(skip_all, fields(identity_id = %current.id))]
async fn upload_avatar(
    State(state): State<AppState>,
    RequireIdentity(current): RequireIdentity,
    session: Session,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let flash = match read_avatar(multipart).await {
        Ok(Some((bytes, content_type))) => {
            let backend = state.backend_for(&current);
            match ProfileService::new(backend.as_ref())
                .upload_avatar(current.id, bytes, &content_type)
                .await
            {
                Ok(()) => Flash::success("Avatar updated"),
                Err(e) => flash_for(&e),
            }
        }
        Ok(None) => Flash::error("Choose an image to upload"),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read avatar upload");
            Flash::error("The upload could not be read")
        }
    };

    session.insert(session_keys::PROFILE_FLASH, flash).await?;
    Ok(Redirect::to(PROFILE_ROUTE))
}

/// Pull the avatar field out of the form: its bytes and declared content type.
async fn read_avatar(
    mut multipart: Multipart,
) -> Result<Option<(Vec<u8>, String)>, axum::extract::multipart::MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        return Ok(Some((bytes.to_vec(), content_type)));
    }
    Ok(None)
}

fn flash_for(error: &ProfileError) -> Flash {
    if error.is_validation() {
        return Flash::error(error.to_string());
    }
    tracing::error!(error = %error, "Profile update failed");
    Flash::error("The change could not be saved. Please try again.")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ilia_portal_core::Role;

    fn view(display_name: Option<&str>) -> ProfileView {
        ProfileView {
            email: "ilia@ilia.test".to_string(),
            display_name: display_name.map(str::to_string),
            role: Role::Admin,
            avatar_url: "/avatars/x.png".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_display_name_shows_placeholder() {
        let card = ProfileCardView::from(&view(None));
        assert_eq!(card.display_name, "Not set");
        assert_eq!(card.display_name_value, "");
        assert!(card.is_admin);
    }

    #[test]
    fn test_validation_errors_are_shown_verbatim() {
        let err = ProfileError::InvalidAvatar("Avatars must be image files".to_string());
        assert_eq!(flash_for(&err), Flash::error("Avatars must be image files"));

        let err = ProfileError::NotFound;
        assert_ne!(flash_for(&err).message, err.to_string());
    }
}
