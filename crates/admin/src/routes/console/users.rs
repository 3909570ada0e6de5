//! User directory actions.

use axum::{
    Form, Router,
    extract::{Path, State},
    response::Redirect,
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;

use ilia_portal_core::{IdentityId, Role, SortKey, SortOrder};

use super::dispatch;
use crate::console::PageMove;
use crate::error::AppError;
use crate::middleware::OptionalIdentity;
use crate::state::AppState;

/// Which way to move through the directory.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveKind {
    Previous,
    Next,
    Goto,
}

/// Paging form data. `page` is only read for `goto`.
#[derive(Debug, Deserialize)]
pub struct PageForm {
    pub to: MoveKind,
    #[serde(default)]
    pub page: String,
}

impl PageForm {
    fn page_move(&self) -> Result<PageMove, AppError> {
        Ok(match self.to {
            MoveKind::Previous => PageMove::Previous,
            MoveKind::Next => PageMove::Next,
            MoveKind::Goto => PageMove::Goto(
                self.page
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("invalid page: {}", self.page)))?,
            ),
        })
    }
}

/// Sorting form data.
///
/// A present `reverse` flips the current order and ignores the other fields.
#[derive(Debug, Deserialize)]
pub struct SortForm {
    pub key: Option<SortKey>,
    pub order: Option<SortOrder>,
    pub reverse: Option<String>,
}

/// Role toggle form data: the role the row showed when it was rendered.
#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub current: Role,
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users/page", post(navigate))
        .route("/admin/users/sort", post(sort))
        .route("/admin/users/refresh", post(refresh))
        .route("/admin/users/{id}/role", post(toggle_role))
}

/// POST /admin/users/page
async fn navigate(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Form(form): Form<PageForm>,
) -> Result<Redirect, AppError> {
    let to = form.page_move()?;
    Ok(dispatch(&state, &session, current, |shell| async move {
        shell.navigate_users(to).await
    })
    .await)
}

/// POST /admin/users/sort
async fn sort(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Form(form): Form<SortForm>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        if form.reverse.is_some() {
            shell.toggle_sort_order().await
        } else {
            shell.sort_users(form.key, form.order).await
        }
    })
    .await
}

/// POST /admin/users/refresh
async fn refresh(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.refresh_users().await
    })
    .await
}

/// POST /admin/users/{id}/role
async fn toggle_role(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Path(id): Path<IdentityId>,
    Form(form): Form<RoleForm>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.toggle_role(id, form.current).await
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(to: MoveKind, page: &str) -> PageForm {
        PageForm {
            to,
            page: page.to_string(),
        }
    }

    #[test]
    fn test_page_move_parsing() {
        assert_eq!(
            form(MoveKind::Next, "").page_move().unwrap(),
            PageMove::Next
        );
        assert_eq!(
            form(MoveKind::Goto, " 3 ").page_move().unwrap(),
            PageMove::Goto(3)
        );
        assert!(form(MoveKind::Goto, "three").page_move().is_err());
    }
}
