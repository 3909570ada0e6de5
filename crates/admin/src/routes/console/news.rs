//! News editor actions.

use axum::{
    Form, Router,
    extract::{Path, State},
    response::Redirect,
    routing::post,
};
use serde::Deserialize;
use tower_sessions::Session;

use ilia_portal_core::NewsId;

use super::dispatch;
use crate::middleware::OptionalIdentity;
use crate::state::AppState;

/// Editor form data.
///
/// `editing_id` is present only when the form was rendered for an update.
#[derive(Debug, Deserialize)]
pub struct NewsForm {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub editing_id: Option<NewsId>,
}

/// Publish toggle form data: the state the row showed when it was rendered.
#[derive(Debug, Deserialize)]
pub struct PublishForm {
    pub current: bool,
}

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/news/new", post(begin_create))
        .route("/admin/news/save", post(save))
        .route("/admin/news/refresh", post(refresh))
        .route("/admin/news/delete/cancel", post(cancel_delete))
        .route("/admin/news/{id}/edit", post(begin_edit))
        .route("/admin/news/{id}/publish", post(toggle_publish))
        .route("/admin/news/{id}/delete", post(request_delete))
        .route("/admin/news/{id}/delete/confirm", post(confirm_delete))
}

/// POST /admin/news/new
async fn begin_create(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.begin_create().await
    })
    .await
}

/// POST /admin/news/{id}/edit
async fn begin_edit(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Path(id): Path<NewsId>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.begin_edit(id).await
    })
    .await
}

/// POST /admin/news/save
async fn save(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Form(form): Form<NewsForm>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.save_news(form.title, form.content, form.editing_id)
            .await
    })
    .await
}

/// POST /admin/news/{id}/publish
async fn toggle_publish(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Path(id): Path<NewsId>,
    Form(form): Form<PublishForm>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.toggle_publish(id, form.current).await
    })
    .await
}

/// POST /admin/news/{id}/delete
async fn request_delete(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Path(id): Path<NewsId>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.request_delete(id).await
    })
    .await
}

/// POST /admin/news/{id}/delete/confirm
async fn confirm_delete(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Path(id): Path<NewsId>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.confirm_delete(id).await
    })
    .await
}

/// POST /admin/news/delete/cancel
async fn cancel_delete(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.cancel_delete().await
    })
    .await
}

/// POST /admin/news/refresh
async fn refresh(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.refresh_news().await
    })
    .await
}
