//! Admin console route handlers.
//!
//! Every request goes through the session's [`ConsoleShell`], which the
//! registry mounts (access gate plus initial loads) on first use. Actions
//! follow post/redirect/get: they run against the shell and redirect back to
//! the console, or wherever the shell says the caller must go.
//!
//! # Routes
//!
//! ```text
//! GET  /admin                            - Render the active tab
//! POST /admin/tab                        - Select a tab
//! POST /admin/users/page                 - previous | next | goto n
//! POST /admin/users/sort                 - Sort key/order, or reverse order
//! POST /admin/users/refresh              - Retry the directory fetch
//! POST /admin/users/{id}/role            - Toggle a user's role
//! POST /admin/news/new                   - Empty the editor for a new item
//! POST /admin/news/{id}/edit             - Load an item into the editor
//! POST /admin/news/save                  - Save the editor contents
//! POST /admin/news/{id}/publish          - Toggle publish state
//! POST /admin/news/{id}/delete           - Ask for delete confirmation
//! POST /admin/news/{id}/delete/confirm   - Delete
//! POST /admin/news/delete/cancel         - Abandon the pending delete
//! POST /admin/news/refresh               - Retry the news fetch
//! ```

mod news;
mod users;
mod views;

use std::future::Future;
use std::sync::Arc;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::Chrome;
use crate::console::{CONSOLE_ROUTE, ConsoleShell, Flow, LOGIN_ROUTE, Tab};
use crate::filters;
use crate::middleware::{OptionalIdentity, clear_current_identity};
use crate::models::CurrentIdentity;
use crate::state::AppState;

pub use views::{
    DashboardPanel, EditorView, NewsPanel, NewsRow, NoticeView, SelectOption, TabLink,
    UserRow, UsersPanel,
};

/// Console page template.
///
/// Exactly one panel is `Some`, picked by the active tab.
#[derive(Template, WebTemplate)]
#[template(path = "console/index.html")]
pub struct ConsoleTemplate {
    pub chrome: Chrome,
    pub viewer_name: String,
    pub tabs: Vec<TabLink>,
    pub notices: Vec<NoticeView>,
    pub dashboard: Option<DashboardPanel>,
    pub users: Option<UsersPanel>,
    pub news: Option<NewsPanel>,
    /// Heading of a tab with no content yet.
    pub placeholder: Option<&'static str>,
}

/// Tab selection form data.
#[derive(Debug, Deserialize)]
pub struct TabForm {
    pub tab: Tab,
}

/// Build the console router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(CONSOLE_ROUTE, get(console_page))
        .route("/admin/tab", post(select_tab))
        .merge(users::router())
        .merge(news::router())
}

/// GET /admin
#[instrument(skip_all)]
async fn console_page(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
) -> Response {
    let shell = match state.consoles().open(current.as_ref()).await {
        Ok(shell) => shell,
        Err(target) => {
            return leave(&state, &session, current.as_ref(), target)
                .await
                .into_response();
        }
    };

    // A cached console may outlive the caller's admin role.
    if let Err(target) = shell.reauthorize().await {
        return leave(&state, &session, current.as_ref(), target)
            .await
            .into_response();
    }

    let view = shell.view().await;
    let mut template = ConsoleTemplate {
        chrome: Chrome::for_identity(current.as_ref()),
        viewer_name: view
            .viewer
            .display_name()
            .unwrap_or("administrator")
            .to_string(),
        tabs: Tab::ALL
            .into_iter()
            .map(|tab| TabLink::new(tab, view.tab))
            .collect(),
        notices: view.notices.iter().map(NoticeView::from).collect(),
        dashboard: None,
        users: None,
        news: None,
        placeholder: None,
    };

    match view.tab {
        Tab::Dashboard => template.dashboard = Some(DashboardPanel::from(&view.summary)),
        Tab::Users => template.users = Some(UsersPanel::from(&view)),
        Tab::News => template.news = Some(NewsPanel::from(&view)),
        Tab::Stats | Tab::Logs => template.placeholder = Some(view.tab.label()),
    }

    template.into_response()
}

/// POST /admin/tab
async fn select_tab(
    State(state): State<AppState>,
    session: Session,
    OptionalIdentity(current): OptionalIdentity,
    Form(form): Form<TabForm>,
) -> Redirect {
    dispatch(&state, &session, current, |shell| async move {
        shell.select_tab(form.tab).await
    })
    .await
}

/// Run `action` against the session's console and redirect per its outcome.
pub(crate) async fn dispatch<F, Fut>(
    state: &AppState,
    session: &Session,
    current: Option<CurrentIdentity>,
    action: F,
) -> Redirect
where
    F: FnOnce(Arc<ConsoleShell>) -> Fut,
    Fut: Future<Output = Flow>,
{
    let flow = match state.consoles().open(current.as_ref()).await {
        Ok(shell) => action(shell).await,
        Err(target) => Flow::Redirect(target),
    };

    match flow {
        Flow::Continue => Redirect::to(CONSOLE_ROUTE),
        Flow::Redirect(target) => leave(state, session, current.as_ref(), target).await,
    }
}

/// Redirect out of the console.
///
/// Any way out drops the session's console. When the way out is the login
/// page the stored identity is stale too, so it is cleared.
async fn leave(
    state: &AppState,
    session: &Session,
    current: Option<&CurrentIdentity>,
    target: &'static str,
) -> Redirect {
    if let Some(current) = current {
        tracing::info!(identity_id = %current.id, redirect = target, "Leaving console");
        state.consoles().close(current.console_key).await;
        if target == LOGIN_ROUTE
            && let Err(e) = clear_current_identity(session).await
        {
            tracing::error!("Failed to clear session: {}", e);
        }
    }
    Redirect::to(target)
}
