//! Landing page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    response::{IntoResponse, Redirect},
    routing::get,
};

use super::Chrome;
use crate::console::HOME_ROUTE;
use crate::filters;
use crate::middleware::OptionalIdentity;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
}

/// Build the home router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route(HOME_ROUTE, get(home))
}

/// GET /
async fn index() -> Redirect {
    Redirect::to(HOME_ROUTE)
}

/// GET /home
async fn home(OptionalIdentity(current): OptionalIdentity) -> impl IntoResponse {
    HomeTemplate {
        chrome: Chrome::for_identity(current.as_ref()),
    }
}
