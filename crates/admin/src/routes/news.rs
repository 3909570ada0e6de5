//! Public news feed.
//!
//! Shows whatever the caller's session may read. The backend hides drafts
//! from anonymous and non-admin callers; admins see them marked as
//! unpublished.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Router, extract::State, response::IntoResponse, routing::get};
use tracing::instrument;

use ilia_portal_core::NewsItem;

use super::Chrome;
use crate::filters;
use crate::middleware::OptionalIdentity;
use crate::state::AppState;

/// A news item formatted for the feed.
#[derive(Debug, Clone)]
pub struct NewsCardView {
    pub title: String,
    pub content: String,
    pub published_on: String,
    pub is_published: bool,
}

impl From<&NewsItem> for NewsCardView {
    fn from(item: &NewsItem) -> Self {
        Self {
            title: item.title.clone(),
            content: item.content.clone(),
            published_on: item.created_at.format("%Y-%m-%d").to_string(),
            is_published: item.is_published,
        }
    }
}

/// News feed template.
#[derive(Template, WebTemplate)]
#[template(path = "news.html")]
pub struct NewsFeedTemplate {
    pub chrome: Chrome,
    pub items: Vec<NewsCardView>,
    pub error: Option<String>,
}

/// Build the news router.
pub fn router() -> Router<AppState> {
    Router::new().route("/news", get(feed))
}

/// GET /news
#[instrument(skip_all)]
async fn feed(
    State(state): State<AppState>,
    OptionalIdentity(current): OptionalIdentity,
) -> impl IntoResponse {
    let backend = match &current {
        Some(current) => state.backend_for(current),
        None => state.connector().session(None),
    };

    let (items, error) = match backend.list_news().await {
        Ok(mut items) => {
            items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            (items.iter().map(NewsCardView::from).collect(), None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load news feed");
            (Vec::new(), Some("News could not be loaded. Try again shortly.".to_string()))
        }
    };

    NewsFeedTemplate {
        chrome: Chrome::for_identity(current.as_ref()),
        items,
        error,
    }
}
