//! News list and edit buffer.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use ilia_portal_core::{NewsDraft, NewsId, NewsItem};

use super::ConsoleError;
use crate::baas::Backend;

/// The single in-progress news draft.
///
/// `editing_id` of `None` means the next save creates a new item; `Some(id)`
/// means it updates `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    pub title: String,
    pub content: String,
    pub editing_id: Option<NewsId>,
}

impl EditBuffer {
    /// Whether the next save updates an existing item.
    #[must_use]
    pub const fn is_editing(&self) -> bool {
        self.editing_id.is_some()
    }
}

#[derive(Debug, Default)]
struct EditorState {
    items: Vec<NewsItem>,
    loaded: bool,
    buffer: EditBuffer,
    /// Item awaiting delete confirmation.
    pending_delete: Option<NewsId>,
    latest_ticket: u64,
}

/// Manages all news items and the edit buffer.
///
/// The list is never modified locally; every successful mutation reloads it.
/// A failed mutation leaves the list and the buffer as they were.
pub struct ContentEditor {
    backend: Arc<dyn Backend>,
    state: RwLock<EditorState>,
}

impl ContentEditor {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: RwLock::new(EditorState::default()),
        }
    }

    /// Loaded items, newest first.
    pub async fn items(&self) -> Vec<NewsItem> {
        self.state.read().await.items.clone()
    }

    /// A loaded item by id.
    pub async fn item(&self, id: NewsId) -> Option<NewsItem> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    pub async fn buffer(&self) -> EditBuffer {
        self.state.read().await.buffer.clone()
    }

    /// Item awaiting delete confirmation, if any.
    pub async fn pending_delete(&self) -> Option<NewsId> {
        self.state.read().await.pending_delete
    }

    /// Fetch every news item, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if the list could not be loaded; the
    /// previous list stays in place.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<(), ConsoleError> {
        let ticket = {
            let mut state = self.state.write().await;
            state.latest_ticket += 1;
            state.latest_ticket
        };

        let result = self.backend.list_news().await;

        let mut state = self.state.write().await;
        if ticket != state.latest_ticket {
            debug!(ticket, latest = state.latest_ticket, "Discarding superseded news response");
            return Ok(());
        }

        match result {
            Ok(mut items) => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                state.items = items;
                state.loaded = true;
                Ok(())
            }
            Err(source) => Err(ConsoleError::fetch("news", source)),
        }
    }

    /// Write form input into the buffer, keeping the edit target.
    pub async fn update_draft(&self, title: String, content: String) {
        let mut state = self.state.write().await;
        state.buffer.title = title;
        state.buffer.content = content;
    }

    /// Check the edit target a submitted form carries against the buffer.
    ///
    /// A buffer with no target (the console was remounted after the form was
    /// rendered) takes the form's target, provided that item is still listed.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Validation`] when the targets disagree or the
    /// item is gone. The buffer is left as it was.
    pub async fn retarget(&self, target: Option<NewsId>) -> Result<(), ConsoleError> {
        let mut state = self.state.write().await;
        match (state.buffer.editing_id, target) {
            (current, submitted) if current == submitted => Ok(()),
            (None, Some(id)) => {
                if state.items.iter().any(|item| item.id == id) {
                    state.buffer.editing_id = Some(id);
                    Ok(())
                } else {
                    Err(ConsoleError::Validation(
                        "That news item is no longer listed".to_string(),
                    ))
                }
            }
            _ => Err(ConsoleError::Validation(
                "The editor changed since this form was shown; review it and save again"
                    .to_string(),
            )),
        }
    }

    /// Switch to update mode for `item`, discarding any unsaved draft.
    pub async fn begin_edit(&self, item: &NewsItem) {
        self.state.write().await.buffer = EditBuffer {
            title: item.title.clone(),
            content: item.content.clone(),
            editing_id: Some(item.id),
        };
    }

    /// Switch to create mode with an empty buffer.
    pub async fn begin_create(&self) {
        self.state.write().await.buffer = EditBuffer::default();
    }

    /// Create or update from the buffer, then clear it and reload.
    ///
    /// # Errors
    ///
    /// - [`ConsoleError::Validation`] for an empty title or content; nothing is sent
    /// - [`ConsoleError::Mutation`] if the backend rejects the write; the buffer is kept
    /// - [`ConsoleError::Fetch`] if the write succeeded but the reload failed
    #[instrument(skip(self))]
    pub async fn save(&self) -> Result<(), ConsoleError> {
        let buffer = self.buffer().await;
        let draft = NewsDraft::new(&buffer.title, &buffer.content)
            .map_err(|e| ConsoleError::Validation(e.to_string()))?;

        let result = match buffer.editing_id {
            Some(id) => self.backend.update_news(id, &draft).await,
            None => self.backend.create_news(&draft).await,
        };
        result.map_err(|source| {
            let action = if buffer.is_editing() {
                "news update"
            } else {
                "news creation"
            };
            ConsoleError::mutation(action, source)
        })?;
        info!(editing_id = ?buffer.editing_id, "News saved");

        {
            let mut state = self.state.write().await;
            // Keep a draft that was started while the save was in flight.
            if state.buffer == buffer {
                state.buffer = EditBuffer::default();
            }
        }
        self.load().await
    }

    /// First delete step: remember which item awaits confirmation.
    pub async fn request_delete(&self, id: NewsId) {
        self.state.write().await.pending_delete = Some(id);
    }

    /// Abandon a pending delete.
    pub async fn cancel_delete(&self) {
        self.state.write().await.pending_delete = None;
    }

    /// Second delete step: delete `id` if it is the pending item, then reload.
    ///
    /// # Errors
    ///
    /// - [`ConsoleError::Validation`] if `id` was not requested for deletion first
    /// - [`ConsoleError::Mutation`] if the backend rejects the delete; the
    ///   confirmation stays pending
    /// - [`ConsoleError::Fetch`] if the delete succeeded but the reload failed
    #[instrument(skip(self), fields(news_id = %id))]
    pub async fn confirm_delete(&self, id: NewsId) -> Result<(), ConsoleError> {
        if self.pending_delete().await != Some(id) {
            return Err(ConsoleError::Validation(
                "Confirm the deletion before removing a news item".to_string(),
            ));
        }

        self.backend
            .delete_news(id)
            .await
            .map_err(|source| ConsoleError::mutation("news deletion", source))?;
        info!(news_id = %id, "News deleted");

        {
            let mut state = self.state.write().await;
            state.pending_delete = None;
            if state.buffer.editing_id == Some(id) {
                state.buffer = EditBuffer::default();
            }
        }
        self.load().await
    }

    /// Set `is_published` to `!current`, then reload.
    ///
    /// Title and content are never part of this request.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Mutation`] if the backend rejects the change,
    /// or [`ConsoleError::Fetch`] if the reload failed.
    #[instrument(skip(self), fields(news_id = %id))]
    pub async fn toggle_publish(&self, id: NewsId, current: bool) -> Result<(), ConsoleError> {
        self.backend
            .set_news_published(id, !current)
            .await
            .map_err(|source| ConsoleError::mutation("publish change", source))?;
        info!(news_id = %id, published = !current, "Publish state changed");

        self.load().await
    }
}
