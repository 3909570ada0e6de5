//! News items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::NewsId;

/// A news post as stored by the backend.
///
/// `id` and `created_at` are assigned once at creation. Publish state is
/// changed independently of the title and body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: NewsId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_published: bool,
}

/// Errors that can occur when validating a [`NewsDraft`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NewsDraftError {
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("content cannot be empty")]
    EmptyContent,
}

/// A title/content pair that is ready to be created or saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsDraft {
    title: String,
    content: String,
}

impl NewsDraft {
    /// Validate a title and body.
    ///
    /// Both must contain something other than whitespace. The text itself is
    /// kept as typed.
    ///
    /// # Errors
    ///
    /// Returns the first empty field.
    pub fn new(title: &str, content: &str) -> Result<Self, NewsDraftError> {
        if title.trim().is_empty() {
            return Err(NewsDraftError::EmptyTitle);
        }
        if content.trim().is_empty() {
            return Err(NewsDraftError::EmptyContent);
        }
        Ok(Self {
            title: title.to_owned(),
            content: content.to_owned(),
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_requires_both_fields() {
        assert_eq!(NewsDraft::new(" ", "body"), Err(NewsDraftError::EmptyTitle));
        assert_eq!(NewsDraft::new("T", "\n"), Err(NewsDraftError::EmptyContent));
        assert!(NewsDraft::new("T", "C").is_ok());
    }

    #[test]
    fn test_draft_keeps_text_verbatim() {
        let Ok(draft) = NewsDraft::new(" Title ", "line one\nline two") else {
            panic!("draft should be valid");
        };
        assert_eq!(draft.title(), " Title ");
        assert_eq!(draft.content(), "line one\nline two");
    }
}
