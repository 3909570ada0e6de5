//! View models for the console template.
//!
//! Everything the template prints is formatted here, so the template only
//! loops and branches.

use ilia_portal_core::{NewsItem, Profile, Role, SortKey, SortOrder};

use crate::console::{ConsoleView, DashboardSummary, Notice, Tab};

/// Characters of news content shown in the list.
const PREVIEW_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct TabLink {
    pub value: &'static str,
    pub label: &'static str,
    pub active: bool,
}

impl TabLink {
    #[must_use]
    pub fn new(tab: Tab, active: Tab) -> Self {
        Self {
            value: tab.as_str(),
            label: tab.label(),
            active: tab == active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NoticeView {
    pub level: &'static str,
    pub message: String,
}

impl From<&Notice> for NoticeView {
    fn from(notice: &Notice) -> Self {
        Self {
            level: notice.level.as_str(),
            message: notice.message.clone(),
        }
    }
}

/// An `<option>` in a select box.
#[derive(Debug, Clone)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn order_label(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "Ascending",
        SortOrder::Desc => "Descending",
    }
}

/// Counts shown on the dashboard tab.
#[derive(Debug, Clone)]
pub struct DashboardPanel {
    pub total_users: String,
    pub total_news: String,
    pub published_news: String,
    pub page: String,
    pub page_size: u32,
    pub sort: String,
}

fn count_or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl From<&DashboardSummary> for DashboardPanel {
    fn from(summary: &DashboardSummary) -> Self {
        Self {
            total_users: count_or_dash(summary.total_users),
            total_news: count_or_dash(summary.total_news),
            published_news: count_or_dash(summary.published_news),
            page: format!("{} / {}", summary.current_page, summary.total_pages),
            page_size: summary.page_size,
            sort: format!(
                "{}, {}",
                summary.sort_key.label(),
                order_label(summary.sort_order).to_lowercase()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub display_name: String,
    /// Role value posted back with the toggle.
    pub role: &'static str,
    pub toggle_label: &'static str,
    pub created_at: String,
    pub is_admin: bool,
    pub is_viewer: bool,
}

impl UserRow {
    fn new(profile: &Profile, viewer: &Profile) -> Self {
        Self {
            id: profile.id.to_string(),
            display_name: profile.display_name().unwrap_or("(no name)").to_string(),
            role: profile.role.as_str(),
            toggle_label: match profile.role.toggled() {
                Role::Admin => "Make admin",
                Role::User => "Make user",
            },
            created_at: profile.created_at.format("%Y-%m-%d %H:%M").to_string(),
            is_admin: profile.is_admin(),
            is_viewer: profile.id == viewer.id,
        }
    }
}

/// The user directory tab.
#[derive(Debug, Clone)]
pub struct UsersPanel {
    pub loaded: bool,
    pub rows: Vec<UserRow>,
    pub page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub sort_keys: Vec<SelectOption>,
    pub sort_orders: Vec<SelectOption>,
}

impl From<&ConsoleView> for UsersPanel {
    fn from(view: &ConsoleView) -> Self {
        let page = &view.directory;
        Self {
            loaded: view.directory_loaded,
            rows: page
                .items
                .iter()
                .map(|profile| UserRow::new(profile, &view.viewer))
                .collect(),
            page: page.page,
            total_pages: page.total_pages(),
            total_count: page.total_count,
            has_previous: page.has_previous(),
            has_next: page.has_next(),
            sort_keys: SortKey::ALL
                .into_iter()
                .map(|key| SelectOption {
                    value: key.as_str(),
                    label: key.label(),
                    selected: key == page.sort_key,
                })
                .collect(),
            sort_orders: [SortOrder::Desc, SortOrder::Asc]
                .into_iter()
                .map(|order| SelectOption {
                    value: order.as_str(),
                    label: order_label(order),
                    selected: order == page.sort_order,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewsRow {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub created_at: String,
    pub is_published: bool,
    pub publish_label: &'static str,
    pub pending_delete: bool,
    pub being_edited: bool,
}

impl NewsRow {
    fn new(item: &NewsItem, view: &ConsoleView) -> Self {
        Self {
            id: item.id.to_string(),
            title: item.title.clone(),
            preview: preview(&item.content),
            created_at: item.created_at.format("%Y-%m-%d %H:%M").to_string(),
            is_published: item.is_published,
            publish_label: if item.is_published {
                "Unpublish"
            } else {
                "Publish"
            },
            pending_delete: view.pending_delete == Some(item.id),
            being_edited: view.buffer.editing_id == Some(item.id),
        }
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// The edit buffer as a form.
#[derive(Debug, Clone)]
pub struct EditorView {
    pub heading: &'static str,
    pub submit_label: &'static str,
    pub title: String,
    pub content: String,
    /// Posted back with the form so an update stays an update.
    pub editing_id: Option<String>,
    pub is_editing: bool,
}

/// The news tab.
#[derive(Debug, Clone)]
pub struct NewsPanel {
    pub loaded: bool,
    pub rows: Vec<NewsRow>,
    pub editor: EditorView,
}

impl From<&ConsoleView> for NewsPanel {
    fn from(view: &ConsoleView) -> Self {
        let is_editing = view.buffer.is_editing();
        Self {
            loaded: view.news_loaded,
            rows: view.news.iter().map(|item| NewsRow::new(item, view)).collect(),
            editor: EditorView {
                heading: if is_editing { "Edit news" } else { "New news" },
                submit_label: if is_editing { "Update" } else { "Create" },
                title: view.buffer.title.clone(),
                content: view.buffer.content.clone(),
                editing_id: view.buffer.editing_id.map(|id| id.to_string()),
                is_editing,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ilia_portal_core::{DirectoryPage, IdentityId, NewsId};

    use crate::console::EditBuffer;

    fn profile(role: Role, name: Option<&str>) -> Profile {
        Profile {
            id: IdentityId::random(),
            display_name: name.map(str::to_string),
            role,
            created_at: Utc::now(),
        }
    }

    fn console_view(viewer: Profile, users: Vec<Profile>, news: Vec<NewsItem>) -> ConsoleView {
        let directory = DirectoryPage {
            page: 1,
            page_size: 10,
            sort_key: SortKey::default(),
            sort_order: SortOrder::default(),
            total_count: users.len() as u64,
            items: users,
        };
        ConsoleView {
            tab: Tab::Users,
            viewer,
            summary: DashboardSummary {
                total_users: Some(directory.total_count),
                total_news: Some(news.len()),
                published_news: Some(news.iter().filter(|n| n.is_published).count()),
                current_page: 1,
                total_pages: directory.total_pages(),
                page_size: 10,
                sort_key: SortKey::default(),
                sort_order: SortOrder::default(),
            },
            directory,
            directory_loaded: true,
            news,
            news_loaded: true,
            buffer: EditBuffer::default(),
            pending_delete: None,
            notices: Vec::new(),
        }
    }

    #[test]
    fn test_user_rows_offer_the_other_role() {
        let viewer = profile(Role::Admin, Some("Ilia"));
        let member = profile(Role::User, None);
        let view = console_view(viewer.clone(), vec![viewer, member], Vec::new());

        let panel = UsersPanel::from(&view);
        assert_eq!(panel.rows[0].toggle_label, "Make user");
        assert!(panel.rows[0].is_viewer);
        assert_eq!(panel.rows[1].toggle_label, "Make admin");
        assert_eq!(panel.rows[1].display_name, "(no name)");
        assert_eq!(panel.sort_keys.iter().filter(|o| o.selected).count(), 1);
    }

    #[test]
    fn test_news_rows_mark_pending_delete_and_edit() {
        let item = NewsItem {
            id: NewsId::random(),
            title: "Title".to_string(),
            content: "x".repeat(PREVIEW_CHARS + 5),
            created_at: Utc::now(),
            is_published: false,
        };
        let mut view = console_view(profile(Role::Admin, None), Vec::new(), vec![item.clone()]);
        view.pending_delete = Some(item.id);
        view.buffer = EditBuffer {
            title: item.title.clone(),
            content: item.content.clone(),
            editing_id: Some(item.id),
        };

        let panel = NewsPanel::from(&view);
        let row = &panel.rows[0];
        assert!(row.pending_delete);
        assert!(row.being_edited);
        assert_eq!(row.publish_label, "Publish");
        assert_eq!(row.preview.chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(panel.editor.submit_label, "Update");
        assert_eq!(panel.editor.editing_id, Some(item.id.to_string()));
    }

    #[test]
    fn test_dashboard_shows_dash_until_loaded() {
        let summary = DashboardSummary {
            total_users: None,
            total_news: Some(4),
            published_news: Some(1),
            current_page: 1,
            total_pages: 1,
            page_size: 10,
            sort_key: SortKey::CreatedAt,
            sort_order: SortOrder::Desc,
        };
        let panel = DashboardPanel::from(&summary);
        assert_eq!(panel.total_users, "-");
        assert_eq!(panel.total_news, "4");
        assert_eq!(panel.sort, "Created, descending");
    }
}
