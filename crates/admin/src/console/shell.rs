//! Tab-switching console shell.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, instrument, warn};

use ilia_portal_core::{
    DirectoryPage, IdentityId, NewsId, NewsItem, Profile, Role, SortKey, SortOrder,
};

use super::{
    AccessGate, ConsoleError, ContentEditor, EditBuffer, GateDecision, LOGIN_ROUTE, Notice,
    PagedSortedDirectory, RoleToggleController, SessionObserver, SessionSubscription,
};
use crate::baas::Backend;

/// Console tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Dashboard,
    Users,
    News,
    Stats,
    Logs,
}

impl Tab {
    /// Every tab, in navigation order.
    pub const ALL: [Self; 5] = [
        Self::Dashboard,
        Self::Users,
        Self::News,
        Self::Stats,
        Self::Logs,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Users => "users",
            Self::News => "news",
            Self::Stats => "stats",
            Self::Logs => "logs",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Users => "Users",
            Self::News => "News",
            Self::Stats => "Statistics",
            Self::Logs => "Logs",
        }
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tab| tab.as_str() == s)
            .ok_or_else(|| format!("unknown tab: {s}"))
    }
}

/// Directory navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
    Previous,
    Next,
    Goto(u32),
}

/// What the caller should do after a console action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Stay in the console and render it again.
    Continue,
    /// Leave the console.
    Redirect(&'static str),
}

/// Read-only aggregates for the dashboard tab.
///
/// Derived from whatever the users and news tabs already loaded; `None`
/// where nothing has been loaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardSummary {
    pub total_users: Option<u64>,
    pub total_news: Option<usize>,
    pub published_news: Option<usize>,
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

/// Everything needed to render the console once.
#[derive(Debug, Clone)]
pub struct ConsoleView {
    pub tab: Tab,
    pub viewer: Profile,
    pub directory: DirectoryPage,
    pub directory_loaded: bool,
    pub news: Vec<NewsItem>,
    pub news_loaded: bool,
    pub buffer: EditBuffer,
    pub pending_delete: Option<NewsId>,
    pub summary: DashboardSummary,
    pub notices: Vec<Notice>,
}

/// Composes the gate, directory, role controller and content editor into a
/// tab-switching dashboard.
///
/// Only constructed through [`ConsoleShell::mount`], so an existing shell
/// always belongs to an authorized admin.
pub struct ConsoleShell {
    observer: SessionObserver,
    subscription: SessionSubscription,
    viewer: Profile,
    backend: Arc<dyn Backend>,
    directory: Arc<PagedSortedDirectory>,
    roles: RoleToggleController,
    editor: ContentEditor,
    tab: RwLock<Tab>,
    notices: Mutex<Vec<Notice>>,
}

impl ConsoleShell {
    /// Run the access gate and, once it authorizes, load users and news.
    ///
    /// No privileged call is made before the gate completes.
    ///
    /// # Errors
    ///
    /// Returns the route to redirect to when the caller may not enter.
    #[instrument(skip(observer, backend))]
    pub async fn mount(
        observer: SessionObserver,
        backend: Arc<dyn Backend>,
        page_size: u32,
    ) -> Result<Self, &'static str> {
        let viewer = match AccessGate::new(&observer, backend.as_ref()).authorize().await {
            GateDecision::Authorized(profile) => profile,
            GateDecision::Redirect(target) => return Err(target),
        };

        let directory = Arc::new(PagedSortedDirectory::new(Arc::clone(&backend), page_size));
        let shell = Self {
            subscription: observer.subscribe(),
            observer,
            viewer,
            roles: RoleToggleController::new(Arc::clone(&backend), Arc::clone(&directory)),
            editor: ContentEditor::new(Arc::clone(&backend)),
            backend,
            directory,
            tab: RwLock::new(Tab::default()),
            notices: Mutex::new(Vec::new()),
        };

        let (users, news) = tokio::join!(shell.directory.refresh(), shell.editor.load());
        for result in [users, news] {
            if let Flow::Redirect(target) = shell.settle(result, None).await {
                return Err(target);
            }
        }

        info!(admin_id = %shell.viewer.id, "Console mounted");
        Ok(shell)
    }

    /// The session cell this shell listens to.
    #[must_use]
    pub const fn observer(&self) -> &SessionObserver {
        &self.observer
    }

    /// The admin using the console.
    #[must_use]
    pub const fn viewer(&self) -> &Profile {
        &self.viewer
    }

    pub async fn active_tab(&self) -> Tab {
        *self.tab.read().await
    }

    /// Run the access gate again for an already mounted shell.
    ///
    /// # Errors
    ///
    /// Returns the route to redirect to when the caller is no longer an admin.
    #[instrument(skip(self), fields(admin_id = %self.viewer.id))]
    pub async fn reauthorize(&self) -> Result<(), &'static str> {
        match AccessGate::new(&self.observer, self.backend.as_ref())
            .authorize()
            .await
        {
            GateDecision::Authorized(_) => Ok(()),
            GateDecision::Redirect(target) => Err(target),
        }
    }

    /// Whether the session that mounted this shell is still the current one.
    #[must_use]
    pub fn session_active(&self) -> bool {
        self.subscription
            .current()
            .is_some_and(|identity| identity.id == self.viewer.id)
    }

    /// Snapshot for rendering. Drains pending notices.
    pub async fn view(&self) -> ConsoleView {
        let directory = self.directory.current_page().await;
        let directory_loaded = self.directory.is_loaded().await;
        let news = self.editor.items().await;
        let news_loaded = self.editor.is_loaded().await;

        let summary = DashboardSummary {
            total_users: directory_loaded.then_some(directory.total_count),
            total_news: news_loaded.then_some(news.len()),
            published_news: news_loaded
                .then(|| news.iter().filter(|item| item.is_published).count()),
            current_page: directory.page,
            total_pages: directory.total_pages(),
            page_size: directory.page_size,
            sort_key: directory.sort_key,
            sort_order: directory.sort_order,
        };

        ConsoleView {
            tab: self.active_tab().await,
            viewer: self.viewer.clone(),
            directory,
            directory_loaded,
            news,
            news_loaded,
            buffer: self.editor.buffer().await,
            pending_delete: self.editor.pending_delete().await,
            summary,
            notices: std::mem::take(&mut *self.notices.lock().await),
        }
    }

    /// Move to `tab`, loading users or news on first entry.
    pub async fn select_tab(&self, tab: Tab) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        *self.tab.write().await = tab;
        let result = match tab {
            Tab::Users => {
                if self.directory.is_loaded().await {
                    Ok(())
                } else {
                    self.directory.refresh().await
                }
            }
            Tab::News => {
                if self.editor.is_loaded().await {
                    Ok(())
                } else {
                    self.editor.load().await
                }
            }
            Tab::Dashboard | Tab::Stats | Tab::Logs => Ok(()),
        };
        self.settle(result, None).await
    }

    pub async fn navigate_users(&self, to: PageMove) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        let result = match to {
            PageMove::Previous => self.directory.previous_page().await,
            PageMove::Next => self.directory.next_page().await,
            PageMove::Goto(page) => self.directory.set_page(page).await,
        };
        self.settle(result, None).await
    }

    /// Change the sort key and/or order. The page number is kept.
    pub async fn sort_users(&self, key: Option<SortKey>, order: Option<SortOrder>) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        if let Some(key) = key {
            let flow = self.settle(self.directory.set_sort_key(key).await, None).await;
            if flow != Flow::Continue {
                return flow;
            }
        }
        match order {
            Some(order) => {
                self.settle(self.directory.set_sort_order(order).await, None)
                    .await
            }
            None => Flow::Continue,
        }
    }

    pub async fn toggle_sort_order(&self) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.settle(self.directory.toggle_sort_order().await, None)
            .await
    }

    /// Manual retry of the directory fetch.
    pub async fn refresh_users(&self) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.settle(self.directory.refresh().await, None).await
    }

    pub async fn toggle_role(&self, target: IdentityId, current: Role) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        let result = self.roles.toggle_role(target, current).await.map(|_| ());
        self.settle(result, Some("Role updated")).await
    }

    pub async fn begin_create(&self) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.editor.begin_create().await;
        Flow::Continue
    }

    pub async fn begin_edit(&self, id: NewsId) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        match self.editor.item(id).await {
            Some(item) => self.editor.begin_edit(&item).await,
            None => self.notify(Notice::warning("That news item is no longer listed")).await,
        }
        Flow::Continue
    }

    /// Store the submitted draft and save it.
    ///
    /// `target` is the item the submitted form was editing, if any. It must
    /// agree with the edit buffer, so a save never turns an update into a
    /// create.
    pub async fn save_news(
        &self,
        title: String,
        content: String,
        target: Option<NewsId>,
    ) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        if let Err(e) = self.editor.retarget(target).await {
            return self.settle(Err(e), None).await;
        }
        self.editor.update_draft(title, content).await;
        self.settle(self.editor.save().await, Some("News saved"))
            .await
    }

    pub async fn toggle_publish(&self, id: NewsId, current: bool) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }

        let message = if current { "News unpublished" } else { "News published" };
        self.settle(self.editor.toggle_publish(id, current).await, Some(message))
            .await
    }

    pub async fn request_delete(&self, id: NewsId) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.editor.request_delete(id).await;
        Flow::Continue
    }

    pub async fn confirm_delete(&self, id: NewsId) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.settle(self.editor.confirm_delete(id).await, Some("News deleted"))
            .await
    }

    pub async fn cancel_delete(&self) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.editor.cancel_delete().await;
        Flow::Continue
    }

    /// Manual retry of the news fetch.
    pub async fn refresh_news(&self) -> Flow {
        if let Some(flow) = self.guard() {
            return flow;
        }
        self.settle(self.editor.load().await, None).await
    }

    async fn notify(&self, notice: Notice) {
        self.notices.lock().await.push(notice);
    }

    fn guard(&self) -> Option<Flow> {
        (!self.session_active()).then_some(Flow::Redirect(LOGIN_ROUTE))
    }

    /// Recover from a component result at the shell boundary.
    async fn settle(&self, result: Result<(), ConsoleError>, success: Option<&str>) -> Flow {
        let e = match result {
            Ok(()) => {
                if let Some(message) = success {
                    self.notify(Notice::info(message)).await;
                }
                return Flow::Continue;
            }
            Err(e) => e,
        };

        if e.is_session_expired() {
            warn!(admin_id = %self.viewer.id, "Backend session expired");
            self.observer.publish(None);
            return Flow::Redirect(LOGIN_ROUTE);
        }

        match e {
            ConsoleError::Redirect(target) => {
                warn!(
                    admin_id = %self.viewer.id,
                    redirect = target,
                    "Backend refused console access"
                );
                return Flow::Redirect(target);
            }
            ConsoleError::Fetch { resource, .. } => {
                warn!(error = %e, "Console fetch failed");
                self.notify(Notice::warning(format!(
                    "Could not load {resource}; showing the last loaded data. Try again."
                )))
                .await;
            }
            ConsoleError::Mutation { .. } => {
                error!(error = %e, "Console mutation failed");
                self.notify(Notice::error(e.to_string())).await;
            }
            ConsoleError::Validation(message) => {
                self.notify(Notice::error(message)).await;
            }
        }
        Flow::Continue
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::baas::BackendConnector;
    use crate::baas::memory::{MemoryBackend, Operation};
    use crate::console::{HOME_ROUTE, NoticeLevel};
    use ilia_portal_core::{Email, Identity};

    async fn backend_with_admin() -> (MemoryBackend, Identity) {
        let backend = MemoryBackend::new();
        let admin = backend
            .add_account(Email::parse("a@ilia.test").unwrap(), "pw", Some("Admin"), Role::Admin)
            .await;
        backend
            .add_account(Email::parse("u@ilia.test").unwrap(), "pw", None, Role::User)
            .await;
        backend.add_news("Live", "shown", true).await;
        backend.add_news("Draft", "hidden", false).await;
        (backend, admin)
    }

    async fn mount_as(backend: &MemoryBackend, identity: &Identity) -> Result<ConsoleShell, &'static str> {
        let session = backend.session_for(identity).await;
        let observer = SessionObserver::new(Some(identity.clone()));
        ConsoleShell::mount(observer, session, 10).await
    }

    #[test]
    fn test_tab_names() {
        for tab in Tab::ALL {
            assert_eq!(tab.as_str().parse::<Tab>().unwrap(), tab);
        }
        assert!("settings".parse::<Tab>().is_err());
    }

    #[tokio::test]
    async fn test_anonymous_mount_redirects_before_any_fetch() {
        let (backend, _) = backend_with_admin().await;
        let result =
            ConsoleShell::mount(SessionObserver::default(), backend.session(None), 10).await;

        assert_eq!(result.err(), Some(LOGIN_ROUTE));
        assert!(
            backend
                .calls()
                .await
                .iter()
                .all(|call| !call.operation.is_collection_fetch())
        );
    }

    #[tokio::test]
    async fn test_user_mount_redirects_home() {
        let (backend, _) = backend_with_admin().await;
        let user = backend
            .add_account(Email::parse("x@ilia.test").unwrap(), "pw", None, Role::User)
            .await;

        assert_eq!(mount_as(&backend, &user).await.err(), Some(HOME_ROUTE));
        assert_eq!(backend.call_count(Operation::FetchDirectoryPage).await, 0);
        assert_eq!(backend.call_count(Operation::ListNews).await, 0);
    }

    #[tokio::test]
    async fn test_mount_loads_users_and_news_once() {
        let (backend, admin) = backend_with_admin().await;
        let shell = mount_as(&backend, &admin).await.unwrap();

        let view = shell.view().await;
        assert_eq!(view.tab, Tab::Dashboard);
        assert_eq!(view.summary.total_users, Some(2));
        assert_eq!(view.summary.total_news, Some(2));
        assert_eq!(view.summary.published_news, Some(1));

        // Entering tabs that already loaded does not refetch.
        backend.clear_calls().await;
        assert_eq!(shell.select_tab(Tab::Users).await, Flow::Continue);
        assert_eq!(shell.select_tab(Tab::News).await, Flow::Continue);
        assert_eq!(shell.select_tab(Tab::Dashboard).await, Flow::Continue);
        shell.view().await;
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_tab_entry_retries_failed_initial_load() {
        let (backend, admin) = backend_with_admin().await;
        backend.fail_next(Operation::ListNews).await;
        let shell = mount_as(&backend, &admin).await.unwrap();

        let view = shell.view().await;
        assert_eq!(view.summary.total_news, None);
        assert_eq!(view.notices.len(), 1);
        assert_eq!(view.notices[0].level, NoticeLevel::Warning);

        shell.select_tab(Tab::News).await;
        let view = shell.view().await;
        assert_eq!(view.tab, Tab::News);
        assert_eq!(view.news.len(), 2);
        assert!(view.notices.is_empty());
    }

    #[tokio::test]
    async fn test_mutation_failure_is_reported_inline() {
        let (backend, admin) = backend_with_admin().await;
        let shell = mount_as(&backend, &admin).await.unwrap();

        backend.fail_next(Operation::CreateNews).await;
        let flow = shell.save_news("T".to_string(), "C".to_string(), None).await;
        assert_eq!(flow, Flow::Continue);

        let view = shell.view().await;
        assert_eq!(view.notices[0].level, NoticeLevel::Error);
        assert_eq!(view.buffer.title, "T");
        assert_eq!(view.news.len(), 2);
    }

    #[tokio::test]
    async fn test_validation_failure_does_not_call_backend() {
        let (backend, admin) = backend_with_admin().await;
        let shell = mount_as(&backend, &admin).await.unwrap();
        backend.clear_calls().await;

        shell.save_news(String::new(), "C".to_string(), None).await;
        assert!(backend.calls().await.is_empty());
        assert_eq!(shell.view().await.notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_signed_out_session_redirects_to_login() {
        let (backend, admin) = backend_with_admin().await;
        let shell = mount_as(&backend, &admin).await.unwrap();
        backend.clear_calls().await;

        shell.observer().publish(None);
        assert_eq!(shell.refresh_users().await, Flow::Redirect(LOGIN_ROUTE));
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_demoted_admin_is_sent_home() {
        let (backend, admin) = backend_with_admin().await;
        let other = backend
            .add_account(Email::parse("b@ilia.test").unwrap(), "pw", None, Role::Admin)
            .await;
        let shell = mount_as(&backend, &admin).await.unwrap();
        assert_eq!(shell.reauthorize().await, Ok(()));

        backend
            .session_for(&other)
            .await
            .set_role(admin.id, Role::User)
            .await
            .unwrap();

        assert_eq!(shell.reauthorize().await, Err(HOME_ROUTE));
        assert_eq!(shell.refresh_users().await, Flow::Redirect(HOME_ROUTE));
        assert_eq!(
            shell.toggle_role(other.id, Role::Admin).await,
            Flow::Redirect(HOME_ROUTE)
        );
        assert!(shell.view().await.notices.is_empty());
    }

    #[tokio::test]
    async fn test_save_keeps_update_after_remount() {
        let (backend, admin) = backend_with_admin().await;
        let shell = mount_as(&backend, &admin).await.unwrap();
        let item = shell.view().await.news[0].clone();
        assert_eq!(shell.begin_edit(item.id).await, Flow::Continue);
        drop(shell);

        let shell = mount_as(&backend, &admin).await.unwrap();
        let flow = shell
            .save_news("Edited".to_string(), "changed".to_string(), Some(item.id))
            .await;
        assert_eq!(flow, Flow::Continue);

        let stored = backend.news().await;
        assert_eq!(stored.len(), 2);
        let updated = stored.iter().find(|n| n.id == item.id).unwrap();
        assert_eq!(updated.title, "Edited");
        assert_eq!(updated.content, "changed");
    }

    #[tokio::test]
    async fn test_save_with_stale_target_is_rejected() {
        let (backend, admin) = backend_with_admin().await;
        let shell = mount_as(&backend, &admin).await.unwrap();
        let news = shell.view().await.news;
        shell.begin_edit(news[0].id).await;
        backend.clear_calls().await;

        let flow = shell
            .save_news("Edited".to_string(), "changed".to_string(), Some(news[1].id))
            .await;
        assert_eq!(flow, Flow::Continue);
        assert!(backend.calls().await.is_empty());

        let view = shell.view().await;
        assert_eq!(view.notices[0].level, NoticeLevel::Error);
        assert_eq!(view.buffer.editing_id, Some(news[0].id));
    }

    #[tokio::test]
    async fn test_expired_backend_session_redirects_to_login() {
        let (backend, admin) = backend_with_admin().await;
        let token = backend.issue_token(&admin).await;
        let observer = SessionObserver::new(Some(admin.clone()));
        let shell = ConsoleShell::mount(observer, backend.session(Some(&token)), 10)
            .await
            .unwrap();

        backend.sign_out(&token).await.unwrap();
        assert_eq!(shell.refresh_users().await, Flow::Redirect(LOGIN_ROUTE));
        assert_eq!(shell.observer().current(), None);
    }
}
