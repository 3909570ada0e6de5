//! Paged, sorted user directory.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, instrument};

use ilia_portal_core::{DirectoryPage, PageRequest, SortKey, SortOrder};

use super::ConsoleError;
use crate::baas::Backend;

/// The `(page, sort_key, sort_order)` triple the directory is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Query {
    page: u32,
    sort_key: SortKey,
    sort_order: SortOrder,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            page: 1,
            sort_key: SortKey::default(),
            sort_order: SortOrder::default(),
        }
    }
}

#[derive(Debug)]
struct DirectoryState {
    /// Latest parameters requested.
    requested: Query,
    /// Last successfully applied page.
    shown: DirectoryPage,
    loaded: bool,
    /// Ticket of the newest request issued.
    latest_ticket: u64,
}

impl DirectoryState {
    fn shown_query(&self) -> Query {
        Query {
            page: self.shown.page,
            sort_key: self.shown.sort_key,
            sort_order: self.shown.sort_order,
        }
    }
}

/// Holds paging and sorting state for the user directory and fetches exactly
/// the current page whenever it changes.
///
/// Every change issues one page fetch and one count fetch; both results are
/// applied together. A response is applied only if no newer request was
/// issued in the meantime. On failure the previous page stays visible.
///
/// Changing the sort key or order keeps the current page number.
pub struct PagedSortedDirectory {
    backend: Arc<dyn Backend>,
    page_size: u32,
    state: RwLock<DirectoryState>,
}

impl PagedSortedDirectory {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, page_size: u32) -> Self {
        let query = Query::default();
        Self {
            backend,
            page_size,
            state: RwLock::new(DirectoryState {
                requested: query,
                shown: DirectoryPage {
                    page: query.page,
                    page_size,
                    sort_key: query.sort_key,
                    sort_order: query.sort_order,
                    total_count: 0,
                    items: Vec::new(),
                },
                loaded: false,
                latest_ticket: 0,
            }),
        }
    }

    /// The page currently displayed.
    pub async fn current_page(&self) -> DirectoryPage {
        self.state.read().await.shown.clone()
    }

    /// Whether at least one fetch has been applied.
    pub async fn is_loaded(&self) -> bool {
        self.state.read().await.loaded
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Refetch the current page and count.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn refresh(&self) -> Result<(), ConsoleError> {
        self.fetch(|_| {}).await
    }

    /// Go to page `n`, clamped into `1..=max(total_pages, 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn set_page(&self, n: u32) -> Result<(), ConsoleError> {
        let (target, unchanged) = {
            let state = self.state.read().await;
            let last = state.shown.total_pages().max(1);
            let target = n.clamp(1, last);
            (target, state.loaded && target == state.requested.page)
        };

        if unchanged {
            return Ok(());
        }
        self.fetch(|query| query.page = target).await
    }

    /// Next page, or nothing when already on the last one.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn next_page(&self) -> Result<(), ConsoleError> {
        let next = {
            let state = self.state.read().await;
            let page = state.requested.page;
            (page < state.shown.total_pages()).then_some(page + 1)
        };

        match next {
            Some(page) => self.fetch(|query| query.page = page).await,
            None => Ok(()),
        }
    }

    /// Previous page, or nothing when already on the first one.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn previous_page(&self) -> Result<(), ConsoleError> {
        let previous = {
            let state = self.state.read().await;
            let page = state.requested.page;
            (page > 1).then(|| page - 1)
        };

        match previous {
            Some(page) => self.fetch(|query| query.page = page).await,
            None => Ok(()),
        }
    }

    /// Sort by `key`, keeping the page number.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn set_sort_key(&self, key: SortKey) -> Result<(), ConsoleError> {
        if self.unchanged(|query| query.sort_key == key).await {
            return Ok(());
        }
        self.fetch(|query| query.sort_key = key).await
    }

    /// Sort in `order`, keeping the page number.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn set_sort_order(&self, order: SortOrder) -> Result<(), ConsoleError> {
        if self.unchanged(|query| query.sort_order == order).await {
            return Ok(());
        }
        self.fetch(|query| query.sort_order = order).await
    }

    /// Flip between ascending and descending.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Fetch`] if either fetch fails.
    pub async fn toggle_sort_order(&self) -> Result<(), ConsoleError> {
        self.fetch(|query| query.sort_order = query.sort_order.toggled())
            .await
    }

    async fn unchanged(&self, same: impl FnOnce(&Query) -> bool) -> bool {
        let state = self.state.read().await;
        state.loaded && same(&state.requested)
    }

    /// Apply `change` to the requested parameters, then fetch page and count.
    ///
    /// The lock is released while the backend is being called.
    #[instrument(skip_all)]
    async fn fetch(&self, change: impl FnOnce(&mut Query)) -> Result<(), ConsoleError> {
        let (ticket, request) = {
            let mut state = self.state.write().await;
            change(&mut state.requested);
            state.latest_ticket += 1;
            let query = state.requested;
            (
                state.latest_ticket,
                PageRequest {
                    page: query.page,
                    page_size: self.page_size,
                    sort_key: query.sort_key,
                    sort_order: query.sort_order,
                },
            )
        };

        let result = tokio::try_join!(
            self.backend.fetch_directory_page(request),
            self.backend.fetch_directory_count()
        );

        let mut state = self.state.write().await;
        if ticket != state.latest_ticket {
            debug!(
                ticket,
                latest = state.latest_ticket,
                page = request.page,
                "Discarding superseded directory response"
            );
            return Ok(());
        }

        match result {
            Ok((items, total_count)) => {
                state.shown = DirectoryPage {
                    page: request.page,
                    page_size: self.page_size,
                    sort_key: request.sort_key,
                    sort_order: request.sort_order,
                    total_count,
                    items,
                };
                state.loaded = true;
                Ok(())
            }
            Err(source) => {
                // Retrying the same navigation must issue the same request again.
                state.requested = state.shown_query();
                Err(ConsoleError::fetch("users", source))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::baas::memory::{MemoryBackend, Operation};
    use ilia_portal_core::{Email, Identity, Role};

    /// An admin plus `users - 1` regular accounts, oldest first.
    async fn directory_with(users: usize) -> (MemoryBackend, Identity, Arc<PagedSortedDirectory>) {
        let backend = MemoryBackend::new();
        let admin = backend
            .add_account(
                Email::parse("admin@ilia.test").unwrap(),
                "pw",
                Some("User 00"),
                Role::Admin,
            )
            .await;
        for n in 1..users {
            backend
                .add_account(
                    Email::parse(&format!("user{n}@ilia.test")).unwrap(),
                    "pw",
                    Some(&format!("User {n:02}")),
                    Role::User,
                )
                .await;
        }
        let session = backend.session_for(&admin).await;
        let directory = Arc::new(PagedSortedDirectory::new(session, 10));
        (backend, admin, directory)
    }

    fn names(page: &DirectoryPage) -> Vec<&str> {
        page.items
            .iter()
            .filter_map(|profile| profile.display_name())
            .collect()
    }

    #[tokio::test]
    async fn test_newest_first_paging() {
        let (_, _, directory) = directory_with(23).await;
        directory.refresh().await.unwrap();

        let first = directory.current_page().await;
        assert_eq!(first.total_pages(), 3);
        assert_eq!(first.items.len(), 10);
        assert_eq!(names(&first)[0], "User 22");
        assert_eq!(names(&first)[9], "User 13");

        directory.set_page(3).await.unwrap();
        let last = directory.current_page().await;
        assert_eq!(last.page, 3);
        assert_eq!(names(&last), ["User 02", "User 01", "User 00"]);
    }

    #[tokio::test]
    async fn test_set_page_clamps_and_never_fetches_out_of_range() {
        let (backend, _, directory) = directory_with(23).await;
        directory.refresh().await.unwrap();

        directory.set_page(99).await.unwrap();
        assert_eq!(directory.current_page().await.page, 3);

        directory.set_page(0).await.unwrap();
        assert_eq!(directory.current_page().await.page, 1);

        let pages: Vec<u32> = backend
            .calls()
            .await
            .iter()
            .filter_map(|call| call.page_request)
            .map(|request| request.page)
            .collect();
        assert!(pages.iter().all(|page| (1..=3).contains(page)));
    }

    #[tokio::test]
    async fn test_navigation_bounds_are_no_ops() {
        let (backend, _, directory) = directory_with(12).await;
        directory.refresh().await.unwrap();
        backend.clear_calls().await;

        directory.previous_page().await.unwrap();
        assert!(backend.calls().await.is_empty());

        directory.next_page().await.unwrap();
        assert_eq!(directory.current_page().await.page, 2);
        backend.clear_calls().await;

        directory.next_page().await.unwrap();
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_each_change_fetches_page_and_count() {
        let (backend, _, directory) = directory_with(5).await;
        directory.refresh().await.unwrap();
        backend.clear_calls().await;

        directory.set_sort_key(SortKey::DisplayName).await.unwrap();
        assert_eq!(backend.call_count(Operation::FetchDirectoryPage).await, 1);
        assert_eq!(backend.call_count(Operation::FetchDirectoryCount).await, 1);

        // Same key again changes nothing.
        directory.set_sort_key(SortKey::DisplayName).await.unwrap();
        assert_eq!(backend.call_count(Operation::FetchDirectoryPage).await, 1);
    }

    #[tokio::test]
    async fn test_sort_change_keeps_page() {
        let (_, _, directory) = directory_with(23).await;
        directory.refresh().await.unwrap();
        directory.set_page(2).await.unwrap();

        directory.set_sort_key(SortKey::DisplayName).await.unwrap();
        directory.toggle_sort_order().await.unwrap();

        let page = directory.current_page().await;
        assert_eq!(page.page, 2);
        assert_eq!(page.sort_key, SortKey::DisplayName);
        assert_eq!(page.sort_order, SortOrder::Asc);
        assert_eq!(names(&page)[0], "User 10");
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_page() {
        let (backend, _, directory) = directory_with(23).await;
        directory.refresh().await.unwrap();
        let before = directory.current_page().await;

        backend.fail_next(Operation::FetchDirectoryCount).await;
        let result = directory.next_page().await;
        assert!(matches!(result, Err(ConsoleError::Fetch { resource: "users", .. })));
        assert_eq!(directory.current_page().await, before);

        // Repeating the action retries the same page.
        directory.next_page().await.unwrap();
        assert_eq!(directory.current_page().await.page, 2);
    }

    async fn wait_for_page_fetches(backend: &MemoryBackend, count: usize) {
        while backend.call_count(Operation::FetchDirectoryPage).await < count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_late_stale_response_is_discarded() {
        let (backend, _, directory) = directory_with(23).await;
        directory.refresh().await.unwrap();
        backend.clear_calls().await;

        let page_two = backend.pause_page(2).await;
        let stale = tokio::spawn({
            let directory = Arc::clone(&directory);
            async move { directory.set_page(2).await }
        });
        wait_for_page_fetches(&backend, 1).await;

        let page_one = backend.pause_page(1).await;
        let fresh = tokio::spawn({
            let directory = Arc::clone(&directory);
            async move { directory.set_page(1).await }
        });
        wait_for_page_fetches(&backend, 2).await;

        // Page 2 answers first, then page 1.
        page_two.release();
        stale.await.unwrap().unwrap();
        page_one.release();
        fresh.await.unwrap().unwrap();

        let shown = directory.current_page().await;
        assert_eq!(shown.page, 1);
        assert_eq!(names(&shown)[0], "User 22");
    }

    #[tokio::test]
    async fn test_early_fresh_response_is_not_overwritten() {
        let (backend, _, directory) = directory_with(23).await;
        directory.refresh().await.unwrap();
        backend.clear_calls().await;

        let page_two = backend.pause_page(2).await;
        let stale = tokio::spawn({
            let directory = Arc::clone(&directory);
            async move { directory.set_page(2).await }
        });
        wait_for_page_fetches(&backend, 1).await;

        // Page 1 answers first, then the stale page 2.
        directory.set_page(1).await.unwrap();
        page_two.release();
        stale.await.unwrap().unwrap();

        assert_eq!(directory.current_page().await.page, 1);
    }
}
