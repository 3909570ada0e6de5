//! Role toggling.

use std::sync::Arc;

use tracing::{info, instrument};

use ilia_portal_core::{IdentityId, Role};

use super::{ConsoleError, PagedSortedDirectory};
use crate::baas::Backend;

/// Flips a user between `user` and `admin`.
///
/// No confirmation step: the change is trivially reversible.
pub struct RoleToggleController {
    backend: Arc<dyn Backend>,
    directory: Arc<PagedSortedDirectory>,
}

impl RoleToggleController {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, directory: Arc<PagedSortedDirectory>) -> Self {
        Self { backend, directory }
    }

    /// Set `target` to the opposite of `current` and refetch the directory.
    ///
    /// Returns the role that was set.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Mutation`] if the backend rejects the change
    /// (the directory is left untouched), or [`ConsoleError::Fetch`] if the
    /// change succeeded but the refetch did not.
    #[instrument(skip(self), fields(target = %target, current = %current))]
    pub async fn toggle_role(&self, target: IdentityId, current: Role) -> Result<Role, ConsoleError> {
        let new_role = current.toggled();

        self.backend
            .set_role(target, new_role)
            .await
            .map_err(|source| ConsoleError::mutation("role change", source))?;
        info!(target = %target, role = %new_role, "Role changed");

        self.directory.refresh().await?;
        Ok(new_role)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::baas::memory::{MemoryBackend, Operation};
    use ilia_portal_core::Email;

    async fn setup() -> (MemoryBackend, IdentityId, RoleToggleController, Arc<PagedSortedDirectory>) {
        let backend = MemoryBackend::new();
        let admin = backend
            .add_account(Email::parse("a@ilia.test").unwrap(), "pw", None, Role::Admin)
            .await;
        let user = backend
            .add_account(Email::parse("u@ilia.test").unwrap(), "pw", None, Role::User)
            .await;
        let session = backend.session_for(&admin).await;
        let directory = Arc::new(PagedSortedDirectory::new(Arc::clone(&session), 10));
        directory.refresh().await.unwrap();
        let controller = RoleToggleController::new(session, Arc::clone(&directory));
        (backend, user.id, controller, directory)
    }

    fn role_in(page: &ilia_portal_core::DirectoryPage, id: IdentityId) -> Option<Role> {
        page.items.iter().find(|p| p.id == id).map(|p| p.role)
    }

    #[tokio::test]
    async fn test_toggle_is_reflected_in_next_page_fetch() {
        let (backend, user, controller, directory) = setup().await;
        backend.clear_calls().await;

        let role = controller.toggle_role(user, Role::User).await.unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(role_in(&directory.current_page().await, user), Some(Role::Admin));

        let operations: Vec<Operation> = backend.calls().await.iter().map(|c| c.operation).collect();
        assert_eq!(operations[0], Operation::SetRole);
        assert!(operations.contains(&Operation::FetchDirectoryPage));
    }

    #[tokio::test]
    async fn test_toggle_twice_round_trips() {
        let (backend, user, controller, _) = setup().await;

        let role = controller.toggle_role(user, Role::User).await.unwrap();
        controller.toggle_role(user, role).await.unwrap();
        assert_eq!(backend.profile(user).await.unwrap().role, Role::User);
    }

    #[tokio::test]
    async fn test_failed_toggle_leaves_directory_alone() {
        let (backend, user, controller, directory) = setup().await;
        let before = directory.current_page().await;
        backend.clear_calls().await;

        backend.fail_next(Operation::SetRole).await;
        let result = controller.toggle_role(user, Role::User).await;
        assert!(matches!(result, Err(ConsoleError::Mutation { .. })));
        assert_eq!(directory.current_page().await, before);
        assert_eq!(backend.call_count(Operation::FetchDirectoryPage).await, 0);
    }
}
