//! In-process backend with emulated access policies.
//!
//! Behaves like the hosted BaaS as far as the portal can observe:
//!
//! - Privileged calls from non-admins fail with [`BaasError::Forbidden`]
//! - Non-admins only see published news
//! - Profiles and avatars are owner-only for writes
//!
//! On top of that it records every call, can fail the next call of a given
//! [`Operation`] once, and can hold a directory page fetch until released.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use ilia_portal_core::{
    Email, Identity, IdentityId, NewsDraft, NewsId, NewsItem, PageRequest, Profile, Role, SortKey,
    SortOrder,
};

use super::{
    AccessToken, BaasError, Backend, BackendConnector, ProfileUpdate, SignedIn, avatar_object_key,
};

/// Backend operations, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SignIn,
    SignOut,
    CurrentIdentity,
    GetProfile,
    UpdateProfile,
    FetchDirectoryPage,
    FetchDirectoryCount,
    SetRole,
    ListNews,
    CreateNews,
    UpdateNews,
    DeleteNews,
    SetNewsPublished,
    UploadAvatar,
}

impl Operation {
    /// Whether this operation touches the directory or news collections.
    #[must_use]
    pub const fn is_collection_fetch(self) -> bool {
        matches!(
            self,
            Self::FetchDirectoryPage | Self::FetchDirectoryCount | Self::ListNews
        )
    }
}

/// One entry of the call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub operation: Operation,
    /// Identity the call was made as, `None` for anonymous callers.
    pub caller: Option<IdentityId>,
    /// Parameters of directory page fetches.
    pub page_request: Option<PageRequest>,
}

/// A directory page fetch held back until [`PausedFetch::release`] is called.
#[derive(Debug, Clone)]
pub struct PausedFetch {
    gate: Arc<Notify>,
}

impl PausedFetch {
    /// Let the held fetch complete. Releasing before the fetch arrives lets
    /// it pass straight through.
    pub fn release(&self) {
        self.gate.notify_one();
    }
}

/// A stored avatar object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug)]
struct Account {
    email: Email,
    password: SecretString,
    profile: Profile,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: HashMap<IdentityId, Account>,
    tokens: HashMap<String, IdentityId>,
    news: Vec<NewsItem>,
    avatars: HashMap<IdentityId, StoredObject>,
    calls: Vec<BackendCall>,
    failures: HashSet<Operation>,
    paused_pages: HashMap<u32, Arc<Notify>>,
    clock: Option<DateTime<Utc>>,
}

impl MemoryState {
    /// Strictly increasing timestamps, so creation order is always observable.
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.clock {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.clock = Some(next);
        next
    }

    fn caller(&self, token: Option<&AccessToken>) -> Option<IdentityId> {
        token.and_then(|t| self.tokens.get(t.expose()).copied())
    }

    /// Log the call and consume an injected failure for it, if any.
    fn record(
        &mut self,
        operation: Operation,
        caller: Option<IdentityId>,
        page_request: Option<PageRequest>,
    ) -> Result<(), BaasError> {
        self.calls.push(BackendCall {
            operation,
            caller,
            page_request,
        });
        if self.failures.remove(&operation) {
            return Err(BaasError::Unavailable(format!(
                "injected failure for {operation:?}"
            )));
        }
        Ok(())
    }

    fn is_admin(&self, caller: Option<IdentityId>) -> bool {
        caller
            .and_then(|id| self.accounts.get(&id))
            .is_some_and(|account| account.profile.is_admin())
    }

    fn require_admin(&self, caller: Option<IdentityId>) -> Result<IdentityId, BaasError> {
        let caller = caller.ok_or(BaasError::Unauthorized)?;
        if self.is_admin(Some(caller)) {
            Ok(caller)
        } else {
            Err(BaasError::Forbidden("admin role required".to_string()))
        }
    }

    fn require_owner(&self, caller: Option<IdentityId>, id: IdentityId) -> Result<(), BaasError> {
        match caller {
            None => Err(BaasError::Unauthorized),
            Some(caller) if caller == id => Ok(()),
            Some(_) => Err(BaasError::Forbidden("owner only".to_string())),
        }
    }

    fn news_mut(&mut self, id: NewsId) -> Result<&mut NewsItem, BaasError> {
        self.news
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| BaasError::NotFound(format!("news item {id}")))
    }

    fn directory_page(&self, request: PageRequest) -> Vec<Profile> {
        let mut profiles: Vec<&Profile> = self.accounts.values().map(|a| &a.profile).collect();
        profiles.sort_by(|a, b| {
            let primary = match request.sort_key {
                SortKey::DisplayName => a.display_name.cmp(&b.display_name),
                SortKey::Role => a.role.as_str().cmp(b.role.as_str()),
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let primary = match request.sort_order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });

        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.page_size).unwrap_or(usize::MAX);
        profiles
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }
}

/// In-process backend and connector.
///
/// Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

#[derive(Debug)]
struct MemoryInner {
    state: Mutex<MemoryState>,
    avatar_bucket: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState::default()),
                avatar_bucket: "avatars".to_string(),
            }),
        }
    }

    /// Register an account and its profile.
    pub async fn add_account(
        &self,
        email: Email,
        password: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> Identity {
        let mut state = self.inner.state.lock().await;
        let id = IdentityId::random();
        let created_at = state.now();
        state.accounts.insert(
            id,
            Account {
                email: email.clone(),
                password: SecretString::from(password.to_owned()),
                profile: Profile {
                    id,
                    display_name: display_name.map(str::to_owned),
                    role,
                    created_at,
                },
            },
        );
        Identity { id, email }
    }

    /// Seed a news item directly, bypassing policies and the call log.
    pub async fn add_news(&self, title: &str, content: &str, is_published: bool) -> NewsId {
        let mut state = self.inner.state.lock().await;
        let id = NewsId::random();
        let created_at = state.now();
        state.news.push(NewsItem {
            id,
            title: title.to_owned(),
            content: content.to_owned(),
            created_at,
            is_published,
        });
        id
    }

    /// Issue an access token for an identity without going through sign-in.
    pub async fn issue_token(&self, identity: &Identity) -> AccessToken {
        let token = format!("mem-{}", Uuid::new_v4());
        self.inner
            .state
            .lock()
            .await
            .tokens
            .insert(token.clone(), identity.id);
        AccessToken::new(token)
    }

    /// A backend handle signed in as `identity`.
    pub async fn session_for(&self, identity: &Identity) -> Arc<dyn Backend> {
        let token = self.issue_token(identity).await;
        self.session(Some(&token))
    }

    /// Every call made so far, in order.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.inner.state.lock().await.calls.clone()
    }

    /// Number of recorded calls of one operation.
    pub async fn call_count(&self, operation: Operation) -> usize {
        self.inner
            .state
            .lock()
            .await
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.inner.state.lock().await.calls.clear();
    }

    /// Make the next call of `operation` fail with [`BaasError::Unavailable`].
    pub async fn fail_next(&self, operation: Operation) {
        self.inner.state.lock().await.failures.insert(operation);
    }

    /// Hold the next fetch of directory page `page` until released.
    pub async fn pause_page(&self, page: u32) -> PausedFetch {
        let gate = Arc::new(Notify::new());
        self.inner
            .state
            .lock()
            .await
            .paused_pages
            .insert(page, Arc::clone(&gate));
        PausedFetch { gate }
    }

    /// Current state of a profile, bypassing policies.
    pub async fn profile(&self, id: IdentityId) -> Option<Profile> {
        self.inner
            .state
            .lock()
            .await
            .accounts
            .get(&id)
            .map(|account| account.profile.clone())
    }

    /// Every news item, bypassing policies.
    pub async fn news(&self) -> Vec<NewsItem> {
        self.inner.state.lock().await.news.clone()
    }

    /// The stored avatar for an identity.
    pub async fn avatar(&self, id: IdentityId) -> Option<StoredObject> {
        self.inner.state.lock().await.avatars.get(&id).cloned()
    }
}

#[async_trait]
impl BackendConnector for MemoryBackend {
    async fn sign_in(&self, email: &Email, password: &SecretString) -> Result<SignedIn, BaasError> {
        let mut state = self.inner.state.lock().await;
        state.record(Operation::SignIn, None, None)?;

        let identity = state
            .accounts
            .iter()
            .find(|(_, account)| {
                account.email == *email
                    && account.password.expose_secret() == password.expose_secret()
            })
            .map(|(id, account)| Identity {
                id: *id,
                email: account.email.clone(),
            })
            .ok_or(BaasError::InvalidCredentials)?;

        let token = format!("mem-{}", Uuid::new_v4());
        state.tokens.insert(token.clone(), identity.id);
        Ok(SignedIn {
            identity,
            access_token: AccessToken::new(token),
        })
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), BaasError> {
        let mut state = self.inner.state.lock().await;
        let caller = state.caller(Some(token));
        state.record(Operation::SignOut, caller, None)?;
        state.tokens.remove(token.expose());
        Ok(())
    }

    fn session(&self, token: Option<&AccessToken>) -> Arc<dyn Backend> {
        Arc::new(MemorySession {
            backend: self.clone(),
            token: token.cloned(),
        })
    }
}

/// A [`MemoryBackend`] handle acting as one caller.
#[derive(Debug, Clone)]
pub struct MemorySession {
    backend: MemoryBackend,
    token: Option<AccessToken>,
}

impl MemorySession {
    async fn state(&self) -> tokio::sync::MutexGuard<'_, MemoryState> {
        self.backend.inner.state.lock().await
    }
}

#[async_trait]
impl Backend for MemorySession {
    async fn current_identity(&self) -> Result<Option<Identity>, BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::CurrentIdentity, caller, None)?;
        Ok(caller.and_then(|id| {
            state.accounts.get(&id).map(|account| Identity {
                id,
                email: account.email.clone(),
            })
        }))
    }

    async fn get_profile(&self, id: IdentityId) -> Result<Option<Profile>, BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::GetProfile, caller, None)?;

        let visible = caller == Some(id) || state.is_admin(caller);
        if !visible {
            return Ok(None);
        }
        Ok(state.accounts.get(&id).map(|account| account.profile.clone()))
    }

    async fn update_profile(&self, id: IdentityId, update: &ProfileUpdate) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::UpdateProfile, caller, None)?;
        state.require_owner(caller, id)?;

        let account = state
            .accounts
            .get_mut(&id)
            .ok_or_else(|| BaasError::NotFound(format!("profile {id}")))?;
        if let Some(name) = &update.display_name {
            account.profile.display_name = Some(name.as_str().to_owned());
        }
        Ok(())
    }

    async fn fetch_directory_page(&self, request: PageRequest) -> Result<Vec<Profile>, BaasError> {
        let paused = {
            let mut state = self.state().await;
            let caller = state.caller(self.token.as_ref());
            state.record(Operation::FetchDirectoryPage, caller, Some(request))?;
            state.require_admin(caller)?;
            state.paused_pages.remove(&request.page)
        };

        if let Some(gate) = paused {
            gate.notified().await;
        }

        Ok(self.state().await.directory_page(request))
    }

    async fn fetch_directory_count(&self) -> Result<u64, BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::FetchDirectoryCount, caller, None)?;
        state.require_admin(caller)?;
        Ok(state.accounts.len() as u64)
    }

    async fn set_role(&self, target: IdentityId, role: Role) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::SetRole, caller, None)?;
        state.require_admin(caller)?;

        let account = state
            .accounts
            .get_mut(&target)
            .ok_or_else(|| BaasError::NotFound(format!("profile {target}")))?;
        account.profile.role = role;
        Ok(())
    }

    async fn list_news(&self) -> Result<Vec<NewsItem>, BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::ListNews, caller, None)?;

        let admin = state.is_admin(caller);
        let mut items: Vec<NewsItem> = state
            .news
            .iter()
            .filter(|item| admin || item.is_published)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn create_news(&self, draft: &NewsDraft) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::CreateNews, caller, None)?;
        state.require_admin(caller)?;

        let created_at = state.now();
        state.news.push(NewsItem {
            id: NewsId::random(),
            title: draft.title().to_owned(),
            content: draft.content().to_owned(),
            created_at,
            is_published: false,
        });
        Ok(())
    }

    async fn update_news(&self, id: NewsId, draft: &NewsDraft) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::UpdateNews, caller, None)?;
        state.require_admin(caller)?;

        let item = state.news_mut(id)?;
        item.title = draft.title().to_owned();
        item.content = draft.content().to_owned();
        Ok(())
    }

    async fn delete_news(&self, id: NewsId) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::DeleteNews, caller, None)?;
        state.require_admin(caller)?;

        let before = state.news.len();
        state.news.retain(|item| item.id != id);
        if state.news.len() == before {
            return Err(BaasError::NotFound(format!("news item {id}")));
        }
        Ok(())
    }

    async fn set_news_published(&self, id: NewsId, published: bool) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::SetNewsPublished, caller, None)?;
        state.require_admin(caller)?;

        state.news_mut(id)?.is_published = published;
        Ok(())
    }

    async fn upload_avatar(
        &self,
        id: IdentityId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BaasError> {
        let mut state = self.state().await;
        let caller = state.caller(self.token.as_ref());
        state.record(Operation::UploadAvatar, caller, None)?;
        state.require_owner(caller, id)?;

        state.avatars.insert(
            id,
            StoredObject {
                bytes,
                content_type: content_type.to_owned(),
            },
        );
        Ok(())
    }

    fn avatar_url(&self, id: IdentityId) -> String {
        format!(
            "/storage/v1/object/public/{}/{}",
            self.backend.inner.avatar_bucket,
            avatar_object_key(id)
        )
    }
}
