//! HTTP client for the BaaS.
//!
//! Talks to the backend's auth, REST, RPC and storage endpoints:
//!
//! - Auth: `/auth/v1/token?grant_type=password`, `/auth/v1/user`, `/auth/v1/logout`
//! - Records: `/rest/v1/profiles`, `/rest/v1/news` (row-level policies apply)
//! - Privileged procedures: `/rest/v1/rpc/<name>`
//! - Objects: `/storage/v1/object/<bucket>/<key>`
//!
//! Every request carries the project's anon key in the `apikey` header. The
//! `Authorization` bearer is the caller's access token, or the anon key for
//! anonymous handles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

use ilia_portal_core::{
    Email, Identity, IdentityId, NewsDraft, NewsId, NewsItem, PageRequest, Profile, Role,
};

use super::{
    AccessToken, BaasError, Backend, BackendConnector, ProfileUpdate, SignedIn, avatar_object_key,
};
use crate::config::BaasConfig;

/// Columns selected for profile rows.
const PROFILE_COLUMNS: &str = "id,displayName,role,created_at";

/// Request timeout for every backend call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Named procedures for privileged mutations and reads.
mod rpc {
    pub const PROFILES_PAGINATED: &str = "admin_get_profiles_paginated";
    pub const PROFILES_COUNT: &str = "admin_get_profiles_count";
    pub const UPDATE_ROLE: &str = "admin_update_role";
    pub const CREATE_NEWS: &str = "admin_create_news";
    pub const UPDATE_NEWS: &str = "admin_update_news";
}

/// Connector for the HTTP backend.
///
/// Cheap to clone; session handles created by [`BackendConnector::session`]
/// share the underlying connection pool.
#[derive(Clone)]
pub struct BaasClient {
    inner: Arc<BaasClientInner>,
}

struct BaasClientInner {
    http: reqwest::Client,
    /// Project URL, always ending in `/`.
    base_url: Url,
    anon_key: SecretString,
    avatar_bucket: String,
}

/// Auth service user object.
#[derive(Debug, Deserialize)]
struct UserResponse {
    id: Uuid,
    email: Option<String>,
}

impl UserResponse {
    fn into_identity(self) -> Result<Identity, BaasError> {
        let email = self
            .email
            .as_deref()
            .ok_or_else(|| BaasError::Parse("auth user has no email".to_string()))
            .and_then(|raw| {
                Email::parse(raw).map_err(|e| BaasError::Parse(format!("invalid email: {e}")))
            })?;

        Ok(Identity {
            id: IdentityId::new(self.id),
            email,
        })
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserResponse,
}

impl BaasClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the anon key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &BaasConfig) -> Result<Self, BaasError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(config.anon_key.expose_secret())
            .map_err(|e| BaasError::Parse(format!("Invalid anon key format: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let mut base_url = config.url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(BaasClientInner {
                http,
                base_url,
                anon_key: config.anon_key.clone(),
                avatar_bucket: config.avatar_bucket.clone(),
            }),
        })
    }

    /// Build an endpoint URL below the project URL.
    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, BaasError> {
        let mut url = self
            .inner
            .base_url
            .join(path)
            .map_err(|e| BaasError::Parse(format!("invalid endpoint {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    /// Public URL of an object in the avatar bucket.
    fn public_avatar_url(&self, id: IdentityId) -> String {
        format!(
            "{}storage/v1/object/public/{}/{}",
            self.inner.base_url,
            self.inner.avatar_bucket,
            avatar_object_key(id)
        )
    }
}

#[async_trait]
impl BackendConnector for BaasClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(&self, email: &Email, password: &SecretString) -> Result<SignedIn, BaasError> {
        let url = self.endpoint("auth/v1/token", &[("grant_type", "password")])?;
        let response = self
            .inner
            .http
            .post(url)
            .bearer_auth(self.inner.anon_key.expose_secret())
            .json(&PasswordGrant {
                email: email.as_str(),
                password: password.expose_secret(),
            })
            .send()
            .await?;

        // The auth service answers bad credentials with 400 invalid_grant.
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(BaasError::InvalidCredentials);
        }

        let token: TokenResponse = handle_response(response).await?;
        Ok(SignedIn {
            identity: token.user.into_identity()?,
            access_token: AccessToken::new(token.access_token),
        })
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BaasError> {
        let url = self.endpoint("auth/v1/logout", &[])?;
        let response = self
            .inner
            .http
            .post(url)
            .bearer_auth(token.expose())
            .send()
            .await?;
        handle_empty(response).await
    }

    fn session(&self, token: Option<&AccessToken>) -> Arc<dyn Backend> {
        Arc::new(BaasSession {
            client: self.clone(),
            token: token.cloned(),
        })
    }
}

impl std::fmt::Debug for BaasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaasClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("avatar_bucket", &self.inner.avatar_bucket)
            .finish_non_exhaustive()
    }
}

/// A backend handle acting as one caller.
#[derive(Debug, Clone)]
pub struct BaasSession {
    client: BaasClient,
    token: Option<AccessToken>,
}

impl BaasSession {
    /// Start a request with the caller's bearer token.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let bearer = self.token.as_ref().map_or_else(
            || self.client.inner.anon_key.expose_secret(),
            AccessToken::expose,
        );
        self.client
            .inner
            .http
            .request(method, url)
            .bearer_auth(bearer)
    }

    /// Call a named procedure and decode its result.
    async fn rpc<T: DeserializeOwned>(
        &self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<T, BaasError> {
        let url = self.client.endpoint(&format!("rest/v1/rpc/{name}"), &[])?;
        let response = self.request(Method::POST, url).json(args).send().await?;
        handle_response(response).await
    }

    /// Call a named procedure that returns nothing of interest.
    async fn rpc_unit(&self, name: &str, args: &serde_json::Value) -> Result<(), BaasError> {
        let url = self.client.endpoint(&format!("rest/v1/rpc/{name}"), &[])?;
        let response = self.request(Method::POST, url).json(args).send().await?;
        handle_empty(response).await
    }

    /// Run a filtered PATCH or DELETE and require that a row was affected.
    ///
    /// Row-level policies hide rows instead of rejecting the statement, so an
    /// empty result means the row is missing or the caller may not touch it.
    async fn mutate_row(
        &self,
        method: Method,
        table: &str,
        id: Uuid,
        body: Option<&serde_json::Value>,
    ) -> Result<(), BaasError> {
        let filter = format!("eq.{id}");
        let url = self
            .client
            .endpoint(&format!("rest/v1/{table}"), &[("id", filter.as_str())])?;

        let mut request = self
            .request(method, url)
            .header("Prefer", "return=representation");
        if let Some(body) = body {
            request = request.json(body);
        }

        let rows: Vec<serde_json::Value> = handle_response(request.send().await?).await?;
        if rows.is_empty() {
            return Err(BaasError::NotFound(format!("{table} row {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for BaasSession {
    #[instrument(skip(self))]
    async fn current_identity(&self) -> Result<Option<Identity>, BaasError> {
        if self.token.is_none() {
            return Ok(None);
        }

        let url = self.client.endpoint("auth/v1/user", &[])?;
        let response = self.request(Method::GET, url).send().await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        let user: UserResponse = handle_response(response).await?;
        user.into_identity().map(Some)
    }

    #[instrument(skip(self), fields(profile_id = %id))]
    async fn get_profile(&self, id: IdentityId) -> Result<Option<Profile>, BaasError> {
        let filter = format!("eq.{id}");
        let url = self.client.endpoint(
            "rest/v1/profiles",
            &[("select", PROFILE_COLUMNS), ("id", filter.as_str())],
        )?;
        let response = self.request(Method::GET, url).send().await?;
        let rows: Vec<Profile> = handle_response(response).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self, update), fields(profile_id = %id))]
    async fn update_profile(&self, id: IdentityId, update: &ProfileUpdate) -> Result<(), BaasError> {
        let mut body = serde_json::Map::new();
        if let Some(name) = &update.display_name {
            body.insert("displayName".to_string(), json!(name.as_str()));
        }
        if body.is_empty() {
            return Ok(());
        }

        self.mutate_row(
            Method::PATCH,
            "profiles",
            id.as_uuid(),
            Some(&serde_json::Value::Object(body)),
        )
        .await
    }

    #[instrument(skip(self), fields(page = request.page, sort = %request.sort_key, order = %request.sort_order))]
    async fn fetch_directory_page(&self, request: PageRequest) -> Result<Vec<Profile>, BaasError> {
        self.rpc(
            rpc::PROFILES_PAGINATED,
            &json!({
                "page_number": request.page,
                "page_size": request.page_size,
                "sort_column": request.sort_key.as_str(),
                "sort_direction": request.sort_order.as_str(),
            }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn fetch_directory_count(&self) -> Result<u64, BaasError> {
        let count: i64 = self.rpc(rpc::PROFILES_COUNT, &json!({})).await?;
        u64::try_from(count).map_err(|_| BaasError::Parse(format!("negative count {count}")))
    }

    #[instrument(skip(self), fields(target = %target, role = %role))]
    async fn set_role(&self, target: IdentityId, role: Role) -> Result<(), BaasError> {
        self.rpc_unit(
            rpc::UPDATE_ROLE,
            &json!({ "target_id": target, "new_role": role.as_str() }),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn list_news(&self) -> Result<Vec<NewsItem>, BaasError> {
        let url = self.client.endpoint(
            "rest/v1/news",
            &[("select", "*"), ("order", "created_at.desc")],
        )?;
        let response = self.request(Method::GET, url).send().await?;
        handle_response(response).await
    }

    #[instrument(skip(self, draft))]
    async fn create_news(&self, draft: &NewsDraft) -> Result<(), BaasError> {
        self.rpc_unit(
            rpc::CREATE_NEWS,
            &json!({ "p_title": draft.title(), "p_content": draft.content() }),
        )
        .await
    }

    #[instrument(skip(self, draft), fields(news_id = %id))]
    async fn update_news(&self, id: NewsId, draft: &NewsDraft) -> Result<(), BaasError> {
        self.rpc_unit(
            rpc::UPDATE_NEWS,
            &json!({ "p_id": id, "p_title": draft.title(), "p_content": draft.content() }),
        )
        .await
    }

    #[instrument(skip(self), fields(news_id = %id))]
    async fn delete_news(&self, id: NewsId) -> Result<(), BaasError> {
        self.mutate_row(Method::DELETE, "news", id.as_uuid(), None)
            .await
    }

    #[instrument(skip(self), fields(news_id = %id))]
    async fn set_news_published(&self, id: NewsId, published: bool) -> Result<(), BaasError> {
        self.mutate_row(
            Method::PATCH,
            "news",
            id.as_uuid(),
            Some(&json!({ "is_published": published })),
        )
        .await
    }

    #[instrument(skip(self, bytes), fields(profile_id = %id, size = bytes.len()))]
    async fn upload_avatar(
        &self,
        id: IdentityId,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BaasError> {
        let path = format!(
            "storage/v1/object/{}/{}",
            self.client.inner.avatar_bucket,
            avatar_object_key(id)
        );
        let url = self.client.endpoint(&path, &[])?;
        let response = self
            .request(Method::POST, url)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        handle_empty(response).await
    }

    fn avatar_url(&self, id: IdentityId) -> String {
        self.client.public_avatar_url(id)
    }
}

/// Decode a successful JSON response or map the error status.
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BaasError> {
    if response.status().is_success() {
        return response
            .json()
            .await
            .map_err(|e| BaasError::Parse(format!("Failed to parse response: {e}")));
    }

    Err(parse_error(response).await)
}

/// Accept any successful response, discarding the body.
async fn handle_empty(response: reqwest::Response) -> Result<(), BaasError> {
    if response.status().is_success() {
        return Ok(());
    }

    Err(parse_error(response).await)
}

/// Map an error response to a [`BaasError`].
async fn parse_error(response: reqwest::Response) -> BaasError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    map_status(status, message)
}

fn map_status(status: StatusCode, message: String) -> BaasError {
    match status {
        StatusCode::UNAUTHORIZED => BaasError::Unauthorized,
        StatusCode::FORBIDDEN => BaasError::Forbidden(message),
        StatusCode::NOT_FOUND => BaasError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => BaasError::Unavailable("rate limited".to_string()),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            BaasError::Unavailable(message)
        }
        _ => BaasError::Api {
            status: status.as_u16(),
            message,
        },
    }
}
