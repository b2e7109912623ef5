//! REST client for the task backend.
//!
//! Each call is a single request/response exchange against a fixed base URL.
//! Authenticated calls fail with [`ApiError::NotAuthenticated`] before touching
//! the network when no token is attached.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use taskdesk_shared::{LoginRequest, LoginResponse, Page, Task, TaskRequest, TaskUpdate, User, UserRequest};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::filter::TaskFilters;
use crate::session::Session;
use crate::token_store::TokenStorage;

const TASKS: &str = "tareas";
const USERS: &str = "usuarios";

/// Owner of a task being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignee {
    /// The caller; the backend resolves it from the token.
    Me,
    User(i64),
}

impl Assignee {
    /// A missing or zero id means the caller.
    pub fn from_user_id(user_id: Option<i64>) -> Self {
        match user_id {
            Some(id) if id != 0 => Assignee::User(id),
            _ => Assignee::Me,
        }
    }
}

impl fmt::Display for Assignee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignee::Me => f.write_str("me"),
            Assignee::User(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    token: Option<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            token: None,
        })
    }

    /// Same connection pool, different credentials.
    pub fn with_token(&self, token: Option<String>) -> Self {
        Self {
            http: self.http.clone(),
            base: self.base.clone(),
            token,
        }
    }

    pub fn with_session(&self, session: &Session) -> Self {
        self.with_token(Some(session.token().to_string()))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[tracing::instrument(skip(self, store, credentials), fields(username = %credentials.username))]
    pub async fn login(
        &self,
        store: &dyn TokenStorage,
        credentials: &LoginRequest,
    ) -> Result<LoginResponse, ApiError> {
        let url = self.endpoint(&["auth", "login"], &[])?;
        let request = self.http.post(url).json(credentials);

        let body = match self.execute("login", request).await {
            Ok(body) => body,
            Err(err @ (ApiError::Transport(_) | ApiError::Cancelled)) => return Err(err),
            Err(err) => {
                warn!(status = ?err.status(), "login rejected");
                return Err(ApiError::Generic {
                    status: err.status(),
                    message: "invalid credentials".to_string(),
                });
            }
        };

        let response: LoginResponse = parse_body(&body)?;
        if !response.token.trim().is_empty() {
            store
                .save(&response.token)
                .map_err(|err| ApiError::Storage(format!("{err:#}")))?;
            info!("login succeeded; token persisted");
        }
        Ok(response)
    }

    pub async fn list_tasks(&self, page: u32, size: u32) -> Result<Page<Task>, ApiError> {
        let query = paging(page, size);
        self.send_json(Method::GET, &[TASKS], &query, None::<&()>, "list_tasks")
            .await
    }

    pub async fn filter_tasks(
        &self,
        filters: &TaskFilters,
        page: u32,
        size: u32,
    ) -> Result<Page<Task>, ApiError> {
        let query = filters.query_pairs(page, size);
        self.send_json(Method::GET, &[TASKS, "filtrar"], &query, None::<&()>, "filter_tasks")
            .await
    }

    pub async fn create_task(&self, task: &TaskRequest, assignee: Assignee) -> Result<Task, ApiError> {
        let owner = assignee.to_string();
        self.send_json(Method::POST, &[TASKS, "usuario", &owner], &[], Some(task), "create_task")
            .await
    }

    pub async fn update_task(&self, id: i64, task: &TaskUpdate) -> Result<Task, ApiError> {
        let id = id.to_string();
        self.send_json(Method::PUT, &[TASKS, &id], &[], Some(task), "update_task")
            .await
    }

    pub async fn patch_task(&self, id: i64, task: &TaskUpdate) -> Result<Task, ApiError> {
        let id = id.to_string();
        self.send_json(Method::PATCH, &[TASKS, &id], &[], Some(task), "patch_task")
            .await
    }

    pub async fn delete_task(&self, id: i64) -> Result<String, ApiError> {
        let id = id.to_string();
        self.send_text(Method::DELETE, &[TASKS, &id], "delete_task").await
    }

    pub async fn list_users(&self, page: u32, size: u32) -> Result<Page<User>, ApiError> {
        let query = paging(page, size);
        self.send_json(Method::GET, &[USERS], &query, None::<&()>, "list_users")
            .await
    }

    pub async fn create_user(&self, user: &UserRequest) -> Result<User, ApiError> {
        self.send_json(Method::POST, &[USERS], &[], Some(user), "create_user")
            .await
    }

    pub async fn update_user(&self, id: i64, user: &UserRequest) -> Result<User, ApiError> {
        let id = id.to_string();
        self.send_json(Method::PUT, &[USERS, &id], &[], Some(user), "update_user")
            .await
    }

    pub async fn delete_user(&self, id: i64) -> Result<String, ApiError> {
        let id = id.to_string();
        self.send_text(Method::DELETE, &[USERS, &id], "delete_user").await
    }

    /// Finds the caller's own record by matching `mail` against the token
    /// subject, walking the user listing page by page.
    #[tracing::instrument(skip(self))]
    pub async fn current_user(&self, subject: &str, page_size: u32) -> Result<Option<User>, ApiError> {
        let mut page = 0;
        loop {
            let batch = self.list_users(page, page_size).await?;
            if let Some(user) = batch.content.iter().find(|u| u.mail == subject) {
                return Ok(Some(user.clone()));
            }
            if batch.last || batch.is_empty() || page + 1 >= batch.total_pages {
                return Ok(None);
            }
            page += 1;
        }
    }

    fn bearer(&self) -> Result<&str, ApiError> {
        self.token.as_deref().ok_or(ApiError::NotAuthenticated)
    }

    fn endpoint(&self, segments: &[&str], query: &[(&'static str, String)]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::message(format!("base URL cannot carry a path: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn authorized(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&'static str, String)],
    ) -> Result<RequestBuilder, ApiError> {
        let token = self.bearer()?;
        let url = self.endpoint(segments, query)?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&'static str, String)],
        body: Option<&B>,
        op: &'static str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.authorized(method, segments, query)?;
        if let Some(body) = body {
            request = request.json(body);
        }
        let text = self.execute(op, request).await?;
        parse_body(&text)
    }

    async fn send_text(&self, method: Method, segments: &[&str], op: &'static str) -> Result<String, ApiError> {
        let request = self.authorized(method, segments, &[])?;
        self.execute(op, request).await
    }

    #[tracing::instrument(skip(self, request), fields(request_id = %Uuid::new_v4()))]
    async fn execute(&self, op: &'static str, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            debug!(status = status.as_u16(), bytes = body.len(), "request succeeded");
            Ok(body)
        } else {
            warn!(status = status.as_u16(), "request failed");
            Err(ApiError::from_response_body(status, &body))
        }
    }
}

fn paging(page: u32, size: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("size", size.to_string())]
}

fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::Decode(err.to_string()))
}
