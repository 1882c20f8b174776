//! HTTP client for the todo backend.

use async_trait::async_trait;
use core_config::ClientConfig;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::account::{
    AuthTokens, ChangePassword, DetailResponse, LoginCredentials, SignupRequest, SignupResponse,
    UpdateProfile, User,
};
use crate::api::{AccountApi, TodoApi};
use crate::error::{TodoError, TodoResult};
use crate::models::{CreateTask, Paginated, Task, TaskFilter, UpdateTask};
use crate::session::SessionProvider;

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const SIGNUP_PATH: &str = "/api/users/signup/";
pub const PROFILE_PATH: &str = "/api/users/me/";
pub const CHANGE_PASSWORD_PATH: &str = "/api/users/change-password/";
pub const TODOS_PATH: &str = "/api/todos/";

/// Upper bound on followed `next` links, guarding against a looping backend.
const MAX_PAGES: usize = 1_000;

/// REST client shared by the task synchronizer and the account service.
///
/// Cloning is cheap; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Arc<dyn SessionProvider>) -> TodoResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("todo-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TodoError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<dyn SessionProvider> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn task_url(&self, id: i64) -> String {
        format!("{}{}{}/", self.base_url, TODOS_PATH, id)
    }

    /// True when `url` points under the configured base URL.
    fn is_own_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.base_url)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
    }

    /// Attach the bearer token when the session has one.
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(&self, request: RequestBuilder) -> TodoResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.bytes().await.unwrap_or_default();
        let err = TodoError::from_response(status, &body);
        warn!(%url, status = status.as_u16(), error = %err, "Request rejected by backend");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> TodoResult<T> {
        let response = self.execute(request).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, request: RequestBuilder) -> TodoResult<()> {
        self.execute(request).await?;
        Ok(())
    }

    /// Like `send_json`, but a `204 No Content` or empty body yields `T::default()`.
    async fn send_json_or_default<T>(&self, request: RequestBuilder) -> TodoResult<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.execute(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(T::default());
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&body).map_err(|e| TodoError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TodoApi for ApiClient {
    async fn list(&self, filter: TaskFilter) -> TodoResult<Vec<Task>> {
        let first = self.http.get(self.url(TODOS_PATH)).query(&filter);
        let mut page: Paginated<Task> = self.send_json(first).await?;
        let mut tasks = std::mem::take(&mut page.results);

        let mut pages = 1;
        while let Some(next) = page.next.take() {
            if pages >= MAX_PAGES {
                warn!(pages, "Stopped following pagination links");
                break;
            }
            if !self.is_own_url(&next) {
                warn!(%next, "Refusing to follow pagination link to another host");
                return Err(TodoError::Decode(format!(
                    "pagination link outside {}: {}",
                    self.base_url, next
                )));
            }
            page = self.send_json(self.http.get(next)).await?;
            tasks.append(&mut page.results);
            pages += 1;
        }

        debug!(count = tasks.len(), pages, "Fetched tasks");
        Ok(tasks)
    }

    async fn create(&self, input: CreateTask) -> TodoResult<Task> {
        let request = self.http.post(self.url(TODOS_PATH)).json(&input);
        self.send_json(request).await
    }

    async fn update(&self, id: i64, changes: UpdateTask) -> TodoResult<Task> {
        let request = self.http.patch(self.task_url(id)).json(&changes);
        self.send_json(request).await
    }

    async fn delete(&self, id: i64) -> TodoResult<()> {
        self.send_empty(self.http.delete(self.task_url(id))).await
    }
}

#[async_trait]
impl AccountApi for ApiClient {
    async fn login(&self, credentials: LoginCredentials) -> TodoResult<AuthTokens> {
        let request = self.http.post(self.url(LOGIN_PATH)).json(&credentials);
        self.send_json(request).await
    }

    async fn signup(&self, request: SignupRequest) -> TodoResult<SignupResponse> {
        let request = self.http.post(self.url(SIGNUP_PATH)).json(&request);
        self.send_json(request).await
    }

    async fn profile(&self) -> TodoResult<User> {
        self.send_json(self.http.get(self.url(PROFILE_PATH))).await
    }

    /// Scalar-only updates go out as JSON; an attached image switches the
    /// whole request to multipart.
    async fn update_profile(&self, changes: UpdateProfile) -> TodoResult<User> {
        let request = self.http.patch(self.url(PROFILE_PATH));
        let request = match &changes.profile_image {
            Some(image) => {
                let mut form = Form::new();
                for (name, value) in changes.text_fields() {
                    form = form.text(name, value);
                }
                let part = Part::bytes(image.bytes.clone())
                    .file_name(image.file_name.clone())
                    .mime_str(&image.content_type)
                    .map_err(|e| TodoError::Validation(e.to_string()))?;
                request.multipart(form.part("profile_image", part))
            }
            None => request.json(&changes),
        };
        self.send_json(request).await
    }

    async fn change_password(&self, request: ChangePassword) -> TodoResult<DetailResponse> {
        let request = self.http.post(self.url(CHANGE_PASSWORD_PATH)).json(&request);
        self.send_json_or_default(request).await
    }
}
