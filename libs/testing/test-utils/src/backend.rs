//! In-process fake of the todo REST backend
//!
//! Serves the same routes as the real backend on an ephemeral local port, with
//! bearer-token auth, per-user tasks and paginated listing. Failures and
//! delays can be injected per request so client error paths can be exercised.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Multipart, Path, Query, RawQuery, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const TODOS_PATH: &str = "/api/todos/";

/// Fake backend wrapper that ensures proper cleanup
///
/// The server task is aborted when this struct is dropped.
pub struct FakeTodoBackend {
    addr: SocketAddr,
    state: SharedState,
    handle: JoinHandle<()>,
}

type SharedState = Arc<BackendState>;

struct BackendState {
    base_url: String,
    inner: Mutex<Inner>,
}

impl BackendState {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("fake backend state poisoned")
    }
}

#[derive(Default)]
struct Inner {
    users: Vec<FakeUser>,
    tokens: HashMap<String, i64>,
    tasks: Vec<FakeTask>,
    next_user_id: i64,
    next_task_id: i64,
    next_token: u64,
    page_size: Option<usize>,
    link_base: Option<String>,
    failing_updates: HashSet<i64>,
    failing_deletes: HashSet<i64>,
    failing_lists: usize,
    list_delays: VecDeque<Duration>,
    list_requests: usize,
    position_updates: Vec<(i64, i64)>,
    profile_uploads: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
struct FakeUser {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    address: Option<String>,
    contact_number: Option<String>,
    birthday: Option<String>,
    profile_image: Option<String>,
    bio: Option<String>,
    #[serde(skip)]
    password: String,
}

#[derive(Debug, Clone, Serialize)]
struct FakeTask {
    id: i64,
    title: String,
    description: String,
    priority: String,
    is_completed: bool,
    position: i64,
    todo_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    owner: i64,
}

/// Task fixture inserted directly into the fake store
#[derive(Debug, Clone)]
pub struct TaskSeed {
    title: String,
    description: String,
    priority: String,
    is_completed: bool,
    todo_date: Option<NaiveDate>,
}

impl TaskSeed {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            priority: "moderate".to_string(),
            is_completed: false,
            todo_date: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: &str) -> Self {
        self.priority = priority.to_string();
        self
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.todo_date = Some(date);
        self
    }
}

impl FakeTodoBackend {
    /// Start the backend on `127.0.0.1` with an OS-assigned port
    ///
    /// # Example
    ///
    /// ```no_run
    /// use test_utils::FakeTodoBackend;
    ///
    /// # async fn example() {
    /// let backend = FakeTodoBackend::start().await;
    /// let user_id = backend.seed_user("ada@example.com", "secret");
    /// let token = backend.issue_token(user_id);
    /// # }
    /// ```
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("Failed to get local address");

        let state = Arc::new(BackendState {
            base_url: format!("http://{}", addr),
            inner: Mutex::new(Inner {
                next_user_id: 1,
                next_task_id: 1,
                ..Default::default()
            }),
        });

        let router = Router::new()
            .route("/api/auth/login/", post(login))
            .route("/api/users/signup/", post(signup))
            .route("/api/users/me/", get(me).patch(update_me))
            .route("/api/users/change-password/", post(change_password))
            .route(TODOS_PATH, get(list_tasks).post(create_task))
            .route("/api/todos/{id}/", patch(update_task).delete(delete_task))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router.into_make_service()).await {
                tracing::error!(error = %e, "Fake backend stopped");
            }
        });

        tracing::info!(%addr, "Fake todo backend ready");

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a user directly; returns the new user id.
    pub fn seed_user(&self, email: &str, password: &str) -> i64 {
        let mut inner = self.state.lock();
        insert_user(&mut inner, email, password, "Test", "User")
    }

    /// Issue a bearer token for `user_id` without going through login.
    pub fn issue_token(&self, user_id: i64) -> String {
        issue_token(&mut self.state.lock(), user_id)
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&self) {
        self.state.lock().tokens.clear();
    }

    /// Insert a task at the end of the owner's list; returns its id.
    pub fn seed_task(&self, owner: i64, seed: TaskSeed) -> i64 {
        let mut inner = self.state.lock();
        let task = FakeTask {
            id: inner.next_task_id,
            title: seed.title,
            description: seed.description,
            priority: seed.priority,
            is_completed: seed.is_completed,
            position: next_position(&inner, owner),
            todo_date: seed.todo_date,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            owner,
        };
        inner.next_task_id += 1;
        let id = task.id;
        inner.tasks.push(task);
        id
    }

    /// Limit list responses to `size` tasks per page.
    pub fn set_page_size(&self, size: usize) {
        self.state.lock().page_size = Some(size.max(1));
    }

    /// Build pagination links against `base` instead of this server's address.
    pub fn set_link_base(&self, base: impl Into<String>) {
        self.state.lock().link_base = Some(base.into());
    }

    /// Every `PATCH` to this task fails with a 500.
    pub fn fail_update(&self, task_id: i64) {
        self.state.lock().failing_updates.insert(task_id);
    }

    /// Every `DELETE` of this task fails with a 500.
    pub fn fail_delete(&self, task_id: i64) {
        self.state.lock().failing_deletes.insert(task_id);
    }

    /// The next list request fails with a 500.
    pub fn fail_next_list(&self) {
        self.state.lock().failing_lists += 1;
    }

    /// Hold the next list response for `delay`.
    ///
    /// The response content is captured when the request arrives, so a
    /// delayed response reflects the state at request time.
    pub fn delay_next_list(&self, delay: Duration) {
        self.state.lock().list_delays.push_back(delay);
    }

    /// Number of list requests served, one per page.
    pub fn list_requests(&self) -> usize {
        self.state.lock().list_requests
    }

    /// `(task id, position)` of every position change received, in arrival order.
    pub fn position_updates(&self) -> Vec<(i64, i64)> {
        self.state.lock().position_updates.clone()
    }

    /// `(task id, position)` of the owner's tasks, sorted by position.
    pub fn task_positions(&self, owner: i64) -> Vec<(i64, i64)> {
        let inner = self.state.lock();
        owned_sorted(&inner, owner)
            .iter()
            .map(|t| (t.id, t.position))
            .collect()
    }

    /// Titles of the owner's tasks, sorted by position.
    pub fn task_titles(&self, owner: i64) -> Vec<String> {
        let inner = self.state.lock();
        owned_sorted(&inner, owner)
            .iter()
            .map(|t| t.title.clone())
            .collect()
    }

    /// File names of every uploaded profile image.
    pub fn profile_uploads(&self) -> Vec<String> {
        self.state.lock().profile_uploads.clone()
    }
}

impl Drop for FakeTodoBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn insert_user(inner: &mut Inner, email: &str, password: &str, first: &str, last: &str) -> i64 {
    let id = inner.next_user_id;
    inner.next_user_id += 1;
    inner.users.push(FakeUser {
        id,
        email: email.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        address: None,
        contact_number: None,
        birthday: None,
        profile_image: None,
        bio: None,
        password: password.to_string(),
    });
    id
}

fn issue_token(inner: &mut Inner, user_id: i64) -> String {
    inner.next_token += 1;
    let token = format!("token-{}-{}", user_id, inner.next_token);
    inner.tokens.insert(token.clone(), user_id);
    token
}

fn next_position(inner: &Inner, owner: i64) -> i64 {
    inner
        .tasks
        .iter()
        .filter(|t| t.owner == owner)
        .map(|t| t.position)
        .max()
        .unwrap_or(0)
        + 1
}

fn owned_sorted(inner: &Inner, owner: i64) -> Vec<FakeTask> {
    let mut tasks: Vec<FakeTask> = inner
        .tasks
        .iter()
        .filter(|t| t.owner == owner)
        .cloned()
        .collect();
    tasks.sort_by_key(|t| (t.position, t.id));
    tasks
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn simulated_failure() -> Response {
    error(StatusCode::INTERNAL_SERVER_ERROR, "Simulated failure")
}

/// Resolve the bearer token to a user id.
fn authenticate(state: &BackendState, headers: &HeaderMap) -> Result<i64, Response> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(error(
            StatusCode::UNAUTHORIZED,
            "Authentication credentials were not provided.",
        ));
    };
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    state.lock().tokens.get(token).copied().ok_or_else(|| {
        error(
            StatusCode::UNAUTHORIZED,
            "Given token not valid for any token type",
        )
    })
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(State(state): State<SharedState>, Json(body): Json<LoginBody>) -> Response {
    let mut inner = state.lock();
    let user_id = inner
        .users
        .iter()
        .find(|u| u.email == body.email && u.password == body.password)
        .map(|u| u.id);

    match user_id {
        Some(id) => {
            let access = issue_token(&mut inner, id);
            let refresh = format!("refresh-{}", access);
            Json(json!({ "access": access, "refresh": refresh })).into_response()
        }
        None => error(
            StatusCode::UNAUTHORIZED,
            "No active account found with the given credentials",
        ),
    }
}

#[derive(Deserialize)]
struct SignupBody {
    first_name: String,
    last_name: String,
    email: String,
    password: String,
}

async fn signup(State(state): State<SharedState>, Json(body): Json<SignupBody>) -> Response {
    let mut inner = state.lock();
    if inner.users.iter().any(|u| u.email == body.email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "email": ["user with this email already exists."] })),
        )
            .into_response();
    }

    let id = insert_user(
        &mut inner,
        &body.email,
        &body.password,
        &body.first_name,
        &body.last_name,
    );
    (
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "email": body.email,
            "first_name": body.first_name,
            "last_name": body.last_name,
        })),
    )
        .into_response()
}

fn user_json(inner: &Inner, user_id: i64) -> Response {
    match inner.users.iter().find(|u| u.id == user_id) {
        Some(user) => Json(user.clone()).into_response(),
        None => error(StatusCode::NOT_FOUND, "User not found"),
    }
}

async fn me(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    match authenticate(&state, &headers) {
        Ok(user_id) => user_json(&state.lock(), user_id),
        Err(response) => response,
    }
}

/// Accepts either a JSON body or a multipart form with an optional `profile_image` file.
async fn update_me(State(state): State<SharedState>, request: Request) -> Response {
    let user_id = match authenticate(&state, request.headers()) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let mut fields: Vec<(String, String)> = Vec::new();
    let mut upload: Option<String> = None;

    if is_multipart {
        let mut multipart = match Multipart::from_request(request, &state).await {
            Ok(m) => m,
            Err(rejection) => return rejection.into_response(),
        };
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            if name == "profile_image" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                if field.bytes().await.is_err() {
                    return error(StatusCode::BAD_REQUEST, "Invalid image upload");
                }
                upload = Some(file_name);
            } else if let Ok(text) = field.text().await {
                fields.push((name, text));
            }
        }
    } else {
        let body = match Bytes::from_request(request, &state).await {
            Ok(body) => body,
            Err(rejection) => return rejection.into_response(),
        };
        let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&body) else {
            return error(StatusCode::BAD_REQUEST, "JSON parse error");
        };
        for (name, value) in map {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            fields.push((name, text));
        }
    }

    let mut inner = state.lock();
    if let Some(file_name) = &upload {
        inner.profile_uploads.push(file_name.clone());
    }
    let base_url = state.base_url.clone();
    let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };

    for (name, value) in fields {
        match name.as_str() {
            "first_name" => user.first_name = value,
            "last_name" => user.last_name = value,
            "address" => user.address = Some(value),
            "contact_number" => user.contact_number = Some(value),
            "birthday" => user.birthday = Some(value),
            "bio" => user.bio = Some(value),
            _ => {}
        }
    }
    if let Some(file_name) = upload {
        user.profile_image = Some(format!("{}/media/profile_images/{}", base_url, file_name));
    }

    Json(user.clone()).into_response()
}

#[derive(Deserialize)]
struct ChangePasswordBody {
    old_password: String,
    new_password: String,
}

async fn change_password(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordBody>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut inner = state.lock();
    let Some(user) = inner.users.iter_mut().find(|u| u.id == user_id) else {
        return error(StatusCode::NOT_FOUND, "User not found");
    };
    if user.password != body.old_password {
        return error(StatusCode::BAD_REQUEST, "Old password is incorrect");
    }
    user.password = body.new_password;
    Json(json!({ "detail": "Password updated successfully" })).into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    todo_date: Option<NaiveDate>,
    search: Option<String>,
    priority: Option<String>,
    is_completed: Option<bool>,
    page: Option<usize>,
}

/// Link to another page of the same query, keeping every filter.
fn page_link(base_url: &str, raw_query: Option<&str>, page: usize) -> String {
    let mut pairs: Vec<String> = raw_query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty() && !pair.starts_with("page="))
        .map(str::to_string)
        .collect();
    pairs.push(format!("page={}", page));
    format!("{}{}?{}", base_url, TODOS_PATH, pairs.join("&"))
}

async fn list_tasks(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
    RawQuery(raw_query): RawQuery,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let (response, delay) = {
        let mut inner = state.lock();
        inner.list_requests += 1;
        let delay = inner.list_delays.pop_front();

        if inner.failing_lists > 0 {
            inner.failing_lists -= 1;
            (simulated_failure(), delay)
        } else {
            let needle = query.search.as_deref().map(str::to_lowercase);
            let matching: Vec<FakeTask> = owned_sorted(&inner, user_id)
                .into_iter()
                .filter(|t| query.todo_date.is_none_or(|d| t.todo_date == Some(d)))
                .filter(|t| query.priority.as_deref().is_none_or(|p| t.priority == p))
                .filter(|t| query.is_completed.is_none_or(|c| t.is_completed == c))
                .filter(|t| {
                    needle.as_deref().is_none_or(|n| {
                        t.title.to_lowercase().contains(n)
                            || t.description.to_lowercase().contains(n)
                    })
                })
                .collect();

            let count = matching.len();
            let page_size = inner.page_size.unwrap_or(count.max(1));
            let page = query.page.unwrap_or(1).max(1);
            let start = (page - 1) * page_size;
            let results: Vec<FakeTask> =
                matching.into_iter().skip(start).take(page_size).collect();

            let link_base = inner.link_base.as_deref().unwrap_or(&state.base_url);
            let next = (start + page_size < count)
                .then(|| page_link(link_base, raw_query.as_deref(), page + 1));
            let previous =
                (page > 1).then(|| page_link(link_base, raw_query.as_deref(), page - 1));

            let body = json!({
                "count": count,
                "next": next,
                "previous": previous,
                "results": results,
            });
            (Json(body).into_response(), delay)
        }
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    response
}

#[derive(Deserialize)]
struct CreateBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    todo_date: Option<NaiveDate>,
}

async fn create_task(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    if body.title.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "title": ["This field may not be blank."] })),
        )
            .into_response();
    }

    let mut inner = state.lock();
    let task = FakeTask {
        id: inner.next_task_id,
        title: body.title,
        description: body.description.unwrap_or_default(),
        priority: body.priority.unwrap_or_else(|| "moderate".to_string()),
        is_completed: false,
        position: next_position(&inner, user_id),
        todo_date: body.todo_date,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        owner: user_id,
    };
    inner.next_task_id += 1;
    inner.tasks.push(task.clone());

    (StatusCode::CREATED, Json(task)).into_response()
}

async fn update_task(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(changes): Json<Value>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut inner = state.lock();
    if inner.failing_updates.contains(&id) {
        return simulated_failure();
    }
    let Some(index) = inner
        .tasks
        .iter()
        .position(|t| t.id == id && t.owner == user_id)
    else {
        return error(StatusCode::NOT_FOUND, "No Todo matches the given query.");
    };

    if let Some(position) = changes.get("position").and_then(Value::as_i64) {
        inner.position_updates.push((id, position));
    }

    let task = &mut inner.tasks[index];
    if let Some(title) = changes.get("title").and_then(Value::as_str) {
        task.title = title.to_string();
    }
    if let Some(description) = changes.get("description").and_then(Value::as_str) {
        task.description = description.to_string();
    }
    if let Some(priority) = changes.get("priority").and_then(Value::as_str) {
        task.priority = priority.to_string();
    }
    if let Some(done) = changes.get("is_completed").and_then(Value::as_bool) {
        task.is_completed = done;
    }
    if let Some(position) = changes.get("position").and_then(Value::as_i64) {
        task.position = position;
    }
    if let Some(date) = changes.get("todo_date") {
        task.todo_date = date.as_str().and_then(|d| d.parse().ok());
    }
    task.updated_at = Utc::now();

    Json(task.clone()).into_response()
}

async fn delete_task(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    let user_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut inner = state.lock();
    if inner.failing_deletes.contains(&id) {
        return simulated_failure();
    }
    let before = inner.tasks.len();
    inner.tasks.retain(|t| !(t.id == id && t.owner == user_id));
    if inner.tasks.len() == before {
        return error(StatusCode::NOT_FOUND, "No Todo matches the given query.");
    }

    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_link_replaces_page_and_keeps_filters() {
        let link = page_link("http://127.0.0.1:1", Some("search=milk&page=2"), 3);
        assert_eq!(link, "http://127.0.0.1:1/api/todos/?search=milk&page=3");

        let link = page_link("http://127.0.0.1:1", None, 2);
        assert_eq!(link, "http://127.0.0.1:1/api/todos/?page=2");
    }

    #[tokio::test]
    async fn test_seeded_tasks_get_increasing_positions() {
        let backend = FakeTodoBackend::start().await;
        let alice = backend.seed_user("alice@example.com", "secret");
        let bob = backend.seed_user("bob@example.com", "secret");

        let a = backend.seed_task(alice, TaskSeed::new("A"));
        let b = backend.seed_task(alice, TaskSeed::new("B"));
        let c = backend.seed_task(bob, TaskSeed::new("C"));

        assert_eq!(backend.task_positions(alice), vec![(a, 1), (b, 2)]);
        assert_eq!(backend.task_positions(bob), vec![(c, 1)]);
    }
}
