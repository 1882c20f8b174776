use async_trait::async_trait;

use crate::account::{
    AuthTokens, ChangePassword, DetailResponse, LoginCredentials, SignupRequest, SignupResponse,
    UpdateProfile, User,
};
use crate::error::TodoResult;
use crate::models::{CreateTask, Task, TaskFilter, UpdateTask};

/// Remote task store.
///
/// The backend is the source of truth for ids, positions and timestamps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TodoApi: Send + Sync {
    /// Fetch every task matching the filter, across all result pages.
    async fn list(&self, filter: TaskFilter) -> TodoResult<Vec<Task>>;

    async fn create(&self, input: CreateTask) -> TodoResult<Task>;

    /// Partial update; only the fields set on `changes` are sent.
    async fn update(&self, id: i64, changes: UpdateTask) -> TodoResult<Task>;

    async fn delete(&self, id: i64) -> TodoResult<()>;
}

/// Remote account endpoints
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountApi: Send + Sync {
    async fn login(&self, credentials: LoginCredentials) -> TodoResult<AuthTokens>;

    async fn signup(&self, request: SignupRequest) -> TodoResult<SignupResponse>;

    async fn profile(&self) -> TodoResult<User>;

    async fn update_profile(&self, changes: UpdateProfile) -> TodoResult<User>;

    async fn change_password(&self, request: ChangePassword) -> TodoResult<DetailResponse>;
}
