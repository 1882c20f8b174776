//! Todos Domain
//!
//! Client-side implementation of the todo list: a REST client for the todo
//! backend, an account service for login and profile management, and the
//! task list synchronizer that keeps a locally ordered list consistent with
//! the server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────────┐
//! │ TaskListSync │   │ AccountService │  ← Local state, validation
//! └──────┬───────┘   └───────┬────────┘
//!        │                   │
//! ┌──────▼───────────────────▼──────┐
//! │   TodoApi / AccountApi traits   │  ← Seam for mocks and fakes
//! └──────────────┬──────────────────┘
//!                │
//! ┌──────────────▼──────────────────┐
//! │ ApiClient (reqwest)             │  ← Bearer token from SessionProvider
//! └─────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use core_config::ClientConfig;
//! use domain_todos::{ApiClient, CreateTask, FileSession, TaskListSync};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let session = Arc::new(FileSession::open(".todo-session.json")?);
//! let client = ApiClient::new(&config, session)?;
//!
//! let sync = TaskListSync::from_config(client, &config);
//! let _ = sync.load(None).await;
//! sync.create(CreateTask::new("Buy milk")).await;
//! let _ = sync.reorder(2, 0).await;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod api;
pub mod client;
pub mod error;
pub mod models;
pub mod reorder;
pub mod service;
pub mod session;
pub mod sync;

// Re-export commonly used types
pub use account::{
    AuthTokens, ChangePassword, LoginCredentials, ProfileImage, SignupData, UpdateProfile, User,
};
pub use api::{AccountApi, TodoApi};
pub use client::ApiClient;
pub use error::{ErrorKind, TodoError, TodoResult};
pub use models::{CreateTask, Task, TaskFilter, TaskPriority, UpdateTask};
pub use service::AccountService;
pub use session::{FileSession, MemorySession, SessionProvider};
pub use sync::{SyncOutcome, TaskListSync};
