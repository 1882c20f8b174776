use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Task priority levels
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TaskPriority {
    Extreme,
    /// Default priority
    #[default]
    Moderate,
    Low,
}

/// Task entity as owned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Server-assigned identifier
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub is_completed: bool,
    /// Sort key among the user's tasks (1-based by convention)
    pub position: i64,
    /// Optional due date
    #[serde(default)]
    pub todo_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a new task
#[derive(Debug, Clone, Serialize, Validate, Default)]
pub struct CreateTask {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: TaskPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_date: Option<NaiveDate>,
}

impl CreateTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.todo_date = Some(date);
        self
    }

    /// Wire form: a missing due date is sent as today's local date and a
    /// missing description as an empty string.
    pub(crate) fn into_request(self) -> CreateTask {
        CreateTask {
            title: self.title.trim().to_string(),
            description: Some(self.description.unwrap_or_default()),
            priority: self.priority,
            todo_date: Some(self.todo_date.unwrap_or_else(|| Local::now().date_naive())),
        }
    }
}

/// DTO for a partial task update; only the fields that are set are sent
#[derive(Debug, Clone, PartialEq, Serialize, Validate, Default)]
pub struct UpdateTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    /// `Some(None)` clears the due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl UpdateTask {
    pub fn completed(is_completed: bool) -> Self {
        Self {
            is_completed: Some(is_completed),
            ..Default::default()
        }
    }

    pub fn position(position: i64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Wire form: the title is trimmed, as on create.
    pub(crate) fn into_request(mut self) -> UpdateTask {
        if let Some(title) = self.title.as_mut() {
            *title = title.trim().to_string();
        }
        self
    }
}

/// Query filters for listing tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TaskFilter {
    /// Exact due-date match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_date: Option<NaiveDate>,
    /// Substring match on title or description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl TaskFilter {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            todo_date: Some(date),
            ..Default::default()
        }
    }

    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: normalize_search(text.into()),
            ..Default::default()
        }
    }

    /// True when no criterion narrows the list.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Blank search text means "no search".
pub(crate) fn normalize_search(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Paginated list envelope returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}
