//! Task List Synchronizer
//!
//! Holds the locally displayed, position-ordered task list and reconciles it
//! with the backend, which stays the source of truth.
//!
//! - Field edits, creation and deletion go to the server first and are
//!   followed by a full reload.
//! - Reordering is applied locally at once, then one position update per
//!   task is sent concurrently. If any of them fails the whole list is
//!   reloaded; the failed subset is never retried on its own.
//! - Every reload and every optimistic local change takes a sequence number.
//!   A list response older than the newest applied state is discarded, so a
//!   slow stale reload cannot overwrite a newer one.
//!
//! Failures are recorded in [`TaskListSync::last_error`]. Only
//! [`TaskListSync::delete`] also returns its error to the caller.

use chrono::NaiveDate;
use core_config::ClientConfig;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::api::TodoApi;
use crate::error::{TodoError, TodoResult};
use crate::models::{normalize_search, CreateTask, Task, TaskFilter, UpdateTask};
use crate::reorder::{assign_positions, Relocation};

const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// How a synchronizer operation ended
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Local state now reflects the operation
    Applied,
    /// Nothing to do; no request was sent
    Unchanged,
    /// The response arrived after a newer state had been applied and was dropped
    Stale,
    /// A newer search keystroke arrived during the debounce window
    Superseded,
    /// The operation failed; see `last_error`
    Failed,
}

#[derive(Debug, Default)]
struct SyncState {
    tasks: Vec<Task>,
    filter: TaskFilter,
    last_error: Option<TodoError>,
    /// Sequence number of the newest state applied to `tasks`
    applied_seq: u64,
}

impl SyncState {
    fn index_of(&self, id: i64) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}

/// Marks the synchronizer busy while alive.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct TaskListSync<A: TodoApi> {
    api: Arc<A>,
    state: RwLock<SyncState>,
    seq: AtomicU64,
    search_generation: AtomicU64,
    in_flight: AtomicUsize,
    search_debounce: Duration,
}

impl<A: TodoApi> TaskListSync<A> {
    pub fn new(api: A) -> Self {
        Self::from_shared(Arc::new(api))
    }

    pub fn from_shared(api: Arc<A>) -> Self {
        Self {
            api,
            state: RwLock::new(SyncState::default()),
            seq: AtomicU64::new(0),
            search_generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
        }
    }

    pub fn from_config(api: A, config: &ClientConfig) -> Self {
        Self::new(api).with_search_debounce(config.search_debounce)
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, SyncState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SyncState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Snapshot of the local list, ordered by position.
    pub fn tasks(&self) -> Vec<Task> {
        self.read().tasks.clone()
    }

    pub fn task(&self, id: i64) -> Option<Task> {
        let state = self.read();
        state.index_of(id).map(|index| state.tasks[index].clone())
    }

    /// True while any request issued by this synchronizer is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    pub fn last_error(&self) -> Option<TodoError> {
        self.read().last_error.clone()
    }

    pub fn clear_error(&self) {
        self.write().last_error = None;
    }

    pub fn filter(&self) -> TaskFilter {
        self.read().filter.clone()
    }

    fn record_error(&self, err: TodoError) {
        warn!(error = %err, kind = ?err.kind(), "Task list operation failed");
        self.write().last_error = Some(err);
    }

    /// Fetch the list for `filter` and apply it unless a newer state won.
    async fn fetch(&self, filter: TaskFilter) -> TodoResult<SyncOutcome> {
        let seq = self.next_seq();
        let _busy = BusyGuard::enter(&self.in_flight);
        let result = self.api.list(filter).await;

        let mut state = self.write();
        if seq < state.applied_seq {
            debug!(seq, applied = state.applied_seq, "Discarding stale task list");
            return Ok(SyncOutcome::Stale);
        }

        let mut tasks = result?;
        tasks.sort_by_key(|t| t.position);
        debug!(seq, count = tasks.len(), "Applied task list");
        state.tasks = tasks;
        state.applied_seq = seq;
        Ok(SyncOutcome::Applied)
    }

    /// Reload after a successful mutation; a failure is recorded.
    async fn reload(&self) -> SyncOutcome {
        let filter = self.filter();
        match self.fetch(filter).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record_error(err);
                SyncOutcome::Failed
            }
        }
    }

    /// Reload after a failed mutation; the mutation's error stays the one reported.
    async fn recover(&self) {
        let filter = self.filter();
        if let Err(err) = self.fetch(filter).await {
            warn!(error = %err, "Recovery reload failed, keeping local list");
        }
    }

    /// Replace the local list with the server's, optionally switching filters first.
    ///
    /// On failure the previous list is kept.
    #[instrument(skip(self))]
    pub async fn load(&self, filter: Option<TaskFilter>) -> SyncOutcome {
        let filter = {
            let mut state = self.write();
            state.last_error = None;
            if let Some(filter) = filter {
                state.filter = filter;
            }
            state.filter.clone()
        };

        match self.fetch(filter).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.record_error(err);
                SyncOutcome::Failed
            }
        }
    }

    /// Create a task; the server assigns id and position, so the list is reloaded.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create(&self, draft: CreateTask) -> Option<Task> {
        self.clear_error();
        let request = draft.into_request();
        if let Err(err) = request.validate() {
            self.record_error(err.into());
            return None;
        }

        let _busy = BusyGuard::enter(&self.in_flight);
        match self.api.create(request).await {
            Ok(task) => {
                info!(task_id = task.id, position = task.position, "Created task");
                let _ = self.reload().await;
                Some(task)
            }
            Err(err) => {
                self.record_error(err);
                None
            }
        }
    }

    /// Send a partial update for a task in the local list, then reload.
    ///
    /// The local list is not touched until the reload.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: i64, changes: UpdateTask) -> Option<Task> {
        self.clear_error();
        let Some(current) = self.task(id) else {
            self.record_error(TodoError::NotFound(id));
            return None;
        };
        if changes.is_empty() {
            return Some(current);
        }
        let changes = changes.into_request();
        if let Err(err) = changes.validate() {
            self.record_error(err.into());
            return None;
        }

        let _busy = BusyGuard::enter(&self.in_flight);
        match self.api.update(id, changes).await {
            Ok(task) => {
                info!("Updated task");
                let _ = self.reload().await;
                Some(task)
            }
            Err(err) => {
                self.record_error(err);
                None
            }
        }
    }

    pub async fn set_completed(&self, id: i64, is_completed: bool) -> Option<Task> {
        self.update(id, UpdateTask::completed(is_completed)).await
    }

    /// Remove a task locally and on the server.
    ///
    /// On failure the removed task is put back, a recovery reload runs and the
    /// error is returned, so callers can keep a confirmation prompt open.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> TodoResult<()> {
        let (snapshot, seq) = {
            let mut state = self.write();
            state.last_error = None;
            let Some(index) = state.index_of(id) else {
                let err = TodoError::NotFound(id);
                state.last_error = Some(err.clone());
                return Err(err);
            };
            let snapshot = state.tasks.clone();
            let seq = self.next_seq();
            state.tasks.remove(index);
            state.applied_seq = seq;
            (snapshot, seq)
        };

        let _busy = BusyGuard::enter(&self.in_flight);
        match self.api.delete(id).await {
            Ok(()) => {
                info!("Deleted task");
                let _ = self.reload().await;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Delete failed, restoring task");
                {
                    let mut state = self.write();
                    if state.applied_seq == seq {
                        state.tasks = snapshot;
                    }
                    state.last_error = Some(err.clone());
                }
                self.recover().await;
                Err(err)
            }
        }
    }

    /// Move the task at index `from` to index `to`.
    ///
    /// The new order is shown immediately and every task is renumbered to
    /// `index + 1`; one `{position}` update per task is sent concurrently.
    /// If any update fails the list is reloaded from the server.
    ///
    /// Only the unfiltered list can be reordered; with a filter set the move
    /// is rejected without contacting the server.
    #[instrument(skip(self))]
    pub async fn reorder(&self, from: usize, to: usize) -> SyncOutcome {
        let updates = {
            let mut state = self.write();
            let Some(relocation) = Relocation::new(from, to, state.tasks.len()) else {
                let err = TodoError::Validation(format!(
                    "cannot move task {} to {} in a list of {}",
                    from,
                    to,
                    state.tasks.len()
                ));
                warn!(error = %err, "Rejected reorder");
                state.last_error = Some(err);
                return SyncOutcome::Failed;
            };
            if relocation.is_noop() {
                debug!("Drop on origin, nothing to reorder");
                return SyncOutcome::Unchanged;
            }
            // Positions are global, so a partial list cannot be renumbered.
            if !state.filter.is_empty() {
                let err = TodoError::Validation("cannot reorder a filtered task list".to_string());
                warn!(error = %err, "Rejected reorder");
                state.last_error = Some(err);
                return SyncOutcome::Failed;
            }

            state.last_error = None;
            relocation.apply(&mut state.tasks);
            state.applied_seq = self.next_seq();
            assign_positions(&mut state.tasks)
        };

        let _busy = BusyGuard::enter(&self.in_flight);
        let results = join_all(
            updates
                .iter()
                .map(|&(id, position)| self.api.update(id, UpdateTask::position(position))),
        )
        .await;

        let failures: Vec<(i64, TodoError)> = updates
            .iter()
            .zip(results)
            .filter_map(|(&(id, _), result)| result.err().map(|err| (id, err)))
            .collect();

        match failures.into_iter().next() {
            None => {
                info!(count = updates.len(), "Reordered tasks");
                SyncOutcome::Applied
            }
            Some((task_id, err)) => {
                warn!(task_id, "Position update failed, reloading task list");
                self.record_error(err);
                self.recover().await;
                SyncOutcome::Failed
            }
        }
    }

    /// Drag-end entry point: move the task `active` onto the slot of `over`.
    pub async fn reorder_by_id(&self, active: i64, over: i64) -> SyncOutcome {
        if active == over {
            return SyncOutcome::Unchanged;
        }
        let indices = {
            let state = self.read();
            (state.index_of(active), state.index_of(over))
        };
        match indices {
            (Some(from), Some(to)) => self.reorder(from, to).await,
            (None, _) => {
                self.record_error(TodoError::NotFound(active));
                SyncOutcome::Failed
            }
            (_, None) => {
                self.record_error(TodoError::NotFound(over));
                SyncOutcome::Failed
            }
        }
    }

    /// Change the free-text search and reload once typing settles.
    ///
    /// Calls arriving within the debounce window supersede earlier ones, so a
    /// burst of keystrokes produces a single request.
    pub async fn set_search(&self, text: impl Into<String>) -> SyncOutcome {
        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.write().filter.search = normalize_search(text.into());

        tokio::time::sleep(self.search_debounce).await;
        if self.search_generation.load(Ordering::SeqCst) != generation {
            return SyncOutcome::Superseded;
        }
        self.load(None).await
    }

    /// Change the due-date filter and reload immediately.
    pub async fn set_todo_date(&self, date: Option<NaiveDate>) -> SyncOutcome {
        self.write().filter.todo_date = date;
        self.load(None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTodoApi;
    use crate::error::ErrorKind;
    use crate::models::TaskPriority;
    use chrono::Utc;
    use mockall::predicate::eq;
    use std::sync::Mutex;

    fn task(id: i64, title: &str, position: i64) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: None,
            priority: TaskPriority::Moderate,
            is_completed: false,
            position,
            todo_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn abc() -> Vec<Task> {
        vec![task(1, "A", 1), task(2, "B", 2), task(3, "C", 3)]
    }

    fn seeded(api: MockTodoApi, tasks: Vec<Task>) -> TaskListSync<MockTodoApi> {
        let sync = TaskListSync::new(api);
        sync.write().tasks = tasks;
        sync
    }

    fn titles(sync: &TaskListSync<MockTodoApi>) -> Vec<String> {
        sync.tasks().into_iter().map(|t| t.title).collect()
    }

    fn server_error() -> TodoError {
        TodoError::Server {
            status: 500,
            message: "Internal Server Error".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_sorts_by_position() {
        let mut api = MockTodoApi::new();
        api.expect_list()
            .times(1)
            .returning(|_| Ok(vec![task(3, "C", 9), task(1, "A", 2), task(2, "B", 5)]));

        let sync = TaskListSync::new(api);
        assert_eq!(sync.load(None).await, SyncOutcome::Applied);
        assert_eq!(titles(&sync), vec!["A", "B", "C"]);
        assert!(!sync.is_busy());
        assert_eq!(sync.last_error(), None);
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_list() {
        let mut api = MockTodoApi::new();
        api.expect_list()
            .times(1)
            .returning(|_| Err(TodoError::Network("connection refused".into())));

        let sync = seeded(api, abc());
        assert_eq!(sync.load(None).await, SyncOutcome::Failed);
        assert_eq!(titles(&sync), vec!["A", "B", "C"]);
        assert_eq!(sync.last_error().map(|e| e.kind()), Some(ErrorKind::Network));
    }

    #[tokio::test]
    async fn test_load_with_filter_replaces_stored_filter() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut api = MockTodoApi::new();
        api.expect_list()
            .with(eq(TaskFilter::on(date)))
            .times(1)
            .returning(|_| Ok(vec![]));

        let sync = TaskListSync::new(api);
        assert_eq!(sync.load(Some(TaskFilter::on(date))).await, SyncOutcome::Applied);
        assert_eq!(sync.filter().todo_date, Some(date));
    }

    #[tokio::test]
    async fn test_reorder_moves_b_to_front_with_three_updates() {
        let mut api = MockTodoApi::new();
        for (id, position) in [(2, 1), (1, 2), (3, 3)] {
            api.expect_update()
                .with(eq(id), eq(UpdateTask::position(position)))
                .times(1)
                .returning(move |id, _| Ok(task(id, "", position)));
        }

        let sync = seeded(api, abc());
        assert_eq!(sync.reorder(1, 0).await, SyncOutcome::Applied);

        let tasks = sync.tasks();
        assert_eq!(titles(&sync), vec!["B", "A", "C"]);
        assert_eq!(
            tasks.iter().map(|t| t.position).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(sync.last_error(), None);
    }

    #[tokio::test]
    async fn test_reorder_to_same_index_sends_nothing() {
        let api = MockTodoApi::new();
        let sync = seeded(api, abc());

        assert_eq!(sync.reorder(2, 2).await, SyncOutcome::Unchanged);
        assert_eq!(sync.tasks(), abc());
    }

    #[tokio::test]
    async fn test_reorder_out_of_bounds_is_rejected_locally() {
        let api = MockTodoApi::new();
        let sync = seeded(api, abc());

        assert_eq!(sync.reorder(0, 5).await, SyncOutcome::Failed);
        assert_eq!(titles(&sync), vec!["A", "B", "C"]);
        assert_eq!(sync.last_error().map(|e| e.kind()), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_reorder_of_filtered_list_is_rejected() {
        let mut api = MockTodoApi::new();
        api.expect_update().never();
        let sync = seeded(api, abc());
        sync.write().filter = TaskFilter::search("milk");

        assert_eq!(sync.reorder(1, 0).await, SyncOutcome::Failed);
        assert_eq!(titles(&sync), vec!["A", "B", "C"]);
        assert_eq!(sync.last_error().map(|e| e.kind()), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_reorder_failure_rolls_back_to_server_list() {
        let mut api = MockTodoApi::new();
        api.expect_update().times(3).returning(|id, changes| {
            if id == 3 {
                Err(server_error())
            } else {
                Ok(task(id, "", changes.position.unwrap_or_default()))
            }
        });
        // The server ended up with a partial mix; the reload is authoritative.
        api.expect_list()
            .times(1)
            .returning(|_| Ok(vec![task(1, "A", 2), task(2, "B", 1), task(3, "C", 3)]));

        let sync = seeded(api, abc());
        assert_eq!(sync.reorder(0, 2).await, SyncOutcome::Failed);

        assert_eq!(titles(&sync), vec!["B", "A", "C"]);
        assert_eq!(sync.last_error(), Some(server_error()));
    }

    #[tokio::test]
    async fn test_reorder_by_id_resolves_indices() {
        let mut api = MockTodoApi::new();
        api.expect_update()
            .times(3)
            .returning(|id, changes| Ok(task(id, "", changes.position.unwrap_or_default())));

        let sync = seeded(api, abc());
        assert_eq!(sync.reorder_by_id(1, 3).await, SyncOutcome::Applied);
        assert_eq!(titles(&sync), vec!["B", "C", "A"]);
        assert_eq!(sync.reorder_by_id(2, 2).await, SyncOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_reorder_by_unknown_id_fails() {
        let sync = seeded(MockTodoApi::new(), abc());
        assert_eq!(sync.reorder_by_id(42, 1).await, SyncOutcome::Failed);
        assert_eq!(sync.last_error(), Some(TodoError::NotFound(42)));
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_task_and_returns_error() {
        let mut api = MockTodoApi::new();
        api.expect_delete()
            .with(eq(1))
            .times(1)
            .returning(|_| Err(server_error()));
        api.expect_list().times(1).returning(|_| Ok(abc()));

        let sync = seeded(api, abc());
        let err = sync.delete(1).await.unwrap_err();

        assert_eq!(err, server_error());
        assert!(sync.task(1).is_some());
        assert_eq!(sync.last_error(), Some(server_error()));
    }

    #[tokio::test]
    async fn test_delete_restores_snapshot_when_recovery_fails() {
        let mut api = MockTodoApi::new();
        api.expect_delete().returning(|_| Err(server_error()));
        api.expect_list()
            .returning(|_| Err(TodoError::Network("offline".into())));

        let sync = seeded(api, abc());
        assert!(sync.delete(2).await.is_err());
        assert_eq!(titles(&sync), vec!["A", "B", "C"]);
        assert_eq!(sync.last_error(), Some(server_error()));
    }

    #[tokio::test]
    async fn test_delete_success_reloads() {
        let mut api = MockTodoApi::new();
        api.expect_delete().with(eq(2)).times(1).returning(|_| Ok(()));
        api.expect_list()
            .times(1)
            .returning(|_| Ok(vec![task(1, "A", 1), task(3, "C", 2)]));

        let sync = seeded(api, abc());
        sync.delete(2).await.unwrap();
        assert_eq!(titles(&sync), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_delete_unknown_task_is_not_sent() {
        let sync = seeded(MockTodoApi::new(), abc());
        assert_eq!(sync.delete(9).await, Err(TodoError::NotFound(9)));
    }

    #[tokio::test]
    async fn test_create_reloads_and_returns_created_task() {
        let server = Arc::new(Mutex::new(abc()));
        let mut api = MockTodoApi::new();

        let store = server.clone();
        api.expect_create()
            .withf(|input| input.title == "D" && input.priority == TaskPriority::Extreme)
            .times(1)
            .returning(move |input| {
                let created = task(4, &input.title, 4);
                store.lock().unwrap().push(created.clone());
                Ok(created)
            });
        let store = server.clone();
        api.expect_list()
            .times(1)
            .returning(move |_| Ok(store.lock().unwrap().clone()));

        let sync = seeded(api, abc());
        let created = sync
            .create(CreateTask::new("D").priority(TaskPriority::Extreme))
            .await
            .unwrap();

        assert_eq!(created.id, 4);
        assert_eq!(titles(&sync), vec!["A", "B", "C", "D"]);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title_without_request() {
        let sync = seeded(MockTodoApi::new(), abc());
        assert_eq!(sync.create(CreateTask::new("   ")).await, None);
        assert_eq!(sync.last_error().map(|e| e.kind()), Some(ErrorKind::Validation));
        assert_eq!(sync.tasks(), abc());
    }

    #[tokio::test]
    async fn test_create_failure_leaves_list() {
        let mut api = MockTodoApi::new();
        api.expect_create().times(1).returning(|_| {
            Err(TodoError::Rejected {
                status: 400,
                message: "Bad Request".into(),
            })
        });

        let sync = seeded(api, abc());
        assert_eq!(sync.create(CreateTask::new("D")).await, None);
        assert_eq!(sync.tasks(), abc());
        assert_eq!(sync.last_error().unwrap().to_string(), "Bad Request");
    }

    #[tokio::test]
    async fn test_update_unknown_task_is_not_sent() {
        let sync = seeded(MockTodoApi::new(), abc());
        assert_eq!(sync.set_completed(77, true).await, None);
        assert_eq!(sync.last_error(), Some(TodoError::NotFound(77)));
    }

    #[tokio::test]
    async fn test_update_failure_leaves_list_untouched() {
        let mut api = MockTodoApi::new();
        api.expect_update()
            .with(eq(2), eq(UpdateTask::completed(true)))
            .times(1)
            .returning(|_, _| Err(server_error()));

        let sync = seeded(api, abc());
        assert_eq!(sync.set_completed(2, true).await, None);
        assert_eq!(sync.tasks(), abc());
    }

    #[tokio::test]
    async fn test_update_with_blank_title_is_rejected() {
        let mut api = MockTodoApi::new();
        api.expect_update().never();

        let sync = seeded(api, abc());
        let changes = UpdateTask {
            title: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(sync.update(1, changes).await, None);
        assert_eq!(sync.last_error().map(|e| e.kind()), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_update_trims_title() {
        let mut api = MockTodoApi::new();
        api.expect_update()
            .withf(|id, changes| *id == 1 && changes.title.as_deref() == Some("Renamed"))
            .times(1)
            .returning(|id, _| Ok(task(id, "Renamed", 1)));
        api.expect_list().times(1).returning(|_| Ok(abc()));

        let sync = seeded(api, abc());
        let changes = UpdateTask {
            title: Some("  Renamed ".into()),
            ..Default::default()
        };
        assert_eq!(sync.update(1, changes).await.unwrap().title, "Renamed");
    }

    #[tokio::test]
    async fn test_update_success_reloads() {
        let mut api = MockTodoApi::new();
        api.expect_update().times(1).returning(|id, _| {
            let mut updated = task(id, "B", 2);
            updated.is_completed = true;
            Ok(updated)
        });
        api.expect_list().times(1).returning(|_| {
            let mut tasks = abc();
            tasks[1].is_completed = true;
            Ok(tasks)
        });

        let sync = seeded(api, abc());
        let updated = sync.set_completed(2, true).await.unwrap();
        assert!(updated.is_completed);
        assert!(sync.task(2).unwrap().is_completed);
    }

    /// Hands out list responses through one-shot gates, in call order.
    struct GatedApi {
        gates: Mutex<Vec<tokio::sync::oneshot::Receiver<Vec<Task>>>>,
    }

    #[async_trait::async_trait]
    impl TodoApi for GatedApi {
        async fn list(&self, _filter: TaskFilter) -> TodoResult<Vec<Task>> {
            let gate = self.gates.lock().unwrap().remove(0);
            gate.await.map_err(|e| TodoError::Network(e.to_string()))
        }

        async fn create(&self, _input: CreateTask) -> TodoResult<Task> {
            unimplemented!()
        }

        async fn update(&self, _id: i64, _changes: UpdateTask) -> TodoResult<Task> {
            unimplemented!()
        }

        async fn delete(&self, _id: i64) -> TodoResult<()> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_slow_older_load_does_not_overwrite_newer() {
        let (older_tx, older_rx) = tokio::sync::oneshot::channel();
        let (newer_tx, newer_rx) = tokio::sync::oneshot::channel();
        let sync = TaskListSync::new(GatedApi {
            gates: Mutex::new(vec![older_rx, newer_rx]),
        });

        let older = sync.load(None);
        tokio::pin!(older);
        assert!(futures::poll!(older.as_mut()).is_pending());

        newer_tx.send(abc()).unwrap();
        assert_eq!(sync.load(None).await, SyncOutcome::Applied);

        older_tx.send(vec![task(1, "A", 1)]).unwrap();
        assert_eq!(older.await, SyncOutcome::Stale);

        assert_eq!(sync.tasks().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_keystrokes_are_coalesced() {
        let mut api = MockTodoApi::new();
        api.expect_list()
            .withf(|filter| filter.search.as_deref() == Some("milk"))
            .times(1)
            .returning(|_| Ok(vec![]));

        let sync = TaskListSync::new(api).with_search_debounce(Duration::from_millis(300));

        let first = sync.set_search("m");
        tokio::pin!(first);
        assert!(futures::poll!(first.as_mut()).is_pending());

        let second = sync.set_search("mi");
        tokio::pin!(second);
        assert!(futures::poll!(second.as_mut()).is_pending());

        assert_eq!(sync.set_search("milk").await, SyncOutcome::Applied);
        assert_eq!(first.await, SyncOutcome::Superseded);
        assert_eq!(second.await, SyncOutcome::Superseded);
    }

    #[tokio::test]
    async fn test_date_filter_reloads_immediately_and_composes_with_search() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut api = MockTodoApi::new();
        api.expect_list()
            .withf(move |filter| {
                filter.todo_date == Some(date) && filter.search.as_deref() == Some("milk")
            })
            .times(1)
            .returning(|_| Ok(vec![]));

        let sync = TaskListSync::new(api);
        sync.write().filter.search = Some("milk".into());
        assert_eq!(sync.set_todo_date(Some(date)).await, SyncOutcome::Applied);
    }
}
