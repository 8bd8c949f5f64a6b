use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Finished tasks older than this are dropped from the registry
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Opaque task identifier, rendered as 32 hex characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Error,
}

/// Snapshot of a tracked operation as seen by pollers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    /// Percent, 0 to 100
    pub progress: u8,
    pub message: String,
}

#[derive(Debug)]
struct Entry {
    task: Task,
    finished_at: Option<Instant>,
}

/// Registry of long-running operations and their progress.
///
/// Each entry is written only by the operation that owns its [`TaskHandle`];
/// any number of callers may poll it with [`TaskRegistry::get`].
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    entries: Arc<Mutex<HashMap<TaskId, Entry>>>,
    retention: Duration,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<TaskId, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a running task and hand its write side to the caller
    pub fn open(&self, message: impl Into<String>) -> TaskHandle {
        let id = TaskId::generate();
        let task = Task {
            id,
            status: TaskStatus::Running,
            progress: 0,
            message: message.into(),
        };

        let mut entries = self.entries();
        prune_finished(&mut entries, self.retention);
        entries.insert(
            id,
            Entry {
                task,
                finished_at: None,
            },
        );

        TaskHandle {
            registry: self.clone(),
            id,
        }
    }

    /// Run `op` on its own tokio task and return its id immediately.
    ///
    /// The task is marked completed when `op` returns `Ok`, or error with the
    /// failure's message when it returns `Err`. Must be called from within a
    /// tokio runtime.
    pub fn start<F, Fut, E>(&self, op: F) -> TaskId
    where
        F: FnOnce(TaskHandle) -> Fut,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let handle = self.open("Starting...");
        let id = handle.id();
        let future = op(handle.clone());

        tokio::spawn(async move {
            match future.await {
                Ok(()) => handle.complete("Done"),
                Err(e) => {
                    tracing::warn!("Task {} failed: {}", handle.id(), e);
                    handle.fail(e.to_string());
                }
            }
        });

        id
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.entries().get(id).map(|entry| entry.task.clone())
    }

    /// Drop finished tasks past the retention window; returns how many went
    pub fn prune(&self) -> usize {
        prune_finished(&mut self.entries(), self.retention)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn update(&self, id: &TaskId, apply: impl FnOnce(&mut Entry)) {
        if let Some(entry) = self.entries().get_mut(id)
            && entry.task.status == TaskStatus::Running
        {
            apply(entry);
        }
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn prune_finished(entries: &mut HashMap<TaskId, Entry>, retention: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| match entry.finished_at {
        Some(at) => at.elapsed() < retention,
        None => true,
    });
    before - entries.len()
}

/// Write side of one task. Updates after the task finished are ignored.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    registry: TaskRegistry,
    id: TaskId,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn progress(&self, percent: u8, message: impl Into<String>) {
        let message = message.into();
        self.registry.update(&self.id, |entry| {
            entry.task.progress = percent.min(100);
            entry.task.message = message;
        });
    }

    pub fn complete(&self, message: impl Into<String>) {
        let message = message.into();
        self.registry.update(&self.id, |entry| {
            entry.task.status = TaskStatus::Completed;
            entry.task.progress = 100;
            entry.task.message = message;
            entry.finished_at = Some(Instant::now());
        });
    }

    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.registry.update(&self.id, |entry| {
            entry.task.status = TaskStatus::Error;
            entry.task.message = message;
            entry.finished_at = Some(Instant::now());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    async fn wait_until_finished(registry: &TaskRegistry, id: &TaskId) -> Task {
        for _ in 0..200 {
            let task = registry.get(id).unwrap();
            if task.status != TaskStatus::Running {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {} never finished", id);
    }

    #[tokio::test]
    async fn test_start_returns_before_operation_finishes() {
        let registry = TaskRegistry::new();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (reported_tx, reported_rx) = oneshot::channel::<()>();

        let id = registry.start(|task| async move {
            task.progress(55, "Halfway");
            let _ = reported_tx.send(());
            let _ = release_rx.await;
            Ok::<(), String>(())
        });

        reported_rx.await.unwrap();
        let running = registry.get(&id).unwrap();
        assert_eq!(running.status, TaskStatus::Running);
        assert_eq!(running.progress, 55);
        assert_eq!(running.message, "Halfway");

        release_tx.send(()).unwrap();
        let done = wait_until_finished(&registry, &id).await;
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
    }

    #[tokio::test]
    async fn test_failed_operation_records_message() {
        let registry = TaskRegistry::new();
        let id = registry.start(|task| async move {
            task.progress(10, "Loading");
            Err::<(), String>("login form not found".to_string())
        });

        let failed = wait_until_finished(&registry, &id).await;
        assert_eq!(failed.status, TaskStatus::Error);
        assert_eq!(failed.message, "login form not found");
        assert_eq!(failed.progress, 10);
    }

    #[test]
    fn test_unknown_task_is_not_found() {
        let registry = TaskRegistry::new();
        assert!(registry.get(&TaskId::generate()).is_none());
    }

    #[test]
    fn test_updates_after_finish_are_ignored() {
        let registry = TaskRegistry::new();
        let handle = registry.open("Queued");
        handle.complete("Submitted 2/2");
        handle.progress(10, "late update");
        handle.fail("late failure");

        let task = registry.get(&handle.id()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.message, "Submitted 2/2");
    }

    #[test]
    fn test_progress_is_clamped() {
        let registry = TaskRegistry::new();
        let handle = registry.open("Queued");
        handle.progress(250, "over");
        assert_eq!(registry.get(&handle.id()).unwrap().progress, 100);
    }

    #[test]
    fn test_finished_tasks_are_evicted_after_retention() {
        let registry = TaskRegistry::with_retention(Duration::ZERO);
        let finished = registry.open("first");
        finished.fail("boom");
        let running = registry.open("second");

        // Opening the second task pruned the finished one
        assert!(registry.get(&finished.id()).is_none());
        assert!(registry.get(&running.id()).is_some());
        assert_eq!(registry.prune(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_task_serializes_for_pollers() {
        let registry = TaskRegistry::new();
        let handle = registry.open("Starting...");
        let task = registry.get(&handle.id()).unwrap();

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["progress"], 0);
        assert_eq!(json["id"].as_str().unwrap().len(), 32);
        assert_eq!(json["id"].as_str().unwrap().parse::<TaskId>().unwrap(), task.id);
    }
}
