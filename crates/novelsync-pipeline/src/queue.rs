use novelsync_core::{ChapterId, TaskHandle, Title};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// One chapter release to submit to the catalog
#[derive(Debug, Clone)]
pub struct SubmissionJob {
    /// Title as it was when the job was queued
    pub title: Arc<Title>,
    pub chapter: ChapterId,
    /// Rate-limited attempts so far
    pub attempts: u32,
    pub batch: Option<BatchTracker>,
}

impl SubmissionJob {
    pub fn new(title: Arc<Title>, chapter: ChapterId) -> Self {
        Self {
            title,
            chapter,
            attempts: 0,
            batch: None,
        }
    }

    pub fn with_batch(mut self, batch: BatchTracker) -> Self {
        self.batch = Some(batch);
        self
    }
}

/// FIFO of pending submissions; producers never block, the consumer waits
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    jobs: Mutex<VecDeque<SubmissionJob>>,
    available: Notify,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<SubmissionJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail; also used to re-queue a rate-limited job
    pub fn push(&self, job: SubmissionJob) {
        self.jobs().push_back(job);
        self.available.notify_one();
    }

    pub fn try_pop(&self) -> Option<SubmissionJob> {
        self.jobs().pop_front()
    }

    /// Wait until a job is available and take it
    pub async fn pop(&self) -> SubmissionJob {
        loop {
            if let Some(job) = self.try_pop() {
                return job;
            }
            self.available.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }
}

#[derive(Debug, Default)]
struct BatchState {
    finished: usize,
    failed: usize,
}

/// Reports the outcomes of one submission request through its task
#[derive(Debug, Clone)]
pub struct BatchTracker {
    task: TaskHandle,
    total: usize,
    state: Arc<Mutex<BatchState>>,
}

impl BatchTracker {
    pub fn new(task: TaskHandle, total: usize) -> Self {
        Self {
            task,
            total,
            state: Arc::new(Mutex::new(BatchState::default())),
        }
    }

    pub fn task(&self) -> &TaskHandle {
        &self.task
    }

    /// Note progress on a job that is not finished yet
    pub fn note(&self, message: impl Into<String>) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.task.progress(self.percent(state.finished), message);
    }

    /// Record a job's final outcome; the task finishes with the last job
    pub fn finish_job(&self, succeeded: bool, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.finished += 1;
        if !succeeded {
            state.failed += 1;
        }

        let counted = format!("{} ({}/{})", message, state.finished, self.total);
        if state.finished < self.total {
            self.task.progress(self.percent(state.finished), counted);
        } else if state.failed > 0 {
            self.task.fail(format!(
                "{} of {} submissions failed; last: {}",
                state.failed, self.total, counted
            ));
        } else {
            self.task
                .complete(format!("Submitted {} chapters; last: {}", self.total, counted));
        }
    }

    fn percent(&self, finished: usize) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (finished * 100 / self.total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novelsync_core::{NewTitle, TaskRegistry, TaskStatus};
    use std::time::Duration;

    fn job(chapter: u32) -> SubmissionJob {
        let title = NewTitle {
            name: "Saintess".to_string(),
            source_url: "https://source.example/series/saintess".to_string(),
            catalog_url: "https://catalog.example/series/saintess/".to_string(),
            ..Default::default()
        }
        .into_title(1)
        .unwrap();
        SubmissionJob::new(Arc::new(title), ChapterId::new(None, chapter))
    }

    #[test]
    fn test_queue_is_fifo() {
        let queue = SubmissionQueue::new();
        queue.push(job(1));
        queue.push(job(2));
        queue.push(job(3));

        let order: Vec<u32> = std::iter::from_fn(|| queue.try_pop())
            .map(|j| j.chapter.chapter())
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_producer() {
        let queue = Arc::new(SubmissionQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!consumer.is_finished());

        queue.push(job(7));
        let popped = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.chapter, ChapterId::new(None, 7));
    }

    #[test]
    fn test_batch_completes_after_last_job() {
        let registry = TaskRegistry::new();
        let batch = BatchTracker::new(registry.open("Queued 2 chapters"), 2);

        batch.finish_job(true, "c1 submitted");
        let task = registry.get(&batch.task().id()).unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert_eq!(task.progress, 50);
        assert_eq!(task.message, "c1 submitted (1/2)");

        batch.finish_job(true, "c2 submitted");
        let task = registry.get(&batch.task().id()).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_batch_with_failure_ends_in_error() {
        let registry = TaskRegistry::new();
        let batch = BatchTracker::new(registry.open("Queued 2 chapters"), 2);

        batch.finish_job(false, "c1 failed: series field is empty");
        batch.note("c2 rate limited, retrying");
        assert_eq!(registry.get(&batch.task().id()).unwrap().progress, 50);

        batch.finish_job(true, "c2 submitted");
        let task = registry.get(&batch.task().id()).unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.message.starts_with("1 of 2 submissions failed"));
    }
}
