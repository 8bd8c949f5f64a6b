use crate::livesearch::LiveSearchThrottle;
use crate::queue::{BatchTracker, SubmissionJob, SubmissionQueue};
use crate::refresh::refresh_title;
use crate::worker::{SubmissionWorker, WorkerConfig};
use crate::{Error, Result};
use novelsync_browser::{
    BrowserManager, CatalogScraper, ChapterScraper, ManagerConfig, PageDriver, SessionLauncher,
    SourceSiteScraper,
};
use novelsync_core::{ChapterId, Task, TaskId, TaskRegistry, TitleId, TitleStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// One missing chapter as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MissingChapter {
    pub vol: Option<u32>,
    pub ch: u32,
}

impl From<ChapterId> for MissingChapter {
    fn from(id: ChapterId) -> Self {
        Self {
            vol: id.volume(),
            ch: id.chapter(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingReport {
    pub count: usize,
    pub missing: Vec<MissingChapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub queued: usize,
    /// Tracks the outcomes of the queued jobs; absent when nothing was queued
    pub task_id: Option<TaskId>,
}

/// Parse user-supplied chapter labels, rejecting any that do not parse
pub fn parse_chapters<S: AsRef<str>>(labels: &[S]) -> Result<Vec<ChapterId>> {
    labels
        .iter()
        .map(|label| {
            ChapterId::parse(label.as_ref())
                .ok_or_else(|| Error::UnrecognizedChapter(label.as_ref().to_string()))
        })
        .collect()
}

/// Everything the outer surface needs: refresh tasks, missing listings and
/// the submission queue, sharing one browser manager.
pub struct Pipeline<L: SessionLauncher> {
    manager: Arc<BrowserManager<L>>,
    store: Arc<dyn TitleStore>,
    registry: TaskRegistry,
    queue: Arc<SubmissionQueue>,
    throttle: Arc<LiveSearchThrottle>,
    source_scraper: Arc<dyn ChapterScraper>,
    catalog_scraper: Arc<dyn ChapterScraper>,
    worker_config: WorkerConfig,
}

impl<L> Pipeline<L>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    pub fn new(
        launcher: L,
        manager_config: ManagerConfig,
        store: Arc<dyn TitleStore>,
        worker_config: WorkerConfig,
    ) -> Self {
        Self {
            manager: Arc::new(BrowserManager::new(launcher, manager_config)),
            store,
            registry: TaskRegistry::new(),
            queue: Arc::new(SubmissionQueue::new()),
            throttle: Arc::new(LiveSearchThrottle::new(worker_config.search_interval)),
            source_scraper: Arc::new(SourceSiteScraper::default()),
            catalog_scraper: Arc::new(CatalogScraper::default()),
            worker_config,
        }
    }

    pub fn with_scrapers(
        mut self,
        source: Arc<dyn ChapterScraper>,
        catalog: Arc<dyn ChapterScraper>,
    ) -> Self {
        self.source_scraper = source;
        self.catalog_scraper = catalog;
        self
    }

    pub fn store(&self) -> &Arc<dyn TitleStore> {
        &self.store
    }

    pub fn queue(&self) -> &Arc<SubmissionQueue> {
        &self.queue
    }

    pub fn manager(&self) -> &Arc<BrowserManager<L>> {
        &self.manager
    }

    /// Start refreshing a title's chapter sets in the background
    pub fn start_refresh(&self, title_id: TitleId) -> TaskId {
        let manager = Arc::clone(&self.manager);
        let store = Arc::clone(&self.store);
        let source = Arc::clone(&self.source_scraper);
        let catalog = Arc::clone(&self.catalog_scraper);

        self.registry.start(move |task| async move {
            refresh_title(&manager, &*store, &*source, &*catalog, title_id, &task)
                .await
                .map(|_| ())
        })
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.registry.get(id)
    }

    /// Chapters the source has that the catalog lacks, from the stored sets
    pub fn missing(&self, title_id: TitleId) -> Result<MissingReport> {
        let missing: Vec<MissingChapter> = self
            .store
            .require(title_id)?
            .missing_chapters()
            .into_iter()
            .map(MissingChapter::from)
            .collect();

        Ok(MissingReport {
            count: missing.len(),
            missing,
        })
    }

    /// Queue one job per chapter, in order. An empty list queues every
    /// missing chapter of the title.
    pub fn submit(&self, title_id: TitleId, chapters: &[ChapterId]) -> Result<SubmitReceipt> {
        let title = Arc::new(self.store.require(title_id)?);
        let chapters = if chapters.is_empty() {
            title.missing_chapters()
        } else {
            chapters.to_vec()
        };

        if chapters.is_empty() {
            return Ok(SubmitReceipt {
                queued: 0,
                task_id: None,
            });
        }

        let task = self.registry.open(format!(
            "Queued {} chapters of {}",
            chapters.len(),
            title.name
        ));
        let task_id = task.id();
        let batch = BatchTracker::new(task, chapters.len());

        for chapter in &chapters {
            self.queue
                .push(SubmissionJob::new(Arc::clone(&title), *chapter).with_batch(batch.clone()));
        }
        tracing::info!("Queued {} submissions for {}", chapters.len(), title.name);

        Ok(SubmitReceipt {
            queued: chapters.len(),
            task_id: Some(task_id),
        })
    }

    pub fn worker(&self) -> SubmissionWorker<L> {
        SubmissionWorker::new(
            Arc::clone(&self.manager),
            Arc::clone(&self.queue),
            Arc::clone(&self.throttle),
            self.worker_config.clone(),
        )
    }

    /// Run the long-lived submission worker on its own task
    pub fn spawn_worker(&self) -> JoinHandle<()> {
        let worker = self.worker();
        tokio::spawn(async move { worker.run().await })
    }
}
