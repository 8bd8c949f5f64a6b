use crate::form::{release_label, FormLayout, FormSnapshot, MissingField};
use crate::livesearch::{LiveSearchPlan, LiveSearchThrottle, SearchKind, SearchTiming};
use crate::queue::{SubmissionJob, SubmissionQueue};
use novelsync_browser::{BrowserManager, Error as BrowserError, LiveSession, PageDriver, SessionLauncher};
use rand::Rng;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FORM_URL: &str = "https://www.novelupdates.com/add-release/";

/// Result of one submission attempt, decided by the step that observed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Submitted,
    RateLimited,
    SessionLost,
    ValidationFailed(MissingField),
    Failed(String),
}

impl Outcome {
    fn describe(&self, label: &str) -> String {
        match self {
            Outcome::Submitted => format!("{} submitted", label),
            Outcome::RateLimited => format!("{} rate limited", label),
            Outcome::SessionLost => format!("{} lost its browser session", label),
            Outcome::ValidationFailed(field) => format!("{} not submitted: {}", label, field),
            Outcome::Failed(detail) => format!("{} failed: {}", label, detail),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub form_url: String,
    pub layout: FormLayout,
    /// Idle time after every successful submission
    pub cooldown: RangeInclusive<Duration>,
    /// Idle time after the catalog reports too many requests
    pub backoff: RangeInclusive<Duration>,
    pub session_lost_pause: Duration,
    /// Minimum spacing between live-search triggers
    pub search_interval: Duration,
    pub search_timing: SearchTiming,
    /// How long to wait for the form to render
    pub wait_timeout: Duration,
    /// `None` retries rate-limited jobs forever
    pub max_rate_limit_retries: Option<u32>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            form_url: DEFAULT_FORM_URL.to_string(),
            layout: FormLayout::default(),
            cooldown: Duration::from_secs(180)..=Duration::from_secs(300),
            backoff: Duration::from_secs(180)..=Duration::from_secs(300),
            session_lost_pause: Duration::from_secs(1),
            search_interval: Duration::from_secs(2),
            search_timing: SearchTiming::default(),
            wait_timeout: Duration::from_secs(15),
            max_rate_limit_retries: Some(12),
        }
    }
}

/// The catalog serves a plain error page when throttling
pub fn is_rate_limited(body: &str) -> bool {
    body.contains("429") && body.contains("Too Many Requests")
}

fn jitter(range: &RangeInclusive<Duration>) -> Duration {
    let low = range.start().as_millis() as u64;
    let high = range.end().as_millis() as u64;
    if high <= low {
        return *range.start();
    }
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Drains the submission queue one job at a time
pub struct SubmissionWorker<L: SessionLauncher> {
    manager: Arc<BrowserManager<L>>,
    queue: Arc<SubmissionQueue>,
    throttle: Arc<LiveSearchThrottle>,
    config: WorkerConfig,
}

impl<L> SubmissionWorker<L>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    pub fn new(
        manager: Arc<BrowserManager<L>>,
        queue: Arc<SubmissionQueue>,
        throttle: Arc<LiveSearchThrottle>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            manager,
            queue,
            throttle,
            config,
        }
    }

    /// Process jobs for as long as the process lives
    pub async fn run(&self) {
        tracing::info!("Submission worker started");
        loop {
            let job = self.queue.pop().await;
            self.process(job).await;
        }
    }

    /// Process jobs until the queue is empty, re-queued jobs included.
    /// Returns the outcome of every attempt, in order.
    pub async fn drain(&self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(job) = self.queue.try_pop() {
            outcomes.push(self.process(job).await);
        }
        outcomes
    }

    /// Attempt one job and act on the outcome: cool down, re-queue or drop it
    pub async fn process(&self, mut job: SubmissionJob) -> Outcome {
        let label = release_label(&job.chapter);
        tracing::info!("Submitting {} {}", job.title.name, label);

        let outcome = self.attempt(&job).await;
        let message = outcome.describe(&label);
        let batch = job.batch.clone();

        match &outcome {
            Outcome::Submitted => {
                tracing::info!("Submitted {} {}", job.title.name, label);
                if let Some(batch) = &batch {
                    batch.finish_job(true, message);
                }
                let cooldown = jitter(&self.config.cooldown);
                tracing::debug!("Cooling down for {}s", cooldown.as_secs());
                pause(cooldown).await;
            }
            Outcome::RateLimited => {
                job.attempts += 1;
                let backoff = jitter(&self.config.backoff);
                match self.config.max_rate_limit_retries {
                    Some(max) if job.attempts > max => {
                        tracing::error!(
                            "Dropping {} {} after {} rate-limited attempts",
                            job.title.name,
                            label,
                            job.attempts
                        );
                        if let Some(batch) = &batch {
                            batch.finish_job(
                                false,
                                format!("{} dropped after {} rate-limited attempts", label, job.attempts),
                            );
                        }
                    }
                    _ => {
                        tracing::warn!("Catalog rate limited. Backing off {}s", backoff.as_secs());
                        if let Some(batch) = &batch {
                            batch.note(format!("{}, retrying", message));
                        }
                        self.queue.push(job);
                    }
                }
                pause(backoff).await;
            }
            Outcome::SessionLost => {
                tracing::warn!("Browser session lost while submitting {} {}", job.title.name, label);
                self.manager.release().await;
                if let Some(batch) = &batch {
                    batch.finish_job(false, message);
                }
                pause(self.config.session_lost_pause).await;
            }
            Outcome::ValidationFailed(_) | Outcome::Failed(_) => {
                if let Some(batch) = &batch {
                    batch.finish_job(false, message);
                }
            }
        }

        outcome
    }

    async fn attempt(&self, job: &SubmissionJob) -> Outcome {
        let lease = match self.manager.acquire().await {
            Ok(lease) => lease,
            Err(e) => {
                tracing::error!("Submission failed: browser unavailable: {}", e);
                return Outcome::Failed(format!("browser unavailable: {}", e));
            }
        };
        let session: &L::Session = &lease;

        let outcome = match self.fill_and_submit(session, job).await {
            Ok(outcome) => outcome,
            Err(BrowserError::SessionClosed) => Outcome::SessionLost,
            Err(e) if !session.is_alive().await => {
                tracing::debug!("Step failed on a dead session: {}", e);
                Outcome::SessionLost
            }
            Err(e) => Outcome::Failed(e.to_string()),
        };

        let reason = match &outcome {
            Outcome::ValidationFailed(field) => Some(field.to_string()),
            Outcome::Failed(detail) => Some(detail.clone()),
            _ => None,
        };
        if let Some(reason) = reason {
            match FormSnapshot::read(session, &self.config.layout).await {
                Ok(snapshot) => tracing::error!("Submission failed: {} | {}", reason, snapshot),
                Err(_) => tracing::error!("Submission failed: {}", reason),
            }
        }

        lease.release().await;
        outcome
    }

    async fn fill_and_submit(
        &self,
        page: &dyn PageDriver,
        job: &SubmissionJob,
    ) -> novelsync_browser::Result<Outcome> {
        let layout = &self.config.layout;
        let title = &job.title;

        page.open(&self.config.form_url).await?;
        if is_rate_limited(&page.body_text().await.unwrap_or_default()) {
            return Ok(Outcome::RateLimited);
        }
        page.wait_for_element(&layout.release, self.config.wait_timeout)
            .await?;

        match &title.catalog_series_id {
            Some(id) => {
                page.set_value(&layout.series_id, id).await?;
                page.set_value(&layout.series_text, &title.name).await?;
            }
            None => {
                self.live_search(page, &layout.series_text, &title.name, SearchKind::Series)
                    .await?
            }
        }

        page.set_value(&layout.release, &release_label(&job.chapter))
            .await?;
        page.set_value(&layout.link, &title.chapter_link(&job.chapter))
            .await?;

        match &title.catalog_group_id {
            Some(id) => {
                page.set_value(&layout.group_id, id).await?;
                page.set_value(&layout.group_text, &title.group_name).await?;
            }
            None => {
                self.live_search(page, &layout.group_text, &title.group_name, SearchKind::Group)
                    .await?
            }
        }

        let snapshot = FormSnapshot::read(page, layout).await?;
        if let Err(field) = snapshot.validate() {
            return Ok(Outcome::ValidationFailed(field));
        }

        page.click(&layout.submit).await?;
        Ok(Outcome::Submitted)
    }

    async fn live_search(
        &self,
        page: &dyn PageDriver,
        selector: &str,
        text: &str,
        kind: SearchKind,
    ) -> novelsync_browser::Result<()> {
        LiveSearchPlan::new(selector, text, kind, self.config.search_timing)
            .run(page, &self.throttle)
            .await
    }
}
