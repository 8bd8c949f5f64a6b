//! Chapter refresh and release submission on top of the shared browser.
//!
//! [`Pipeline`] ties the pieces together for the outer surface: refreshes run
//! as tracked background tasks, submissions go through a FIFO drained by a
//! single [`SubmissionWorker`].

pub mod config;
mod error;
pub mod form;
pub mod livesearch;
pub mod queue;
pub mod refresh;
pub mod service;
pub mod worker;

#[cfg(test)]
mod testing;

pub use config::CatalogSite;
pub use error::{Error, Result};
pub use form::{release_label, FormLayout, FormSnapshot, MissingField};
pub use livesearch::{LiveSearchPlan, LiveSearchThrottle, SearchKind, SearchStep, SearchTiming};
pub use queue::{BatchTracker, SubmissionJob, SubmissionQueue};
pub use refresh::{refresh_title, RefreshSummary};
pub use service::{parse_chapters, MissingChapter, MissingReport, Pipeline, SubmitReceipt};
pub use worker::{is_rate_limited, Outcome, SubmissionWorker, WorkerConfig, DEFAULT_FORM_URL};
