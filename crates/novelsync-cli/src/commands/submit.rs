use super::refresh::follow;
use crate::OutputFormat;
use anyhow::{Result, bail};
use console::style;
use novelsync_browser::{PageDriver, SessionLauncher};
use novelsync_core::{TaskStatus, TitleId};
use novelsync_pipeline::{Outcome, Pipeline, parse_chapters};
use serde::Serialize;

#[derive(Serialize)]
struct SubmitSummary {
    /// Jobs queued by this request
    queued: usize,
    /// Chapters the catalog accepted; retries are not counted
    submitted: usize,
    message: String,
}

/// Queue the chosen chapters (all missing ones when none are given) and
/// work the queue until it is empty.
pub fn execute<L>(
    pipeline: Pipeline<L>,
    id: TitleId,
    chapters: &[String],
    format: OutputFormat,
) -> Result<()>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    let chapters = parse_chapters(chapters)?;
    let receipt = pipeline.submit(id, &chapters)?;

    let Some(task_id) = receipt.task_id else {
        match format {
            OutputFormat::Json => crate::print_json(&SubmitSummary {
                queued: 0,
                submitted: 0,
                message: "Nothing to submit".to_string(),
            })?,
            OutputFormat::Pretty => println!("{} Nothing to submit", style("✓").green()),
        }
        return Ok(());
    };

    if format == OutputFormat::Pretty {
        println!(
            "{} Queued {} chapter(s)",
            style("→").cyan(),
            receipt.queued
        );
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let (task, submitted) = runtime.block_on(async {
        let worker = pipeline.worker();
        let (outcomes, task) =
            tokio::join!(worker.drain(), follow(&pipeline, &task_id, "Submitting"));
        pipeline.manager().release().await;
        anyhow::Ok((task?, submitted_count(&outcomes)))
    })?;

    if task.status == TaskStatus::Error {
        bail!("Submission failed: {}", task.message);
    }

    match format {
        OutputFormat::Json => crate::print_json(&SubmitSummary {
            queued: receipt.queued,
            submitted,
            message: task.message,
        }),
        OutputFormat::Pretty => {
            println!("{} {}", style("✓").green(), task.message);
            Ok(())
        }
    }
}

fn submitted_count(outcomes: &[Outcome]) -> usize {
    outcomes
        .iter()
        .filter(|outcome| **outcome == Outcome::Submitted)
        .count()
}
