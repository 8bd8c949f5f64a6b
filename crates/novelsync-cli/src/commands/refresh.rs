use crate::OutputFormat;
use anyhow::{Result, anyhow, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use novelsync_browser::{PageDriver, SessionLauncher};
use novelsync_core::{Task, TaskId, TaskStatus, TitleId};
use novelsync_pipeline::Pipeline;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

pub fn execute<L>(pipeline: Pipeline<L>, id: TitleId, format: OutputFormat) -> Result<()>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    // Fail on an unknown id before starting Chrome
    let title = pipeline.store().require(id)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let task = runtime.block_on(async {
        let task_id = pipeline.start_refresh(id);
        follow(&pipeline, &task_id, &format!("Refreshing {}", title.name)).await
    })?;

    if task.status == TaskStatus::Error {
        bail!("Refresh failed: {}", task.message);
    }

    match format {
        OutputFormat::Json => crate::print_json(&pipeline.missing(id)?),
        OutputFormat::Pretty => {
            let title = pipeline.store().require(id)?;
            println!(
                "{} Refreshed {}: {} chapters at source, {} catalogued",
                style("✓").green(),
                style(&title.name).bold(),
                title.source_chapters.len(),
                title.catalog_chapters.len()
            );
            super::missing::print_report(&pipeline.missing(id)?);
            Ok(())
        }
    }
}

/// Poll a task behind a spinner until it stops running
pub async fn follow<L>(pipeline: &Pipeline<L>, id: &TaskId, label: &str) -> Result<Task>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let task = loop {
        let task = pipeline
            .task(id)
            .ok_or_else(|| anyhow!("Task {} disappeared", id))?;
        if task.status != TaskStatus::Running {
            break task;
        }
        spinner.set_message(format!("{} [{:>3}%] {}", label, task.progress, task.message));
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    spinner.finish_and_clear();
    Ok(task)
}
