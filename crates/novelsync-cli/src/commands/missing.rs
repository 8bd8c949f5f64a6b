use crate::OutputFormat;
use anyhow::Result;
use console::style;
use novelsync_browser::{PageDriver, SessionLauncher};
use novelsync_core::TitleId;
use novelsync_pipeline::{MissingReport, Pipeline};

/// List missing chapters from the stored snapshots; the browser is never started
pub fn execute<L>(pipeline: &Pipeline<L>, id: TitleId, format: OutputFormat) -> Result<()>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    let report = pipeline.missing(id)?;

    match format {
        OutputFormat::Json => crate::print_json(&report),
        OutputFormat::Pretty => {
            print_report(&report);
            Ok(())
        }
    }
}

pub fn print_report(report: &MissingReport) {
    if report.count == 0 {
        println!("{} Catalog is up to date", style("✓").green());
        return;
    }

    println!(
        "\n{}",
        style(format!("Missing on catalog: {}", report.count)).bold()
    );
    for chapter in &report.missing {
        match chapter.vol {
            Some(vol) if vol > 0 => println!("  Vol {} Ch {}", vol, chapter.ch),
            _ => println!("  Ch {}", chapter.ch),
        }
    }
}
