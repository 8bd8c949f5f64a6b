use crate::Result;
use chrono::Utc;
use novelsync_browser::{BrowserManager, ChapterScraper, PageDriver, SessionLauncher};
use novelsync_core::{reconcile, ChapterId, ChapterSet, TaskHandle, TitleId, TitleStore};
use serde::Serialize;

/// What a refresh found, after the new snapshots were stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub title_id: TitleId,
    pub source_count: usize,
    pub catalog_count: usize,
    pub missing: Vec<ChapterId>,
}

/// Scrape both sites for one title and replace its stored chapter sets.
///
/// The browser is held for both scrapes and released before parsing, even
/// when a scrape fails. Nothing is written unless both scrapes succeed.
pub async fn refresh_title<L>(
    manager: &BrowserManager<L>,
    store: &dyn TitleStore,
    source: &dyn ChapterScraper,
    catalog: &dyn ChapterScraper,
    title_id: TitleId,
    task: &TaskHandle,
) -> Result<RefreshSummary>
where
    L: SessionLauncher,
    L::Session: PageDriver,
{
    let title = store.require(title_id)?;

    task.progress(5, "Starting browser...");
    let lease = manager.acquire().await?;
    let page: &L::Session = &lease;

    let scraped = async {
        task.progress(10, "Loading source site...");
        let source_labels = source.scrape(page, &title.source_url, None).await?;
        tracing::debug!("Source site listed {} labels", source_labels.len());

        task.progress(55, "Loading catalog...");
        let catalog_labels = catalog
            .scrape(page, &title.catalog_url, title.catalog_group_id.as_deref())
            .await?;
        tracing::debug!("Catalog listed {} labels", catalog_labels.len());

        Ok::<_, novelsync_browser::Error>((source_labels, catalog_labels))
    }
    .await;
    lease.release().await;
    let (source_labels, catalog_labels) = scraped?;

    task.progress(90, "Saving chapters...");
    let source_set = ChapterSet::from_labels(&source_labels);
    let catalog_set = ChapterSet::from_labels(&catalog_labels);
    let missing = reconcile::missing(&source_set, &catalog_set);

    let summary = RefreshSummary {
        title_id,
        source_count: source_set.len(),
        catalog_count: catalog_set.len(),
        missing,
    };
    store.record_chapters(title_id, source_set, catalog_set, Utc::now())?;

    tracing::info!(
        "Refreshed {}: {} source chapters, {} catalogued, {} missing",
        title.name,
        summary.source_count,
        summary.catalog_count,
        summary.missing.len()
    );
    Ok(summary)
}
