//! Chapter-label extraction for the source site and the catalog site.
//!
//! Scrapers only return raw label text. Parsing and deduplication happen in
//! `novelsync_core::ChapterSet`, which drops anything unparsable.

use crate::page::PageDriver;
use crate::Result;
use async_trait::async_trait;
use lazy_static::lazy_static;
use novelsync_core::ChapterId;
use regex::Regex;
use std::time::Duration;

lazy_static! {
    static ref HREF_CHAPTER_PATH: Regex =
        Regex::new(r"(?i)(?:chapter[-_/]|/)(\d{1,5})(?:/|$)").unwrap();
    static ref HREF_CHAPTER_QUERY: Regex = Regex::new(r"[?&]chapter=(\d{1,5})\b").unwrap();
}

/// Extracts raw chapter labels from a page
#[async_trait]
pub trait ChapterScraper: Send + Sync {
    /// Load `url` and return its chapter labels in page order. An empty
    /// result means nothing was found, not an error.
    async fn scrape(
        &self,
        page: &dyn PageDriver,
        url: &str,
        group_hint: Option<&str>,
    ) -> Result<Vec<String>>;
}

const SOURCE_CHAPTER_SELECTORS: [&str; 3] = [
    r#"div[role="tabpanel"][data-value="free"] a.btn-chapter"#,
    "div.grid-chapter a.btn-chapter",
    "a.btn-chapter",
];

const DISMISS_MODAL_SCRIPT: &str =
    "(() => { try { localStorage.setItem('discord_modal_disabled', 'true'); } catch (e) {} return true; })()";

const REMOVE_OVERLAYS_SCRIPT: &str = r#"(() => {
  document.querySelectorAll('[role="dialog"], .modal, .modal-backdrop, .fixed.inset-0').forEach(el => el.remove());
  document.body && (document.body.style.overflow = 'auto');
  return true;
})()"#;

const SCROLL_GRID_SCRIPT: &str = r#"(() => {
  const grid = document.querySelector('div.grid-chapter');
  if (grid) { grid.scrollTop = grid.scrollHeight; }
  window.scrollTo(0, document.body ? document.body.scrollHeight : 0);
  return true;
})()"#;

/// Reads the free-chapter grid of a title page on the source site
#[derive(Debug, Clone)]
pub struct SourceSiteScraper {
    /// Pause after reloading for client-side rendering
    pub settle: Duration,
    pub scroll_rounds: u32,
    pub scroll_pause: Duration,
    pub wait_timeout: Duration,
}

impl Default for SourceSiteScraper {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            scroll_rounds: 10,
            scroll_pause: Duration::from_millis(400),
            wait_timeout: Duration::from_secs(15),
        }
    }
}

#[async_trait]
impl ChapterScraper for SourceSiteScraper {
    async fn scrape(
        &self,
        page: &dyn PageDriver,
        url: &str,
        _group_hint: Option<&str>,
    ) -> Result<Vec<String>> {
        page.open(url).await?;
        page.run_script(DISMISS_MODAL_SCRIPT).await?;
        page.reload().await?;
        tokio::time::sleep(self.settle).await;

        if page
            .wait_for_element("a.btn-chapter", self.wait_timeout)
            .await
            .is_err()
        {
            tracing::warn!("No chapter links appeared on {}", url);
        }

        page.run_script(REMOVE_OVERLAYS_SCRIPT).await?;
        for _ in 0..self.scroll_rounds {
            page.run_script(SCROLL_GRID_SCRIPT).await?;
            tokio::time::sleep(self.scroll_pause).await;
        }

        for selector in SOURCE_CHAPTER_SELECTORS {
            let anchors = page.anchors(selector).await?;
            let labels: Vec<String> = anchors
                .into_iter()
                .filter(|a| !a.href.contains("/auth/login"))
                .filter_map(|a| {
                    if ChapterId::parse(&a.text).is_some() {
                        Some(a.text)
                    } else {
                        chapter_from_href(&a.href)
                    }
                })
                .collect();

            if !labels.is_empty() {
                tracing::debug!("Found {} chapter labels via {}", labels.len(), selector);
                return Ok(labels);
            }
        }

        tracing::debug!("No chapter anchors matched, scanning page text");
        Ok(labels_from_text(&page.body_text().await?))
    }
}

const CATALOG_POPUP: &str = "#my_popupreading";
const CATALOG_POPUP_OPEN: &str = ".my_popupreading_open";
const CATALOG_POPUP_LABELS: &str = "#my_popupreading ol.sp_chp span[title]";

/// Reads the release list of a series page on the catalog site
#[derive(Debug, Clone)]
pub struct CatalogScraper {
    pub popup_timeout: Duration,
}

impl Default for CatalogScraper {
    fn default() -> Self {
        Self {
            popup_timeout: Duration::from_secs(8),
        }
    }
}

#[async_trait]
impl ChapterScraper for CatalogScraper {
    async fn scrape(
        &self,
        page: &dyn PageDriver,
        url: &str,
        group_hint: Option<&str>,
    ) -> Result<Vec<String>> {
        let url = match group_hint {
            Some(group) => with_group_filter(url, group),
            None => url.to_string(),
        };
        page.open(&url).await?;

        // Expands the full release list into the popup
        let _ = page.run_script("typeof list_allchpstwo === 'function' ? (list_allchpstwo(), true) : false").await?;

        if page
            .wait_for_element(CATALOG_POPUP, self.popup_timeout)
            .await
            .is_err()
            && page.is_present(CATALOG_POPUP_OPEN).await?
        {
            page.click(CATALOG_POPUP_OPEN).await?;
            let _ = page.wait_for_element(CATALOG_POPUP, self.popup_timeout).await;
        }

        let mut labels: Vec<String> = page
            .attribute_values(CATALOG_POPUP_LABELS, "title")
            .await?
            .into_iter()
            .filter(|t| !t.is_empty())
            .collect();

        for anchor in page.anchors("table a").await? {
            if let Some(label) = anchor_label(&anchor.text, &anchor.href) {
                labels.push(label);
            }
        }

        if labels.is_empty() {
            for anchor in page.anchors("a").await? {
                if ChapterId::parse(&anchor.text).is_some() {
                    labels.push(anchor.text);
                }
            }
        }

        if labels.is_empty() {
            tracing::debug!("No release entries found on {}, scanning page text", url);
            labels = labels_from_text(&page.body_text().await?);
        }

        Ok(labels)
    }
}

/// Restrict a catalog series URL to one translation group's releases
pub fn with_group_filter(url: &str, group_id: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(k, _)| k != "pg" && k != "grp")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            {
                let mut query = parsed.query_pairs_mut();
                query.clear();
                for (k, v) in &kept {
                    query.append_pair(k, v);
                }
                query.append_pair("pg", "1");
                query.append_pair("grp", group_id);
            }
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

fn anchor_label(text: &str, href: &str) -> Option<String> {
    if ChapterId::parse(text).is_some() {
        return Some(text.trim().to_string());
    }
    ChapterId::scan_text(href)
        .into_iter()
        .next()
        .map(|id| id.to_string())
}

/// Chapter number embedded in a chapter URL, as a `c<N>` label
fn chapter_from_href(href: &str) -> Option<String> {
    HREF_CHAPTER_PATH
        .captures(href)
        .or_else(|| HREF_CHAPTER_QUERY.captures(href))
        .map(|caps| format!("c{}", &caps[1]))
}

fn labels_from_text(text: &str) -> Vec<String> {
    ChapterId::scan_text(text)
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}
