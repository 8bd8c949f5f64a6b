use crate::chapter::{ChapterId, ChapterSet};
use crate::reconcile;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TitleId = u64;

/// Translation group credited on catalog releases when none is given
pub const DEFAULT_GROUP_NAME: &str = "Fenrir Realm";

/// A tracked series: where it is published and where it is catalogued
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub id: TitleId,
    pub name: String,
    pub source_url: String,
    pub catalog_url: String,
    pub group_name: String,
    /// Pre-resolved catalog series id; lets submission skip the live search
    #[serde(default)]
    pub catalog_series_id: Option<String>,
    /// Pre-resolved catalog group id; also narrows the catalog chapter listing
    #[serde(default)]
    pub catalog_group_id: Option<String>,
    #[serde(default)]
    pub source_chapters: ChapterSet,
    #[serde(default)]
    pub catalog_chapters: ChapterSet,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Title {
    /// Chapters published at the source that the catalog does not list yet
    pub fn missing_chapters(&self) -> Vec<ChapterId> {
        reconcile::missing(&self.source_chapters, &self.catalog_chapters)
    }

    /// Link to a single chapter on the source site
    pub fn chapter_link(&self, chapter: &ChapterId) -> String {
        format!("{}/{}", self.source_url.trim_end_matches('/'), chapter.chapter())
    }
}

/// Fields supplied when registering a title
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTitle {
    pub name: String,
    pub source_url: String,
    pub catalog_url: String,
    pub group_name: Option<String>,
    pub catalog_series_id: Option<String>,
    pub catalog_group_id: Option<String>,
}

impl NewTitle {
    /// Validate and turn into a stored title with the given id
    pub fn into_title(self, id: TitleId) -> Result<Title> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidTitle("name must not be empty".to_string()));
        }
        let source_url = self.source_url.trim().to_string();
        let catalog_url = self.catalog_url.trim().to_string();
        for (field, value) in [("source URL", &source_url), ("catalog URL", &catalog_url)] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(Error::InvalidTitle(format!(
                    "{} must be an http(s) URL: {:?}",
                    field, value
                )));
            }
        }

        Ok(Title {
            id,
            name,
            source_url,
            catalog_url,
            group_name: non_empty(self.group_name).unwrap_or_else(|| DEFAULT_GROUP_NAME.to_string()),
            catalog_series_id: non_empty(self.catalog_series_id),
            catalog_group_id: non_empty(self.catalog_group_id),
            source_chapters: ChapterSet::new(),
            catalog_chapters: ChapterSet::new(),
            last_checked: None,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
