use crate::chapter::ChapterSet;
use crate::title::{NewTitle, Title, TitleId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Keyed storage for tracked titles
pub trait TitleStore: Send + Sync {
    fn list(&self) -> Result<Vec<Title>>;

    fn get(&self, id: TitleId) -> Result<Option<Title>>;

    fn insert(&self, title: NewTitle) -> Result<Title>;

    /// Returns `false` when no such title existed
    fn remove(&self, id: TitleId) -> Result<bool>;

    /// Replace both chapter snapshots of a title and stamp the check time
    fn record_chapters(
        &self,
        id: TitleId,
        source: ChapterSet,
        catalog: ChapterSet,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Like [`TitleStore::get`] but a missing title is an error
    fn require(&self, id: TitleId) -> Result<Title> {
        self.get(id)?.ok_or(Error::TitleNotFound(id))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Titles {
    next_id: TitleId,
    titles: BTreeMap<TitleId, Title>,
}

impl Titles {
    fn insert(&mut self, title: NewTitle) -> Result<Title> {
        let id = self.next_id.max(1);
        let title = title.into_title(id)?;
        self.next_id = id + 1;
        self.titles.insert(id, title.clone());
        Ok(title)
    }

    fn record_chapters(
        &mut self,
        id: TitleId,
        source: ChapterSet,
        catalog: ChapterSet,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let title = self.titles.get_mut(&id).ok_or(Error::TitleNotFound(id))?;
        title.source_chapters = source;
        title.catalog_chapters = catalog;
        title.last_checked = Some(checked_at);
        Ok(())
    }
}

fn lock(titles: &Mutex<Titles>) -> Result<MutexGuard<'_, Titles>> {
    titles
        .lock()
        .map_err(|_| Error::Store("title store lock poisoned".to_string()))
}

/// Title store kept in memory only
#[derive(Debug, Default)]
pub struct MemoryTitleStore {
    titles: Mutex<Titles>,
}

impl MemoryTitleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TitleStore for MemoryTitleStore {
    fn list(&self) -> Result<Vec<Title>> {
        Ok(lock(&self.titles)?.titles.values().cloned().collect())
    }

    fn get(&self, id: TitleId) -> Result<Option<Title>> {
        Ok(lock(&self.titles)?.titles.get(&id).cloned())
    }

    fn insert(&self, title: NewTitle) -> Result<Title> {
        lock(&self.titles)?.insert(title)
    }

    fn remove(&self, id: TitleId) -> Result<bool> {
        Ok(lock(&self.titles)?.titles.remove(&id).is_some())
    }

    fn record_chapters(
        &self,
        id: TitleId,
        source: ChapterSet,
        catalog: ChapterSet,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        lock(&self.titles)?.record_chapters(id, source, catalog, checked_at)
    }
}

/// Title store persisted as a single JSON document.
///
/// The whole file is rewritten after every mutation.
#[derive(Debug)]
pub struct JsonTitleStore {
    path: PathBuf,
    titles: Mutex<Titles>,
}

impl JsonTitleStore {
    /// Open the store at `path`, starting empty if the file does not exist yet
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let titles = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Titles::default()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Titles::default()
        };

        tracing::debug!(
            "Opened title store {} ({} titles)",
            path.display(),
            titles.titles.len()
        );

        Ok(Self {
            path,
            titles: Mutex::new(titles),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, titles: &Titles) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(titles)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Apply `change` to a copy, persist it, and only then make it current
    fn commit<T>(&self, change: impl FnOnce(&mut Titles) -> Result<T>) -> Result<T> {
        let mut titles = lock(&self.titles)?;
        let mut next = titles.clone();
        let value = change(&mut next)?;
        self.save(&next)?;
        *titles = next;
        Ok(value)
    }
}

impl TitleStore for JsonTitleStore {
    fn list(&self) -> Result<Vec<Title>> {
        Ok(lock(&self.titles)?.titles.values().cloned().collect())
    }

    fn get(&self, id: TitleId) -> Result<Option<Title>> {
        Ok(lock(&self.titles)?.titles.get(&id).cloned())
    }

    fn insert(&self, title: NewTitle) -> Result<Title> {
        let title = self.commit(|titles| titles.insert(title))?;
        tracing::info!("Added title {} ({})", title.id, title.name);
        Ok(title)
    }

    fn remove(&self, id: TitleId) -> Result<bool> {
        if lock(&self.titles)?.titles.get(&id).is_none() {
            return Ok(false);
        }
        self.commit(|titles| Ok(titles.titles.remove(&id).is_some()))
    }

    fn record_chapters(
        &self,
        id: TitleId,
        source: ChapterSet,
        catalog: ChapterSet,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        self.commit(|titles| titles.record_chapters(id, source, catalog, checked_at))
    }
}
