use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Chrome user-data directory for one session.
///
/// A temporary profile is removed when dropped; a persistent one keeps the
/// catalog login cookies between runs.
#[derive(Debug)]
pub struct ProfileManager {
    path: PathBuf,
    is_temporary: bool,
}

impl ProfileManager {
    pub fn temporary() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("novelsync-profile-")
            .tempdir()?
            .keep();

        Ok(Self {
            path,
            is_temporary: true,
        })
    }

    /// Use (and create if needed) the profile directory at `path`
    pub fn persistent(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        Ok(Self {
            path,
            is_temporary: false,
        })
    }

    /// Persistent profile `~/.novelsync/profiles/<name>`
    pub fn named(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(Error::Browser(format!("Invalid profile name: {:?}", name)));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Browser("Could not determine home directory".to_string()))?;

        Self::persistent(home.join(".novelsync").join("profiles").join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }
}

impl Drop for ProfileManager {
    fn drop(&mut self) {
        if self.is_temporary && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                tracing::debug!("Failed to remove profile {}: {}", self.path.display(), e);
            }
        }
    }
}
