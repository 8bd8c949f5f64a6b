//! Runtime settings shared by the commands: where the title store lives and
//! how the browser is launched. Every setting can come from a flag or from its
//! `NOVELSYNC_*` environment variable.

use anyhow::{Result, anyhow};
use clap::Args;
use novelsync_browser::{
    CatalogCredentials, ChromeLauncher, LauncherConfig, ManagerConfig,
};
use novelsync_core::JsonTitleStore;
use novelsync_pipeline::{CatalogSite, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;

/// `~/.novelsync/titles.json`
pub fn default_store_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".novelsync").join("titles.json"))
}

pub fn open_store(path: Option<PathBuf>) -> Result<JsonTitleStore> {
    let path = match path {
        Some(path) => path,
        None => default_store_path()?,
    };
    tracing::debug!("Using title store {}", path.display());
    Ok(JsonTitleStore::open(path)?)
}

#[derive(Args, Debug, Clone, Default)]
pub struct BrowserArgs {
    /// Path to the Chrome binary (searched for when omitted)
    #[arg(long, env = "NOVELSYNC_CHROME_PATH", value_name = "PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Persistent Chrome profile under ~/.novelsync/profiles (temporary when omitted)
    #[arg(long, env = "NOVELSYNC_PROFILE", value_name = "NAME")]
    pub profile: Option<String>,

    /// Run Chrome without a window
    #[arg(long, env = "NOVELSYNC_HEADLESS")]
    pub headless: bool,

    /// Catalog account used to log in
    #[arg(long, env = "NOVELSYNC_CATALOG_USER", value_name = "USER")]
    pub catalog_user: Option<String>,

    /// Catalog account password
    #[arg(
        long,
        env = "NOVELSYNC_CATALOG_PASS",
        value_name = "PASSWORD",
        hide_env_values = true
    )]
    pub catalog_pass: Option<String>,
}

impl BrowserArgs {
    pub fn launcher(&self, site: &CatalogSite) -> ChromeLauncher {
        let config = LauncherConfig {
            chrome_path: self.chrome_path.clone(),
            profile: self.profile.clone(),
            headless: self.headless,
            ..Default::default()
        };
        let credentials =
            CatalogCredentials::from_parts(self.catalog_user.clone(), self.catalog_pass.clone());

        ChromeLauncher::new(config, site.login(credentials))
    }

    pub fn pipeline(&self, store: JsonTitleStore) -> Pipeline<ChromeLauncher> {
        let site = CatalogSite::default();
        Pipeline::new(
            self.launcher(&site),
            ManagerConfig::default(),
            Arc::new(store),
            site.worker_config(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_path_is_under_home() {
        let path = default_store_path().unwrap();
        assert!(path.ends_with(".novelsync/titles.json"));
    }

    #[test]
    fn test_launcher_uses_browser_flags() {
        let args = BrowserArgs {
            chrome_path: Some(PathBuf::from("/opt/chrome")),
            profile: Some("catalog".to_string()),
            headless: true,
            ..Default::default()
        };
        let launcher = args.launcher(&CatalogSite::default());

        assert_eq!(launcher.config().chrome_path, Some(PathBuf::from("/opt/chrome")));
        assert_eq!(launcher.config().profile.as_deref(), Some("catalog"));
        assert!(launcher.config().headless);
    }
}
