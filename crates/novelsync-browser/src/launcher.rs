use crate::chrome_finder::ChromeFinder;
use crate::login::CatalogLogin;
use crate::manager::SessionLauncher;
use crate::profile::ProfileManager;
use crate::session::ChromeSession;
use crate::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Images and video are never needed for scraping or form filling
pub const DEFAULT_BLOCKED_URLS: [&str; 7] =
    ["*.png", "*.jpg", "*.gif", "*.jpeg", "*.webp", "*.mp4", "*.svg"];

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Explicit Chrome binary; searched for when unset
    pub chrome_path: Option<PathBuf>,
    /// Named persistent profile; a temporary one is used when unset
    pub profile: Option<String>,
    pub headless: bool,
    pub debugging_port: u16,
    pub blocked_urls: Vec<String>,
    pub connect_retries: u32,
    pub nav_timeout: Duration,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            profile: None,
            headless: false,
            debugging_port: 9222,
            blocked_urls: DEFAULT_BLOCKED_URLS.iter().map(|s| s.to_string()).collect(),
            connect_retries: 5,
            nav_timeout: Duration::from_secs(60),
        }
    }
}

/// Starts Chrome, attaches over CDP and logs into the catalog
pub struct ChromeLauncher {
    config: LauncherConfig,
    login: CatalogLogin,
}

impl ChromeLauncher {
    pub fn new(config: LauncherConfig, login: CatalogLogin) -> Self {
        Self { config, login }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Build Chrome command-line arguments
    fn build_args(&self, profile_path: &Path) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.config.debugging_port),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            format!("--user-data-dir={}", profile_path.display()),
            "--disable-blink-features=AutomationControlled".to_string(),
        ];

        if self.config.headless {
            args.push("--headless=new".to_string());
        }

        args.push("about:blank".to_string());
        args
    }

    async fn connect(&self) -> Result<(Browser, chromiumoxide::handler::Handler)> {
        let ws_url = format!("http://localhost:{}", self.config.debugging_port);
        let mut retries = self.config.connect_retries.max(1);
        loop {
            tracing::debug!("Attempting CDP connection to {}...", ws_url);
            match Browser::connect(&ws_url).await {
                Ok(result) => {
                    tracing::info!("CDP connection established");
                    return Ok(result);
                }
                Err(e) => {
                    retries -= 1;
                    if retries == 0 {
                        return Err(Error::Cdp(format!(
                            "Failed to connect to Chrome after {} attempts: {}",
                            self.config.connect_retries.max(1),
                            e
                        )));
                    }
                    tracing::info!("CDP connection attempt failed, retrying... ({} left)", retries);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self) -> Result<ChromeSession> {
        let chrome_path = ChromeFinder::new(self.config.chrome_path.clone()).find()?;
        let profile = match &self.config.profile {
            Some(name) => ProfileManager::named(name)?,
            None => ProfileManager::temporary()?,
        };

        tracing::info!(
            "Starting Chrome {} with profile {}",
            chrome_path.display(),
            profile.path().display()
        );
        let mut child = Command::new(&chrome_path)
            .args(self.build_args(profile.path()))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch Chrome: {}", e)))?;

        let (browser, mut handler) = match self.connect().await {
            Ok(connected) => connected,
            Err(e) => {
                abandon(&mut child, None);
                return Err(e);
            }
        };

        // The handler must be polled for any CDP command to complete
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        // Chrome creates its initial tab shortly after the endpoint comes up
        tokio::time::sleep(Duration::from_millis(500)).await;

        let opened = async {
            match browser.pages().await?.into_iter().next() {
                Some(page) => Ok(page),
                None => browser.new_page("about:blank").await,
            }
        }
        .await;
        let page = match opened {
            Ok(page) => page,
            Err(e) => {
                abandon(&mut child, Some(&handler_task));
                return Err(e.into());
            }
        };

        // Build the session first so a failure below still tears Chrome down
        let session = ChromeSession::new(
            browser,
            page,
            child,
            handler_task,
            profile,
            self.config.nav_timeout,
        );

        if !self.config.blocked_urls.is_empty() {
            session.page().execute(EnableParams::default()).await?;
            session
                .page()
                .execute(SetBlockedUrLsParams::new(self.config.blocked_urls.clone()))
                .await?;
            tracing::debug!("Blocking {} URL patterns", self.config.blocked_urls.len());
        }

        Ok(session)
    }

    async fn authenticate(&self, session: &ChromeSession) -> Result<()> {
        self.login.authenticate(session).await
    }
}

/// Tear down a half-started Chrome so it cannot hold the debugging port or
/// the profile directory after the launch failed
fn abandon(child: &mut Child, handler_task: Option<&JoinHandle<()>>) {
    if let Some(task) = handler_task {
        task.abort();
    }
    if let Err(e) = child.kill() {
        tracing::debug!("Chrome already exited: {}", e);
    }
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher(config: LauncherConfig) -> ChromeLauncher {
        ChromeLauncher::new(config, CatalogLogin::new(None))
    }

    #[test]
    fn test_chrome_launcher_builds_args() {
        let launcher = launcher(LauncherConfig::default());
        let args = launcher.build_args(Path::new("/tmp/profile"));

        assert!(args.contains(&"--remote-debugging-port=9222".to_string()));
        assert!(args.contains(&"--no-first-run".to_string()));
        assert!(args.contains(&"--no-default-browser-check".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert_eq!(args.last().map(String::as_str), Some("about:blank"));
    }

    #[test]
    fn test_headless_flag_and_port() {
        let launcher = launcher(LauncherConfig {
            headless: true,
            debugging_port: 9333,
            ..Default::default()
        });
        let args = launcher.build_args(Path::new("/tmp/profile"));

        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
    }

    #[test]
    fn test_default_config_blocks_media() {
        let config = LauncherConfig::default();
        assert_eq!(config.blocked_urls.len(), 7);
        assert!(config.blocked_urls.contains(&"*.webp".to_string()));
        assert_eq!(config.connect_retries, 5);
    }

    #[tokio::test]
    async fn test_launch_fails_without_chrome() {
        let launcher = launcher(LauncherConfig {
            chrome_path: Some(PathBuf::from("/nonexistent/chrome")),
            ..Default::default()
        });
        let err = launcher.launch().await.err().unwrap();
        assert!(err.to_string().contains("Chrome not found"));
    }

    #[tokio::test]
    async fn test_abandon_kills_chrome_and_stops_handler() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let handler_task = tokio::spawn(std::future::pending::<()>());

        abandon(&mut child, Some(&handler_task));

        assert!(child.try_wait().unwrap().is_some());
        assert!(handler_task.await.unwrap_err().is_cancelled());
    }
}
