//! Browser side of novelsync: finding and launching Chrome, the page seam
//! used by scrapers and form automation, and the manager that keeps exactly
//! one session alive and hands it out exclusively.

mod chrome_finder;
mod error;
mod launcher;
mod login;
mod manager;
mod page;
mod profile;
mod scraper;
mod session;

pub use chrome_finder::ChromeFinder;
pub use error::{Error, Result};
pub use launcher::{ChromeLauncher, LauncherConfig, DEFAULT_BLOCKED_URLS};
pub use login::{CatalogCredentials, CatalogLogin, DEFAULT_LOGIN_URL};
pub use manager::{
    BrowserManager, LiveSession, ManagerConfig, SessionLauncher, SessionLease, SessionPhase,
};
pub use page::{Anchor, PageDriver};
pub use profile::ProfileManager;
pub use scraper::{with_group_filter, CatalogScraper, ChapterScraper, SourceSiteScraper};
pub use session::ChromeSession;
