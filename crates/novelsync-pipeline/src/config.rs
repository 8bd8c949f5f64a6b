use crate::worker::{WorkerConfig, DEFAULT_FORM_URL};
use novelsync_browser::{CatalogCredentials, CatalogLogin, DEFAULT_LOGIN_URL};

/// Endpoints of the catalog site
#[derive(Debug, Clone)]
pub struct CatalogSite {
    pub login_url: String,
    pub add_release_url: String,
}

impl Default for CatalogSite {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            add_release_url: DEFAULT_FORM_URL.to_string(),
        }
    }
}

impl CatalogSite {
    pub fn login(&self, credentials: Option<CatalogCredentials>) -> CatalogLogin {
        CatalogLogin {
            login_url: self.login_url.clone(),
            ..CatalogLogin::new(credentials)
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            form_url: self.add_release_url.clone(),
            ..Default::default()
        }
    }
}
