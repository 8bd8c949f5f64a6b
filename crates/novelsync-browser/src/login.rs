use crate::page::PageDriver;
use crate::{Error, Result};
use std::time::Duration;

pub const DEFAULT_LOGIN_URL: &str = "https://www.novelupdates.com/login/";

const USER_FIELD: &str = "#user_login";
const PASS_FIELD: &str = "#user_pass";
const SUBMIT_BUTTON: &str = "#wp-submit";
const LOGOUT_LINK: &str = "a[href*=\"logout\"]";

#[derive(Clone)]
pub struct CatalogCredentials {
    pub username: String,
    pub password: String,
}

impl CatalogCredentials {
    /// Both halves must be non-empty
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self { username, password })
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Logs the session into the catalog site's WordPress login form
#[derive(Debug, Clone)]
pub struct CatalogLogin {
    pub login_url: String,
    pub credentials: Option<CatalogCredentials>,
    pub form_timeout: Duration,
    pub confirm_timeout: Duration,
}

impl CatalogLogin {
    pub fn new(credentials: Option<CatalogCredentials>) -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            credentials,
            form_timeout: Duration::from_secs(10),
            confirm_timeout: Duration::from_secs(15),
        }
    }

    /// Without credentials the session stays anonymous and only reading works
    pub async fn authenticate(&self, page: &dyn PageDriver) -> Result<()> {
        let Some(credentials) = &self.credentials else {
            tracing::warn!("Catalog credentials not set, continuing without login");
            return Ok(());
        };

        tracing::info!("Logging in to catalog as {}", credentials.username);
        page.open(&self.login_url).await?;

        if page
            .wait_for_element(USER_FIELD, self.form_timeout)
            .await
            .is_err()
        {
            return Err(Error::Authentication("login form not found".to_string()));
        }

        page.type_text(USER_FIELD, &credentials.username).await?;
        page.type_text(PASS_FIELD, &credentials.password).await?;
        page.click(SUBMIT_BUTTON).await?;

        match page.wait_for_element(LOGOUT_LINK, self.confirm_timeout).await {
            Ok(()) => {
                tracing::info!("Catalog login confirmed");
                Ok(())
            }
            Err(Error::Timeout { .. }) => {
                Err(Error::Authentication("login not confirmed".to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
