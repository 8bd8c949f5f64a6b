use crate::manager::LiveSession;
use crate::page::{self, Anchor, PageDriver};
use crate::profile::ProfileManager;
use crate::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use chromiumoxide::page::Page;
use std::process::Child;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A launched Chrome process with one controlled tab
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    child: Option<Child>,
    handler_task: JoinHandle<()>,
    // Held so a temporary profile outlives the process using it
    _profile: ProfileManager,
    nav_timeout: Duration,
}

impl ChromeSession {
    pub(crate) fn new(
        browser: Browser,
        page: Page,
        child: Child,
        handler_task: JoinHandle<()>,
        profile: ProfileManager,
        nav_timeout: Duration,
    ) -> Self {
        Self {
            browser,
            page,
            child: Some(child),
            handler_task,
            _profile: profile,
            nav_timeout,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T> {
        let value = self.run_script(script).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Run a script that returns `false` when its element is missing
    async fn evaluate_on(&self, selector: &str, script: &str) -> Result<()> {
        if self.evaluate::<bool>(script).await? {
            Ok(())
        } else {
            Err(Error::Browser(format!("Element not found: {}", selector)))
        }
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn open(&self, url: &str) -> Result<()> {
        tracing::debug!("Navigating to {}", url);
        match tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(Error::Timeout {
                what: format!("navigation to {}", url),
                seconds: self.nav_timeout.as_secs(),
            }),
        }
    }

    async fn reload(&self) -> Result<()> {
        match tokio::time::timeout(self.nav_timeout, self.page.reload()).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(Error::Timeout {
                what: "page reload".to_string(),
                seconds: self.nav_timeout.as_secs(),
            }),
        }
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        self.evaluate(&page::is_present_script(selector)).await
    }

    async fn body_text(&self) -> Result<String> {
        self.evaluate(page::BODY_TEXT_SCRIPT).await
    }

    async fn value_of(&self, selector: &str) -> Result<String> {
        self.evaluate(&page::value_of_script(selector)).await
    }

    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        self.evaluate_on(selector, &page::set_value_script(selector, value))
            .await
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn fire_keyup(&self, selector: &str) -> Result<()> {
        self.evaluate_on(selector, &page::keyup_script(selector))
            .await
    }

    async fn run_script(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn anchors(&self, selector: &str) -> Result<Vec<Anchor>> {
        self.evaluate(&page::anchors_script(selector)).await
    }

    async fn attribute_values(&self, selector: &str, attribute: &str) -> Result<Vec<String>> {
        self.evaluate(&page::attribute_values_script(selector, attribute))
            .await
    }
}

#[async_trait]
impl LiveSession for ChromeSession {
    async fn is_alive(&self) -> bool {
        self.browser.pages().await.is_ok()
    }

    async fn shutdown(mut self) -> Result<()> {
        let closed = self.browser.close().await;

        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let waited = tokio::task::spawn_blocking(move || child.wait()).await;
            if let Ok(Ok(status)) = waited {
                tracing::debug!("Chrome exited with {}", status);
            }
        }
        self.handler_task.abort();

        closed?;
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.handler_task.abort();
    }
}
