//! In-memory browser doubles shared by the pipeline tests.

use async_trait::async_trait;
use novelsync_browser::{
    Anchor, ChapterScraper, Error, LiveSession, PageDriver, Result, SessionLauncher,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Page state shared by every session the fake launcher hands out
#[derive(Default)]
pub(crate) struct FakePage {
    pub values: Mutex<HashMap<String, String>>,
    pub body: Mutex<String>,
    /// The body is cleared after it has been read once
    pub body_once: AtomicBool,
    /// Writes to these selectors are silently dropped
    pub ignored: Mutex<HashSet<String>>,
    pub clicks: Mutex<Vec<String>>,
    pub opened: Mutex<Vec<String>>,
    pub searches: Mutex<Vec<String>>,
    /// Simulates the browser being closed out from under the session
    pub closed: AtomicBool,
    /// The next navigation kills the browser
    pub close_on_open: AtomicBool,
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl FakePage {
    pub fn value(&self, selector: &str) -> String {
        self.values
            .lock()
            .unwrap()
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }

    pub fn ignore(&self, selector: &str) {
        self.ignored.lock().unwrap().insert(selector.to_string());
    }

    pub fn set_body(&self, body: &str) {
        *self.body.lock().unwrap() = body.to_string();
    }

    pub fn clicked(&self, selector: &str) -> bool {
        self.clicks.lock().unwrap().iter().any(|c| c == selector)
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn write(&self, selector: &str, apply: impl FnOnce(&mut String)) {
        if self.ignored.lock().unwrap().contains(selector) {
            return;
        }
        let mut values = self.values.lock().unwrap();
        apply(values.entry(selector.to_string()).or_default());
    }
}

pub(crate) struct FakeSession(pub Arc<FakePage>);

#[async_trait]
impl PageDriver for FakeSession {
    async fn open(&self, url: &str) -> Result<()> {
        if self.0.close_on_open.swap(false, Ordering::SeqCst) {
            self.0.closed.store(true, Ordering::SeqCst);
        }
        self.0.check_open()?;
        self.0.opened.lock().unwrap().push(url.to_string());
        self.0.values.lock().unwrap().clear();
        Ok(())
    }
    async fn reload(&self) -> Result<()> {
        self.0.check_open()
    }
    async fn is_present(&self, _selector: &str) -> Result<bool> {
        self.0.check_open()?;
        Ok(true)
    }
    async fn body_text(&self) -> Result<String> {
        self.0.check_open()?;
        let mut body = self.0.body.lock().unwrap();
        if self.0.body_once.swap(false, Ordering::SeqCst) {
            return Ok(std::mem::take(&mut *body));
        }
        Ok(body.clone())
    }
    async fn value_of(&self, selector: &str) -> Result<String> {
        self.0.check_open()?;
        Ok(self.0.value(selector))
    }
    async fn set_value(&self, selector: &str, value: &str) -> Result<()> {
        self.0.check_open()?;
        self.0.write(selector, |v| *v = value.to_string());
        Ok(())
    }
    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        self.0.check_open()?;
        self.0.write(selector, |v| v.push_str(text));
        Ok(())
    }
    async fn click(&self, selector: &str) -> Result<()> {
        self.0.check_open()?;
        self.0.clicks.lock().unwrap().push(selector.to_string());
        Ok(())
    }
    async fn fire_keyup(&self, _selector: &str) -> Result<()> {
        self.0.check_open()
    }
    async fn run_script(&self, script: &str) -> Result<serde_json::Value> {
        self.0.check_open()?;
        if script.contains("showResult") {
            self.0.searches.lock().unwrap().push(script.to_string());
        }
        Ok(serde_json::Value::Bool(true))
    }
    async fn anchors(&self, _selector: &str) -> Result<Vec<Anchor>> {
        self.0.check_open()?;
        Ok(Vec::new())
    }
    async fn attribute_values(&self, _selector: &str, _attribute: &str) -> Result<Vec<String>> {
        self.0.check_open()?;
        Ok(Vec::new())
    }
}

#[async_trait]
impl LiveSession for FakeSession {
    async fn is_alive(&self) -> bool {
        !self.0.closed.load(Ordering::SeqCst)
    }

    async fn shutdown(self) -> Result<()> {
        self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeLauncher {
    pub page: Arc<FakePage>,
    pub fail_launch: bool,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession> {
        if self.fail_launch {
            return Err(Error::Authentication("login not confirmed".to_string()));
        }
        self.page.launches.fetch_add(1, Ordering::SeqCst);
        // A fresh browser replaces whatever was closed
        self.page.closed.store(false, Ordering::SeqCst);
        Ok(FakeSession(Arc::clone(&self.page)))
    }

    async fn authenticate(&self, _session: &FakeSession) -> Result<()> {
        Ok(())
    }
}

/// Returns fixed labels and remembers what it was asked for
pub(crate) struct FixedScraper {
    pub labels: Vec<&'static str>,
    pub requests: Mutex<Vec<(String, Option<String>)>>,
}

impl FixedScraper {
    pub fn new(labels: Vec<&'static str>) -> Self {
        Self {
            labels,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChapterScraper for FixedScraper {
    async fn scrape(
        &self,
        page: &dyn PageDriver,
        url: &str,
        group_hint: Option<&str>,
    ) -> Result<Vec<String>> {
        page.open(url).await?;
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), group_hint.map(str::to_string)));
        Ok(self.labels.iter().map(|s| s.to_string()).collect())
    }
}
