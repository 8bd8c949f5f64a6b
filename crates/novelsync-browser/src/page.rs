use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};

/// How often [`PageDriver::wait_for_element`] re-checks the page
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Visible text and target of one link on a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: String,
}

/// The page operations the scrapers, login and submission form need.
///
/// Selectors are CSS selectors. Implemented by the live Chrome session and by
/// in-memory fakes in tests.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate and wait for the load to finish
    async fn open(&self, url: &str) -> Result<()>;

    async fn reload(&self) -> Result<()>;

    async fn is_present(&self, selector: &str) -> Result<bool>;

    /// Visible text of the document body
    async fn body_text(&self) -> Result<String>;

    /// Current `value` of a form field; empty when the field is missing
    async fn value_of(&self, selector: &str) -> Result<String>;

    /// Assign a field value directly (works for hidden inputs too)
    async fn set_value(&self, selector: &str, value: &str) -> Result<()>;

    /// Focus a field and send `text` as key presses, appending to its value
    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Dispatch a bubbling `keyup` on the field, as a live-search widget expects
    async fn fire_keyup(&self, selector: &str) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn run_script(&self, script: &str) -> Result<serde_json::Value>;

    async fn anchors(&self, selector: &str) -> Result<Vec<Anchor>>;

    /// Values of `attribute` on every element matching `selector`
    async fn attribute_values(&self, selector: &str, attribute: &str) -> Result<Vec<String>>;

    async fn wait_for_element(&self, selector: &str, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        loop {
            if self.is_present(selector).await? {
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(Error::Timeout {
                    what: format!("element {}", selector),
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL.min(timeout)).await;
        }
    }
}

/// Quote a string as a JavaScript literal
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub(crate) fn is_present_script(selector: &str) -> String {
    format!("document.querySelector({}) !== null", js_string(selector))
}

pub(crate) const BODY_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

pub(crate) fn value_of_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); return el && el.value != null ? String(el.value) : ''; }})()",
        js_string(selector)
    )
}

pub(crate) fn set_value_script(selector: &str, value: &str) -> String {
    format!(
        r#"(() => {{
  const el = document.querySelector({});
  if (!el) return false;
  el.value = {};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return true;
}})()"#,
        js_string(selector),
        js_string(value)
    )
}

pub(crate) fn keyup_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; el.dispatchEvent(new KeyboardEvent('keyup', {{ bubbles: true }})); return true; }})()",
        js_string(selector)
    )
}

pub(crate) fn anchors_script(selector: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({})).map(a => ({{ text: (a.innerText || '').trim(), href: a.href || a.getAttribute('href') || '' }}))",
        js_string(selector)
    )
}

pub(crate) fn attribute_values_script(selector: &str, attribute: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({})).map(el => (el.getAttribute({}) || '').trim())",
        js_string(selector),
        js_string(attribute)
    )
}
