//! Driving the catalog's live-search boxes.
//!
//! The series and group fields only accept a value once the site's search
//! callback has run for it. A human types most of the name, the widget fires,
//! then the last character lands. [`LiveSearchPlan`] spells that sequence out
//! as data so it can be checked without a browser, and [`LiveSearchThrottle`]
//! keeps search triggers apart across the whole process.

use novelsync_browser::{PageDriver, Result};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Series,
    Group,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Series => "series",
            SearchKind::Group => "group",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SearchTiming {
    /// Before the search is triggered for the typed prefix
    pub after_prefix: Duration,
    pub after_complete: Duration,
}

impl Default for SearchTiming {
    fn default() -> Self {
        Self {
            after_prefix: Duration::from_millis(350),
            after_complete: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep {
    Clear,
    Type(String),
    Pause(Duration),
    FireKeyup,
    /// Call the widget's search callback; waits on the throttle first
    TriggerSearch { query: String, kind: SearchKind },
}

#[derive(Debug, Clone)]
pub struct LiveSearchPlan {
    pub selector: String,
    pub steps: Vec<SearchStep>,
}

impl LiveSearchPlan {
    pub fn new(selector: &str, text: &str, kind: SearchKind, timing: SearchTiming) -> Self {
        let target = text.trim();
        let (query, last) = match target.char_indices().last() {
            Some((idx, _)) if idx > 0 => (&target[..idx], &target[idx..]),
            _ => (target, ""),
        };

        let mut steps = vec![
            SearchStep::Clear,
            SearchStep::Type(query.to_string()),
            SearchStep::Pause(timing.after_prefix),
            SearchStep::FireKeyup,
            SearchStep::TriggerSearch {
                query: query.to_string(),
                kind,
            },
        ];
        if !last.is_empty() {
            steps.push(SearchStep::Type(last.to_string()));
            steps.push(SearchStep::FireKeyup);
        }
        steps.push(SearchStep::Pause(timing.after_complete));

        Self {
            selector: selector.to_string(),
            steps,
        }
    }

    /// Keyup and search-trigger failures are logged and skipped; the form
    /// validation afterwards decides whether the field ended up usable.
    pub async fn run(&self, page: &dyn PageDriver, throttle: &LiveSearchThrottle) -> Result<()> {
        for step in &self.steps {
            match step {
                SearchStep::Clear => page.set_value(&self.selector, "").await?,
                SearchStep::Type(text) => page.type_text(&self.selector, text).await?,
                SearchStep::Pause(duration) => {
                    if !duration.is_zero() {
                        tokio::time::sleep(*duration).await;
                    }
                }
                SearchStep::FireKeyup => {
                    if let Err(e) = page.fire_keyup(&self.selector).await {
                        tracing::debug!("keyup on {} failed: {}", self.selector, e);
                    }
                }
                SearchStep::TriggerSearch { query, kind } => {
                    throttle.wait().await;
                    if let Err(e) = page.run_script(&trigger_script(query, *kind)).await {
                        tracing::debug!("Live search for {:?} failed: {}", query, e);
                    }
                }
            }
        }
        Ok(())
    }
}

fn trigger_script(query: &str, kind: SearchKind) -> String {
    let quote = |s: &str| serde_json::Value::String(s.to_string()).to_string();
    format!(
        "(() => {{ if (typeof showResult === 'function') {{ showResult({}, '100', {}); return true; }} return false; }})()",
        quote(query),
        quote(kind.as_str())
    )
}

/// Minimum spacing between live-search triggers, shared by every caller
#[derive(Debug)]
pub struct LiveSearchThrottle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl LiveSearchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

impl Default for LiveSearchThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> SearchTiming {
        SearchTiming {
            after_prefix: Duration::ZERO,
            after_complete: Duration::ZERO,
        }
    }

    #[test]
    fn test_plan_types_prefix_then_last_character() {
        let plan = LiveSearchPlan::new("#group_change_100", " Fenrir Realm ", SearchKind::Group, instant());

        assert_eq!(
            plan.steps,
            vec![
                SearchStep::Clear,
                SearchStep::Type("Fenrir Real".to_string()),
                SearchStep::Pause(Duration::ZERO),
                SearchStep::FireKeyup,
                SearchStep::TriggerSearch {
                    query: "Fenrir Real".to_string(),
                    kind: SearchKind::Group,
                },
                SearchStep::Type("m".to_string()),
                SearchStep::FireKeyup,
                SearchStep::Pause(Duration::ZERO),
            ]
        );
    }

    #[test]
    fn test_single_character_is_searched_whole() {
        let plan = LiveSearchPlan::new("#title_change_100", "X", SearchKind::Series, instant());
        assert!(plan.steps.contains(&SearchStep::TriggerSearch {
            query: "X".to_string(),
            kind: SearchKind::Series,
        }));
        assert_eq!(
            plan.steps
                .iter()
                .filter(|s| matches!(s, SearchStep::Type(_)))
                .count(),
            1
        );
    }

    #[test]
    fn test_multibyte_names_split_on_char_boundary() {
        let plan = LiveSearchPlan::new("#title_change_100", "Sainté", SearchKind::Series, instant());
        assert!(plan.steps.contains(&SearchStep::Type("Saint".to_string())));
        assert!(plan.steps.contains(&SearchStep::Type("é".to_string())));
    }

    #[test]
    fn test_trigger_script_quotes_query() {
        let script = trigger_script("It's \"Saintess\"", SearchKind::Series);
        assert!(script.contains(r#"showResult("It's \"Saintess\"", '100', "series")"#));
    }

    #[tokio::test]
    async fn test_throttle_spaces_triggers() {
        let throttle = LiveSearchThrottle::new(Duration::from_millis(40));
        let started = Instant::now();
        throttle.wait().await;
        throttle.wait().await;
        throttle.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
