use novelsync_browser::{PageDriver, Result};
use novelsync_core::ChapterId;
use serde::Serialize;
use std::fmt;

/// Element selectors of the catalog's add-release form
#[derive(Debug, Clone)]
pub struct FormLayout {
    /// Hidden series id
    pub series_id: String,
    /// Visible series text box with live search
    pub series_text: String,
    pub group_id: String,
    pub group_text: String,
    pub release: String,
    pub link: String,
    pub submit: String,
}

impl Default for FormLayout {
    fn default() -> Self {
        Self {
            series_id: "#title100".to_string(),
            series_text: "#title_change_100".to_string(),
            group_id: "#group100".to_string(),
            group_text: "#group_change_100".to_string(),
            release: "#arrelease".to_string(),
            link: "#arlink".to_string(),
            submit: "#submit".to_string(),
        }
    }
}

/// Text entered in the release field: `v2c77`, or `c16` without a volume
pub fn release_label(chapter: &ChapterId) -> String {
    chapter.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissingField {
    Series,
    Group,
    Release,
    Link,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MissingField::Series => "series",
            MissingField::Group => "group",
            MissingField::Release => "release",
            MissingField::Link => "link",
        };
        write!(f, "{} field is empty", name)
    }
}

/// Values of the four required fields as the page currently holds them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormSnapshot {
    pub series: String,
    pub group: String,
    pub release: String,
    pub link: String,
}

impl FormSnapshot {
    pub async fn read(page: &dyn PageDriver, layout: &FormLayout) -> Result<Self> {
        Ok(Self {
            series: page.value_of(&layout.series_text).await?,
            group: page.value_of(&layout.group_text).await?,
            release: page.value_of(&layout.release).await?,
            link: page.value_of(&layout.link).await?,
        })
    }

    /// First required field that is blank, in form order
    pub fn validate(&self) -> std::result::Result<(), MissingField> {
        let fields = [
            (&self.series, MissingField::Series),
            (&self.group, MissingField::Group),
            (&self.release, MissingField::Release),
            (&self.link, MissingField::Link),
        ];
        match fields.iter().find(|(value, _)| value.trim().is_empty()) {
            Some((_, field)) => Err(*field),
            None => Ok(()),
        }
    }
}

impl fmt::Display for FormSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "title={:?} group={:?} release={:?} link={:?}",
            self.series, self.group, self.release, self.link
        )
    }
}
