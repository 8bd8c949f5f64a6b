use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

lazy_static! {
    /// `v3c91`, `v3 c91`, `v 3 c 91` after synonym normalization
    static ref VOLUME_CHAPTER: Regex = Regex::new(r"\bv\s*(\d+)\s*c\s*(\d+)\b").unwrap();
    /// `c91` standing on its own
    static ref CHAPTER_ONLY: Regex = Regex::new(r"\bc\s*(\d+)\b").unwrap();
    /// Loose scan: a volume token somewhere before a chapter token
    static ref LOOSE_VOLUME_CHAPTER: Regex = Regex::new(r"v\s*(\d+)\D*?c\s*(\d+)").unwrap();
    static ref LOOSE_CHAPTER: Regex = Regex::new(r"c\s*(\d+)").unwrap();
    /// Chapter tokens embedded in running text (page bodies, hrefs)
    static ref TEXT_TOKEN: Regex = Regex::new(r"(?i)\b(?:v(\d+)\s*)?c(\d+)\b").unwrap();
}

/// Synonyms rewritten before matching. Order matters: longer forms first.
const SYNONYMS: [(&str, &str); 6] = [
    ("volume", "v"),
    ("vol.", "v"),
    ("vol", "v"),
    ("chapter", "c"),
    ("ch.", "c"),
    ("ch", "c"),
];

/// Canonical (volume, chapter) key for one released chapter.
///
/// A missing volume compares equal to volume `0`, so `c91` and `v0c91` are
/// the same chapter for set membership and ordering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChapterId {
    volume: Option<u32>,
    chapter: u32,
}

impl ChapterId {
    pub fn new(volume: Option<u32>, chapter: u32) -> Self {
        Self { volume, chapter }
    }

    pub fn volume(&self) -> Option<u32> {
        self.volume
    }

    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    /// Volume used for comparisons (absent volume is `0`)
    pub fn volume_key(&self) -> u32 {
        self.volume.unwrap_or(0)
    }

    fn key(&self) -> (u32, u32) {
        (self.volume_key(), self.chapter)
    }

    /// Parse a free-form chapter label such as `Vol 2 Ch 3`, `v3c91` or `Chapter 12`.
    ///
    /// Returns `None` when no chapter can be recognised. Callers are expected
    /// to skip such labels rather than fail the whole listing.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let normalized = normalize(text);

        // A number too large for u32 disqualifies only the pattern that matched it
        let paired = |pattern: &Regex| {
            let caps = pattern.captures(&normalized)?;
            Some(Self::new(Some(caps[1].parse().ok()?), caps[2].parse().ok()?))
        };
        let single = |pattern: &Regex| {
            let caps = pattern.captures(&normalized)?;
            Some(Self::new(None, caps[1].parse().ok()?))
        };

        paired(&*VOLUME_CHAPTER)
            .or_else(|| single(&*CHAPTER_ONLY))
            .or_else(|| paired(&*LOOSE_VOLUME_CHAPTER))
            .or_else(|| single(&*LOOSE_CHAPTER))
    }

    /// Same as [`ChapterId::parse`] for labels that may be missing entirely
    pub fn from_label(label: Option<&str>) -> Option<Self> {
        label.and_then(Self::parse)
    }

    /// Collect every `c<N>` / `v<N>c<M>` token that appears as a word in `text`.
    ///
    /// Used as a last resort when a page has no recognisable chapter list.
    pub fn scan_text(text: &str) -> Vec<Self> {
        TEXT_TOKEN
            .captures_iter(text)
            .filter_map(|caps| {
                let chapter = caps.get(2)?.as_str().parse().ok()?;
                let volume = match caps.get(1) {
                    Some(v) => Some(v.as_str().parse().ok()?),
                    None => None,
                };
                Some(Self::new(volume, chapter))
            })
            .collect()
    }
}

fn normalize(text: &str) -> String {
    SYNONYMS
        .iter()
        .fold(text.to_lowercase(), |acc, (from, to)| acc.replace(from, to))
}

impl PartialEq for ChapterId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ChapterId {}

impl Hash for ChapterId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ChapterId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChapterId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Renders the catalog release label: `v2c77`, or `c16` when there is no volume.
impl fmt::Display for ChapterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.volume_key() {
            0 => write!(f, "c{}", self.chapter),
            volume => write!(f, "v{}c{}", volume, self.chapter),
        }
    }
}

/// Set of chapters known for one site, unique by normalized key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChapterSet(BTreeSet<ChapterId>);

impl ChapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from raw labels, silently dropping labels that do not parse
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .filter_map(|label| ChapterId::parse(label.as_ref()))
            .collect()
    }

    /// Returns `false` if an equal chapter was already present
    pub fn insert(&mut self, chapter: ChapterId) -> bool {
        self.0.insert(chapter)
    }

    pub fn contains(&self, chapter: &ChapterId) -> bool {
        self.0.contains(chapter)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in ascending (volume, chapter) order
    pub fn iter(&self) -> impl Iterator<Item = &ChapterId> {
        self.0.iter()
    }
}

impl FromIterator<ChapterId> for ChapterSet {
    fn from_iter<T: IntoIterator<Item = ChapterId>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ChapterId> for ChapterSet {
    fn extend<T: IntoIterator<Item = ChapterId>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a ChapterSet {
    type Item = &'a ChapterId;
    type IntoIter = std::collections::btree_set::Iter<'a, ChapterId>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(volume: Option<u32>, chapter: u32) -> ChapterId {
        ChapterId::new(volume, chapter)
    }

    #[test]
    fn test_parse_compact_form() {
        let parsed = ChapterId::parse("v3c91").unwrap();
        assert_eq!(parsed.volume(), Some(3));
        assert_eq!(parsed.chapter(), 91);

        let upper = ChapterId::parse("V12C4").unwrap();
        assert_eq!(upper.volume(), Some(12));
        assert_eq!(upper.chapter(), 4);
    }

    #[test]
    fn test_parse_spaced_form() {
        for label in ["v 3 c 91", "v3 c91", "Vol 3 Ch 91", "Volume 3 Chapter 91", "vol. 3 ch. 91"] {
            let parsed = ChapterId::parse(label).unwrap();
            assert_eq!(parsed.volume(), Some(3), "label {:?}", label);
            assert_eq!(parsed.chapter(), 91, "label {:?}", label);
        }
    }

    #[test]
    fn test_parse_chapter_only() {
        let parsed = ChapterId::parse("c91").unwrap();
        assert_eq!(parsed.volume(), None);
        assert_eq!(parsed.chapter(), 91);
        assert_eq!(parsed, id(Some(0), 91));

        let long = ChapterId::parse("Chapter 12 - The 3rd Trial").unwrap();
        assert_eq!(long.volume(), None);
        assert_eq!(long.chapter(), 12);
    }

    #[test]
    fn test_parse_rejects_unrecognised_text() {
        assert!(ChapterId::parse("").is_none());
        assert!(ChapterId::parse("   ").is_none());
        assert!(ChapterId::parse("random text").is_none());
        assert!(ChapterId::parse("garbage").is_none());
        assert!(ChapterId::from_label(None).is_none());
        assert!(ChapterId::from_label(Some("")).is_none());
    }

    #[test]
    fn test_parse_loose_fallback() {
        // No word boundary before the tokens, so only the loose scan sees them
        let glued = ChapterId::parse("series_v2c7").unwrap();
        assert_eq!(glued.volume(), Some(2));
        assert_eq!(glued.chapter(), 7);

        let chapter = ChapterId::parse("prologue_c5").unwrap();
        assert_eq!(chapter.volume(), None);
        assert_eq!(chapter.chapter(), 5);
    }

    #[test]
    fn test_overflowing_number_falls_through_to_next_form() {
        let parsed = ChapterId::parse("v99999999999 c3").unwrap();
        assert_eq!(parsed.volume(), None);
        assert_eq!(parsed.chapter(), 3);

        assert!(ChapterId::parse("c99999999999").is_none());
    }

    #[test]
    fn test_strict_forms_win_over_loose_scan() {
        // The loose scan would pair v2 with c3; the boundary form takes c3 alone
        let parsed = ChapterId::parse("v2 - c3").unwrap();
        assert_eq!(parsed.volume(), None);
        assert_eq!(parsed.chapter(), 3);
    }

    #[test]
    fn test_absent_volume_equals_volume_zero() {
        assert_eq!(id(None, 91), id(Some(0), 91));
        assert_ne!(id(None, 91), id(Some(1), 91));

        let mut set = ChapterSet::new();
        assert!(set.insert(id(None, 91)));
        assert!(!set.insert(id(Some(0), 91)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_ordering_by_volume_then_chapter() {
        let mut chapters = vec![id(Some(2), 1), id(None, 5), id(Some(1), 10), id(Some(1), 2)];
        chapters.sort();
        assert_eq!(
            chapters,
            vec![id(None, 5), id(Some(1), 2), id(Some(1), 10), id(Some(2), 1)]
        );
    }

    #[test]
    fn test_display_renders_release_label() {
        assert_eq!(id(None, 16).to_string(), "c16");
        assert_eq!(id(Some(2), 77).to_string(), "v2c77");
        assert_eq!(id(Some(0), 5).to_string(), "c5");
    }

    #[test]
    fn test_chapter_set_from_labels_collapses_duplicates() {
        let set = ChapterSet::from_labels(["Chapter 1", "Vol 2 Ch 3", "garbage", "v2c3"]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(&id(Some(0), 1)));
        assert!(set.contains(&id(Some(2), 3)));
    }

    #[test]
    fn test_scan_text_finds_tokens() {
        let found = ChapterId::scan_text("Latest: v2c10, c11 and C12. Not x13 or abc14");
        assert_eq!(found, vec![id(Some(2), 10), id(None, 11), id(None, 12)]);
    }

    #[test]
    fn test_chapter_set_serializes_as_list() {
        let set: ChapterSet = [id(Some(1), 2), id(None, 1)].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(
            json,
            r#"[{"volume":null,"chapter":1},{"volume":1,"chapter":2}]"#
        );

        let back: ChapterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
