use crate::chapter::{ChapterId, ChapterSet};

/// Chapters present at the source but absent from the destination.
///
/// Membership uses the normalized (volume, chapter) key and the result is
/// sorted by volume, then chapter.
pub fn missing(source: &ChapterSet, destination: &ChapterSet) -> Vec<ChapterId> {
    // ChapterSet iterates in key order, so the filtered output is already sorted
    source
        .iter()
        .filter(|chapter| !destination.contains(chapter))
        .copied()
        .collect()
}

/// [`missing`] over raw labels; unparsable labels on either side are ignored
pub fn missing_from_labels<S, D>(source: S, destination: D) -> Vec<ChapterId>
where
    S: IntoIterator,
    S::Item: AsRef<str>,
    D: IntoIterator,
    D::Item: AsRef<str>,
{
    missing(
        &ChapterSet::from_labels(source),
        &ChapterSet::from_labels(destination),
    )
}
