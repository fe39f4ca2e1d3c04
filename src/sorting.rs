//! Annotation orderings.
//!
//! Sorters are plain comparators shared behind an `Arc` so the cache can keep one as its default
//! and callers can swap it out through [crate::cache::PageAnnotationsCache::sort_annotations].

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, sync::Arc};

use crate::properties::{UnifiedAnnotation, UnifiedList};

pub type AnnotationsSorter =
    Arc<dyn Fn(&UnifiedAnnotation, &UnifiedAnnotation) -> Ordering + Send + Sync>;

pub type ListsSorter = Arc<dyn Fn(&UnifiedList, &UnifiedList) -> Ordering + Send + Sync>;

/// Orders by where the highlight sits in the page text. Annotations without a text position
/// (page notes, or anchors that never resolved) follow the positioned ones.
pub fn sort_by_page_position(a: &UnifiedAnnotation, b: &UnifiedAnnotation) -> Ordering {
    let position = |annotation: &UnifiedAnnotation| {
        annotation
            .selector
            .as_ref()
            .and_then(|selector| selector.text_position())
    };
    match (position(a), position(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Newest first.
pub fn sort_by_created_time(a: &UnifiedAnnotation, b: &UnifiedAnnotation) -> Ordering {
    b.created_when.cmp(&a.created_when)
}

/// Most recently edited first.
pub fn sort_by_last_edited(a: &UnifiedAnnotation, b: &UnifiedAnnotation) -> Ordering {
    b.last_edited.cmp(&a.last_edited)
}

/// Named annotation orderings, as stored in [crate::config::CacheConfig].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    PagePosition,
    CreatedWhen,
    LastEdited,
}

impl SortOrder {
    pub fn sorter(self) -> AnnotationsSorter {
        match self {
            SortOrder::PagePosition => Arc::new(sort_by_page_position),
            SortOrder::CreatedWhen => Arc::new(sort_by_created_time),
            SortOrder::LastEdited => Arc::new(sort_by_last_edited),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::annotation_fixture;

    #[test]
    fn page_position_puts_unanchored_last() {
        let mut annotations = vec![
            annotation_fixture("note", None, 30),
            annotation_fixture("second", Some(50), 10),
            annotation_fixture("first", Some(5), 20),
        ];
        annotations.sort_by(sort_by_page_position);
        let ids: Vec<_> = annotations.iter().map(|a| a.unified_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "note"]);
    }

    #[test]
    fn time_sorters_are_newest_first() {
        let mut annotations = vec![
            annotation_fixture("old", None, 10),
            annotation_fixture("new", None, 30),
            annotation_fixture("mid", None, 20),
        ];
        let sorter = SortOrder::CreatedWhen.sorter();
        annotations.sort_by(|a, b| sorter(a, b));
        let ids: Vec<_> = annotations.iter().map(|a| a.unified_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        annotations[2].last_edited = 100;
        annotations.sort_by(|a, b| sort_by_last_edited(a, b));
        assert_eq!(annotations[0].unified_id, "old");
    }
}
