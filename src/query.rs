//! Derived read-only views over a [PageAnnotationsCache].
//!
//! These never mutate the cache and never emit events. Results follow the cache's display order.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    cache::PageAnnotationsCache,
    properties::{UnifiedAnnotation, UnifiedList, UserReference},
};

fn is_user_annotation(annotation: &UnifiedAnnotation, user_id: Option<&str>) -> bool {
    match (&annotation.creator, user_id) {
        (None, _) => true,
        (Some(creator), Some(user_id)) => creator.id == user_id,
        (Some(_), None) => false,
    }
}

/// Annotations created by `user_id`. Annotations without a creator are always the current user's,
/// since only locally created annotations lack one.
pub fn get_user_annotations_array(
    cache: &PageAnnotationsCache,
    user_id: Option<&str>,
) -> Vec<UnifiedAnnotation> {
    cache
        .annotations()
        .iter()
        .filter(|annotation| is_user_annotation(annotation, user_id))
        .cloned()
        .collect()
}

pub fn get_highlight_annotations_array(cache: &PageAnnotationsCache) -> Vec<UnifiedAnnotation> {
    cache.highlights()
}

pub fn get_user_highlights_array(
    cache: &PageAnnotationsCache,
    user_id: Option<&str>,
) -> Vec<UnifiedAnnotation> {
    cache
        .annotations()
        .iter()
        .filter(|annotation| annotation.is_highlight() && is_user_annotation(annotation, user_id))
        .cloned()
        .collect()
}

/// Highlights that are members of the list `list_id`.
pub fn get_list_highlights_array(
    cache: &PageAnnotationsCache,
    list_id: &str,
) -> Vec<UnifiedAnnotation> {
    cache
        .annotations()
        .iter()
        .filter(|annotation| {
            annotation.is_highlight() && annotation.unified_list_ids.iter().any(|id| id == list_id)
        })
        .cloned()
        .collect()
}

/// Map unified list ids back to local-database list ids, skipping unknown ids and remote-only
/// lists.
pub fn get_local_list_ids_for_cache_ids<S: AsRef<str>>(
    cache: &PageAnnotationsCache,
    cache_ids: &[S],
) -> Vec<i64> {
    cache_ids
        .iter()
        .filter_map(|list_id| cache.lists().get(list_id.as_ref())?.local_id)
        .collect()
}

/// How the current user relates to a cached list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListOwnership {
    Creator,
    Follower,
    Contributor,
}

impl fmt::Display for ListOwnership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListOwnership::Creator => "Creator",
            ListOwnership::Follower => "Follower",
            ListOwnership::Contributor => "Contributor",
        };
        write!(f, "{name}")
    }
}

pub fn derive_list_ownership_status(
    list: &UnifiedList,
    current_user: Option<&UserReference>,
) -> ListOwnership {
    match (&list.remote_id, list.local_id) {
        // Followed without a local copy
        (Some(_), None) => ListOwnership::Follower,
        (Some(_), Some(_))
            if list.creator.as_ref().map(|c| &c.id) != current_user.map(|u| &u.id) =>
        {
            ListOwnership::Contributor
        }
        _ => ListOwnership::Creator,
    }
}
