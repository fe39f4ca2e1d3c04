//! Populate a cache from backend data the caller has already fetched.
//!
//! The cache never awaits I/O, so the caller gathers local lists, remote ids, followed lists and
//! annotations first and hands them over here in one go.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    cache::{PageAnnotationsCache, SetAnnotationsOpts},
    error::Result,
    properties::{PrivacyLevel, UnifiedId, UserReference},
    reshape::{
        reshape_annotation_for_cache, reshape_followed_list_for_cache, reshape_list_for_cache,
        Annotation, AnnotationExtras, AnnotationReshapeOpts, FollowedList, ListExtras,
        ListReshapeOpts, PageList,
    },
};

#[derive(Debug, Default, Clone)]
pub struct ListsHydration {
    pub user: Option<UserReference>,
    pub local_lists: Vec<PageList>,
    /// Local list id → remote id, for lists that have been shared
    pub remote_list_ids: HashMap<i64, String>,
    /// Remote list id → followed list
    pub followed_lists: BTreeMap<String, FollowedList>,
}

#[derive(Debug, Default, Clone)]
pub struct AnnotationsHydration {
    pub user: Option<UserReference>,
    pub normalized_page_url: String,
    pub annotations: Vec<Annotation>,
    /// Annotation local id → privacy level
    pub privacy_levels: HashMap<String, PrivacyLevel>,
    /// Annotation local id → remote id
    pub remote_ids: HashMap<String, String>,
    /// Local ids of the lists the page itself belongs to
    pub page_local_list_ids: Vec<i64>,
    pub now: Option<i64>,
}

/// Replace the cache's lists with the user's local lists plus any followed lists with no local
/// copy. Returns the assigned list ids.
pub fn hydrate_cache_lists(
    cache: &mut PageAnnotationsCache,
    hydration: ListsHydration,
) -> Vec<UnifiedId> {
    let ListsHydration {
        user,
        local_lists,
        remote_list_ids,
        followed_lists,
    } = hydration;
    let mut seen_followed = BTreeSet::new();

    let mut lists_to_cache: Vec<_> = local_lists
        .iter()
        .map(|list| {
            let remote_id = remote_list_ids.get(&list.id).cloned();
            let followed = remote_id
                .as_ref()
                .and_then(|remote_id| followed_lists.get(remote_id));
            let (creator, has_remote_annotations) = match followed {
                Some(followed) => {
                    seen_followed.insert(followed.shared_list.clone());
                    (
                        Some(UserReference::new(followed.creator.clone())),
                        followed.has_annotations_from_others,
                    )
                }
                None => (user.clone(), false),
            };
            reshape_list_for_cache(
                list,
                &ListReshapeOpts {
                    has_remote_annotations,
                    extra: ListExtras { remote_id, creator },
                },
            )
        })
        .collect();

    lists_to_cache.extend(
        followed_lists
            .values()
            .filter(|followed| !seen_followed.contains(&followed.shared_list))
            .map(|followed| {
                reshape_followed_list_for_cache(
                    followed,
                    &ListReshapeOpts {
                        has_remote_annotations: followed.has_annotations_from_others,
                        ..Default::default()
                    },
                )
            }),
    );

    tracing::debug!(
        "[hydrate_cache_lists] caching {} local and {} followed-only lists",
        local_lists.len(),
        lists_to_cache.len() - local_lists.len()
    );
    cache.set_lists(lists_to_cache)
}

/// Replace the cache's annotations with the page's local annotations. Lists must be hydrated
/// first so list memberships resolve. The page's lists are recorded with
/// [PageAnnotationsCache::set_page_data], and shared annotations join the shared ones.
///
/// Fails, leaving the cache untouched, when any record cannot be reshaped.
pub fn hydrate_page_annotations(
    cache: &mut PageAnnotationsCache,
    hydration: AnnotationsHydration,
) -> Result<Vec<UnifiedId>> {
    let page_lists: Vec<_> = hydration
        .page_local_list_ids
        .iter()
        .filter_map(|local_list_id| cache.get_list_by_local_id(*local_list_id))
        .collect();
    let page_shared_lists: Vec<UnifiedId> = page_lists
        .iter()
        .filter(|list| list.is_shared())
        .map(|list| list.unified_id.clone())
        .collect();
    let page_list_ids: Vec<UnifiedId> = page_lists
        .into_iter()
        .map(|list| list.unified_id.clone())
        .collect();

    let annotations = hydration
        .annotations
        .iter()
        .map(|annotation| {
            let privacy_level = hydration.privacy_levels.get(&annotation.url).copied();
            let unified_list_ids = privacy_level
                .filter(|level| level.is_shared())
                .map(|_| page_shared_lists.clone());
            reshape_annotation_for_cache(
                annotation,
                &AnnotationReshapeOpts {
                    extra: AnnotationExtras {
                        remote_id: hydration.remote_ids.get(&annotation.url).cloned(),
                        creator: hydration.user.clone(),
                        unified_list_ids,
                        privacy_level,
                        color: None,
                    },
                    exclude_local_lists: false,
                },
            )
        })
        .collect::<Result<Vec<_>>>()?;

    cache.set_page_data(&hydration.normalized_page_url, page_list_ids);
    Ok(cache.set_annotations(
        &hydration.normalized_page_url,
        annotations,
        SetAnnotationsOpts {
            now: hydration.now,
            keep_existing_data: false,
        },
    ))
}
