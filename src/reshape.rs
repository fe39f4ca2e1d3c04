//! Translation between backend entity shapes and the shapes the cache holds.
//!
//! This is the only place that knows what the storage layer and the sharing service hand back.
//! Unified ids never appear in a backend shape.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::{CacheError, Result},
    properties::{
        AnnotationForCache, ListForCache, PrivacyLevel, Selector, UnifiedAnnotation, UnifiedId,
        UserReference,
    },
};

/// An annotation record as stored in the local database. `url` is its local id.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub url: String,
    pub page_url: String,
    pub body: Option<String>,
    pub comment: Option<String>,
    pub selector: Option<Selector>,
    pub created_when: Option<i64>,
    pub last_edited: Option<i64>,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub is_bulk_share_protected: bool,
    #[serde(default)]
    pub lists: Vec<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An annotation as served by the sharing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedAnnotation {
    pub reference_id: String,
    pub normalized_page_url: String,
    pub body: Option<String>,
    pub comment: Option<String>,
    pub selector: Option<Selector>,
    pub creator: UserReference,
    pub created_when: i64,
    pub updated_when: i64,
}

/// A list record as stored in the local database.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageList {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub remote_id: Option<String>,
}

/// A shared list the current user follows, possibly without any local copy.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowedList {
    pub shared_list: String,
    pub creator: String,
    pub name: String,
    #[serde(default)]
    pub has_annotations_from_others: bool,
}

/// Supplemental annotation data the backend record does not carry. Set fields override the
/// reshaped values.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AnnotationExtras {
    pub remote_id: Option<String>,
    pub creator: Option<UserReference>,
    pub unified_list_ids: Option<Vec<UnifiedId>>,
    pub privacy_level: Option<PrivacyLevel>,
    pub color: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct AnnotationReshapeOpts {
    pub extra: AnnotationExtras,
    /// Leave local list ids out of the result; the cache maps them to unified ids itself, so this
    /// is mostly useful for comparisons.
    pub exclude_local_lists: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListExtras {
    pub remote_id: Option<String>,
    pub creator: Option<UserReference>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListReshapeOpts {
    pub has_remote_annotations: bool,
    pub extra: ListExtras,
}

pub fn reshape_annotation_for_cache(
    annotation: &Annotation,
    opts: &AnnotationReshapeOpts,
) -> Result<AnnotationForCache> {
    let created_when = annotation
        .created_when
        .ok_or_else(|| CacheError::MissingTimestamp(annotation.url.clone()))?;
    let extra = &opts.extra;

    Ok(AnnotationForCache {
        local_id: Some(annotation.url.clone()),
        remote_id: extra.remote_id.clone(),
        normalized_page_url: annotation.page_url.clone(),
        body: annotation.body.clone(),
        comment: annotation.comment.clone(),
        selector: annotation.selector.clone(),
        creator: extra.creator.clone(),
        created_when: Some(created_when),
        last_edited: Some(annotation.last_edited.unwrap_or(created_when)),
        privacy_level: extra.privacy_level.unwrap_or_else(|| {
            PrivacyLevel::from_share_opts(annotation.is_shared, annotation.is_bulk_share_protected)
        }),
        color: extra.color.clone(),
        unified_list_ids: extra.unified_list_ids.clone().unwrap_or_default(),
        local_list_ids: if opts.exclude_local_lists {
            Vec::new()
        } else {
            annotation.lists.clone()
        },
    })
}

pub fn reshape_shared_annotation_for_cache(
    annotation: &SharedAnnotation,
    opts: &AnnotationReshapeOpts,
) -> AnnotationForCache {
    let extra = &opts.extra;
    AnnotationForCache {
        local_id: None,
        remote_id: Some(
            extra
                .remote_id
                .clone()
                .unwrap_or_else(|| annotation.reference_id.clone()),
        ),
        normalized_page_url: annotation.normalized_page_url.clone(),
        body: annotation.body.clone(),
        comment: annotation.comment.clone(),
        selector: annotation.selector.clone(),
        creator: Some(
            extra
                .creator
                .clone()
                .unwrap_or_else(|| annotation.creator.clone()),
        ),
        created_when: Some(annotation.created_when),
        last_edited: Some(annotation.updated_when),
        privacy_level: extra.privacy_level.unwrap_or(PrivacyLevel::Shared),
        color: extra.color.clone(),
        unified_list_ids: extra.unified_list_ids.clone().unwrap_or_default(),
        local_list_ids: Vec::new(),
    }
}

/// Back to the local database shape. Only valid for annotations the local database knows about;
/// list memberships are not carried (see
/// [crate::query::get_local_list_ids_for_cache_ids] to map them).
pub fn reshape_cache_annotation(annotation: &UnifiedAnnotation) -> Result<Annotation> {
    let local_id = annotation
        .local_id
        .clone()
        .ok_or_else(|| CacheError::MissingLocalId(annotation.unified_id.clone()))?;
    let (is_shared, is_bulk_share_protected) = annotation.privacy_level.to_share_opts();

    Ok(Annotation {
        url: local_id,
        page_url: annotation.normalized_page_url.clone(),
        body: annotation.body.clone(),
        comment: annotation.comment.clone(),
        selector: annotation.selector.clone(),
        created_when: Some(annotation.created_when),
        last_edited: Some(annotation.last_edited),
        is_shared,
        is_bulk_share_protected,
        lists: Vec::new(),
        tags: Vec::new(),
    })
}

pub fn reshape_list_for_cache(list: &PageList, opts: &ListReshapeOpts) -> ListForCache {
    ListForCache {
        local_id: Some(list.id),
        remote_id: opts
            .extra
            .remote_id
            .clone()
            .or_else(|| list.remote_id.clone()),
        name: list.name.clone(),
        description: list.description.clone(),
        creator: opts.extra.creator.clone(),
        unified_annotation_ids: Vec::new(),
        has_remote_annotations_to_load: opts.has_remote_annotations,
    }
}

pub fn reshape_followed_list_for_cache(list: &FollowedList, opts: &ListReshapeOpts) -> ListForCache {
    ListForCache {
        local_id: None,
        remote_id: Some(list.shared_list.clone()),
        name: list.name.clone(),
        description: None,
        creator: Some(
            opts.extra
                .creator
                .clone()
                .unwrap_or_else(|| UserReference::new(list.creator.clone())),
        ),
        unified_annotation_ids: Vec::new(),
        has_remote_annotations_to_load: opts.has_remote_annotations,
    }
}

/// Canonical page key: host (minus `www.`) plus path, without scheme, fragment or trailing slash.
/// The query string is kept since it often identifies the document.
pub fn normalize_page_url(full_url: &str) -> Result<String> {
    let parsed = Url::parse(full_url)?;
    let host = parsed
        .host_str()
        .ok_or_else(|| CacheError::InvalidUrl(format!("'{full_url}' has no host")))?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    let mut normalized = format!("{host}{}", parsed.path());
    while normalized.ends_with('/') {
        normalized.pop();
    }
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        normalized.push('?');
        normalized.push_str(query);
    }
    Ok(normalized)
}
