//! Entity shapes held by the [crate::cache::PageAnnotationsCache].
//!
//! Unified ids are cache-local: they exist only for the lifetime of a cache instance (and reset
//! when a collection is replaced wholesale). Local and remote ids are an optional pair; a shared,
//! locally owned annotation legitimately carries both.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cache-local identifier of an annotation or list.
pub type UnifiedId = String;

/// Reference to a user owned by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserReference {
    pub id: String,
}

impl UserReference {
    pub fn new(id: impl Into<String>) -> Self {
        UserReference { id: id.into() }
    }
}

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PrivacyLevel {
    #[default]
    Private = 0,
    Protected = 100,
    Shared = 200,
    SharedProtected = 300,
}

impl PrivacyLevel {
    pub fn from_share_opts(should_share: bool, is_bulk_share_protected: bool) -> Self {
        match (should_share, is_bulk_share_protected) {
            (true, true) => PrivacyLevel::SharedProtected,
            (true, false) => PrivacyLevel::Shared,
            (false, true) => PrivacyLevel::Protected,
            (false, false) => PrivacyLevel::Private,
        }
    }

    /// Inverse of [PrivacyLevel::from_share_opts]: `(is_shared, is_bulk_share_protected)`.
    pub fn to_share_opts(self) -> (bool, bool) {
        (self.is_shared(), self.is_bulk_share_protected())
    }

    pub fn is_shared(self) -> bool {
        self >= PrivacyLevel::Shared
    }

    pub fn is_bulk_share_protected(self) -> bool {
        matches!(self, PrivacyLevel::Protected | PrivacyLevel::SharedProtected)
    }
}

/// DOM anchor for a highlight. The cache treats the descriptor as opaque; the only thing it ever
/// reads is the text position used for default page ordering.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default)]
    pub descriptor: Value,
}

impl Selector {
    /// Start offset of the `TextPositionSelector` within the descriptor content, if present.
    pub fn text_position(&self) -> Option<u64> {
        self.descriptor
            .get("content")?
            .as_array()?
            .iter()
            .find(|part| part.get("type").and_then(Value::as_str) == Some("TextPositionSelector"))?
            .get("start")?
            .as_u64()
    }

    pub fn with_text_position(quote: impl Into<String>, start: u64, end: u64) -> Self {
        Selector {
            quote: Some(quote.into()),
            descriptor: serde_json::json!({
                "strategy": "hyp-anchoring",
                "content": [
                    { "type": "TextPositionSelector", "start": start, "end": end }
                ]
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedAnnotation {
    pub unified_id: UnifiedId,
    pub local_id: Option<String>,
    pub remote_id: Option<String>,
    pub normalized_page_url: String,
    pub body: Option<String>,
    pub comment: Option<String>,
    pub selector: Option<Selector>,
    pub creator: Option<UserReference>,
    pub created_when: i64,
    pub last_edited: i64,
    pub privacy_level: PrivacyLevel,
    pub color: Option<String>,
    #[serde(default)]
    pub unified_list_ids: Vec<UnifiedId>,
}

impl UnifiedAnnotation {
    pub fn is_shared(&self) -> bool {
        self.privacy_level.is_shared()
    }

    pub fn is_bulk_share_protected(&self) -> bool {
        self.privacy_level.is_bulk_share_protected()
    }

    /// Highlights are annotations anchored to page text.
    pub fn is_highlight(&self) -> bool {
        self.body.as_deref().is_some_and(|body| !body.is_empty())
    }
}

/// An annotation as handed to the cache: no unified id yet, optional timestamps, and list
/// memberships that may still be expressed as local-database list ids.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationForCache {
    pub local_id: Option<String>,
    pub remote_id: Option<String>,
    pub normalized_page_url: String,
    pub body: Option<String>,
    pub comment: Option<String>,
    pub selector: Option<Selector>,
    pub creator: Option<UserReference>,
    pub created_when: Option<i64>,
    pub last_edited: Option<i64>,
    pub privacy_level: PrivacyLevel,
    pub color: Option<String>,
    #[serde(default)]
    pub unified_list_ids: Vec<UnifiedId>,
    #[serde(default)]
    pub local_list_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedList {
    pub unified_id: UnifiedId,
    pub local_id: Option<i64>,
    pub remote_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub creator: Option<UserReference>,
    #[serde(default)]
    pub unified_annotation_ids: Vec<UnifiedId>,
    #[serde(default)]
    pub has_remote_annotations_to_load: bool,
}

impl UnifiedList {
    pub fn is_shared(&self) -> bool {
        self.remote_id.is_some()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListForCache {
    pub local_id: Option<i64>,
    pub remote_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub creator: Option<UserReference>,
    #[serde(default)]
    pub unified_annotation_ids: Vec<UnifiedId>,
    #[serde(default)]
    pub has_remote_annotations_to_load: bool,
}

/// Field changes for [crate::cache::PageAnnotationsCache::update_annotation].
///
/// `privacy_level` and `unified_list_ids` always replace the cached values. The optional fields
/// only apply when set.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationUpdate {
    pub unified_id: UnifiedId,
    pub comment: Option<String>,
    pub privacy_level: PrivacyLevel,
    #[serde(default)]
    pub unified_list_ids: Vec<UnifiedId>,
    pub body: Option<String>,
    pub remote_id: Option<String>,
    pub color: Option<String>,
}

impl From<&UnifiedAnnotation> for AnnotationUpdate {
    fn from(annotation: &UnifiedAnnotation) -> Self {
        AnnotationUpdate {
            unified_id: annotation.unified_id.clone(),
            comment: annotation.comment.clone(),
            privacy_level: annotation.privacy_level,
            unified_list_ids: annotation.unified_list_ids.clone(),
            body: None,
            remote_id: None,
            color: None,
        }
    }
}

/// Field changes for [crate::cache::PageAnnotationsCache::update_list]. Unset fields are
/// preserved.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUpdate {
    pub unified_id: UnifiedId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub remote_id: Option<String>,
}
