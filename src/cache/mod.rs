//! Cache module: the per-page annotation and list store.
//!
//! # Module Organization
//!
//! - [`base`]: [PageAnnotationsCache] and its construction/operation options
//!
//! ```rust
//! use page_annotations_cache::cache::{AddAnnotationOpts, CacheDeps, PageAnnotationsCache};
//! use page_annotations_cache::properties::AnnotationForCache;
//!
//! let mut cache = PageAnnotationsCache::new(CacheDeps {
//!     normalized_page_url: "example.com/article".to_string(),
//!     ..Default::default()
//! });
//! let unified_id = cache.add_annotation(
//!     AnnotationForCache {
//!         normalized_page_url: "example.com/article".to_string(),
//!         comment: Some("worth rereading".to_string()),
//!         ..Default::default()
//!     },
//!     AddAnnotationOpts::default(),
//! );
//! assert_eq!(cache.annotations().all_ids(), &[unified_id]);
//! ```

mod base;


pub use base::{
    AddAnnotationOpts, CacheDeps, PageAnnotationsCache, SetAnnotationsOpts, UpdateAnnotationOpts,
};
