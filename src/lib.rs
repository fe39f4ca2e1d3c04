//! # page-annotations-cache
//!
//! An in-memory, normalized store of the annotations and annotation lists attached to the page a
//! user is currently viewing.
//!
//! ## Overview
//!
//! Annotations (highlights and notes) and lists can be known under up to three identities: a
//! local-database id, a remote sharing-service id, and a cache-local **unified id** that this crate
//! assigns. The cache reconciles those identities, keeps cross-references between annotations and
//! lists, and applies every change optimistically, ahead of any backend confirmation. Each change
//! is announced through typed [`event::CacheEvent`]s so that any number of consumers can stay in
//! sync without holding a reference to the cache.
//!
//! ### Key Features
//!
//! - **Normalized collections**: id → entity map plus an independent display order
//! - **Copy-on-write snapshots**: state events carry `Arc` snapshots, change is detectable with
//!   `Arc::ptr_eq`
//! - **Typed events**: added/updated/removed entity events, always followed by a state event
//! - **Pluggable ordering**: page-position ordering by default, any comparator on demand
//! - **Backend adapters**: pure reshaping between storage/sharing records and cache shapes
//!
//! ## Architecture
//!
//! - **[`cache`]**: [`cache::PageAnnotationsCache`], the single source of truth for a page
//! - **[`normalized`]**: the [`normalized::NormalizedState`] container
//! - **[`properties`]**: entity shapes, privacy levels and selectors
//! - **[`event`]**: events, the [`event::EventEmitter`] seam and the default [`event::EventChannel`]
//! - **[`reshape`]**: backend ↔ cache adapters and page url normalization
//! - **[`sorting`]**: annotation comparators
//! - **[`query`]**: derived read-only views
//! - **[`hydrate`]**: bulk population from pre-fetched backend data
//! - **[`config`]**: TOML-backed settings
//!
//! ## Quick Start
//!
//! ```rust
//! use page_annotations_cache::{
//!     cache::{AddAnnotationOpts, CacheDeps, PageAnnotationsCache},
//!     event::CacheEventKind,
//!     properties::{AnnotationForCache, ListForCache},
//! };
//! use std::sync::{Arc, Mutex};
//!
//! let mut cache = PageAnnotationsCache::new(CacheDeps {
//!     normalized_page_url: "example.com/post".to_string(),
//!     ..Default::default()
//! });
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! cache
//!     .channel()
//!     .expect("default channel")
//!     .subscribe(move |event| sink.lock().unwrap().push(event.kind()));
//!
//! cache.set_lists(vec![ListForCache {
//!     local_id: Some(7),
//!     name: "Reading".to_string(),
//!     ..Default::default()
//! }]);
//! let id = cache.add_annotation(
//!     AnnotationForCache {
//!         normalized_page_url: "example.com/post".to_string(),
//!         comment: Some("Nice point".to_string()),
//!         local_list_ids: vec![7],
//!         ..Default::default()
//!     },
//!     AddAnnotationOpts::default(),
//! );
//!
//! assert_eq!(cache.annotations().get(&id).unwrap().unified_list_ids, vec!["0"]);
//! assert_eq!(
//!     *seen.lock().unwrap(),
//!     vec![
//!         CacheEventKind::NewListsState,
//!         CacheEventKind::AddedAnnotation,
//!         CacheEventKind::NewAnnotationsState,
//!         CacheEventKind::NewListsState,
//!     ]
//! );
//! ```
//!
//! ## Failure model
//!
//! Mutating an id the cache does not hold, or calling the unsupported
//! [`cache::PageAnnotationsCache::sort_lists`], returns a programmer-error [`CacheError`] before
//! anything changes. Reshaping a backend record without a creation timestamp fails with
//! [`CacheError::MissingTimestamp`]. A list reference that cannot be resolved while caching an
//! annotation is only logged through `tracing`.

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod hydrate;
pub mod ids;
pub mod normalized;
pub mod properties;
pub mod query;
pub mod reshape;
pub mod sorting;
#[cfg(test)]
mod tests;

pub use error::*;
