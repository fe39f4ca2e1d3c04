//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use page_annotations_cache::{
    cache::{CacheDeps, PageAnnotationsCache},
    event::{CacheEvent, CacheEventKind, EventEmitter},
    properties::{AnnotationForCache, ListForCache, Selector, UserReference},
};
use parking_lot::Mutex;
use std::sync::Arc;

pub const PAGE_URL: &str = "example.com/article";

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Emitter that keeps every event it is handed.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<CacheEvent>>,
}

#[allow(dead_code)]
impl RecordingEmitter {
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<CacheEventKind> {
        self.events.lock().iter().map(CacheEvent::kind).collect()
    }

    pub fn take(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: &CacheEvent) {
        self.events.lock().push(event.clone());
    }
}

/// A cache for [PAGE_URL] wired to a [RecordingEmitter].
#[allow(dead_code)]
pub fn recorded_cache() -> (PageAnnotationsCache, Arc<RecordingEmitter>) {
    let emitter = Arc::new(RecordingEmitter::default());
    let cache = PageAnnotationsCache::new(CacheDeps {
        normalized_page_url: PAGE_URL.to_string(),
        events: Some(emitter.clone()),
        ..Default::default()
    });
    (cache, emitter)
}

#[allow(dead_code)]
pub fn highlight(local_id: &str, position: u64) -> AnnotationForCache {
    AnnotationForCache {
        local_id: Some(local_id.to_string()),
        normalized_page_url: PAGE_URL.to_string(),
        body: Some(format!("text of {local_id}")),
        selector: Some(Selector::with_text_position(
            format!("text of {local_id}"),
            position,
            position + 10,
        )),
        creator: Some(UserReference::new("reader")),
        created_when: Some(1_700_000_000_000),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn note(local_id: &str, comment: &str) -> AnnotationForCache {
    AnnotationForCache {
        local_id: Some(local_id.to_string()),
        normalized_page_url: PAGE_URL.to_string(),
        comment: Some(comment.to_string()),
        creator: Some(UserReference::new("reader")),
        created_when: Some(1_700_000_000_000),
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn list(local_id: i64, name: &str) -> ListForCache {
    ListForCache {
        local_id: Some(local_id),
        name: name.to_string(),
        creator: Some(UserReference::new("reader")),
        ..Default::default()
    }
}
