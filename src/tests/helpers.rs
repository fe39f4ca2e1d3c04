//! Shared test utilities for cache testing

use parking_lot::Mutex;
use std::sync::Arc;

use crate::{
    cache::{CacheDeps, PageAnnotationsCache},
    event::{CacheEvent, CacheEventKind, EventEmitter},
    properties::{
        AnnotationForCache, ListForCache, PrivacyLevel, Selector, UnifiedAnnotation,
        UserReference,
    },
};

pub const TEST_PAGE_URL: &str = "test.com";

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Records every emitted event in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<CacheEvent>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<CacheEventKind> {
        self.events.lock().iter().map(CacheEvent::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventEmitter for EventLog {
    fn emit(&self, event: &CacheEvent) {
        self.events.lock().push(event.clone());
    }
}

/// A cache for [TEST_PAGE_URL] whose events land in the returned log.
pub fn setup_cache() -> (PageAnnotationsCache, Arc<EventLog>) {
    init_logging();
    let log = Arc::new(EventLog::default());
    let cache = PageAnnotationsCache::new(CacheDeps {
        normalized_page_url: TEST_PAGE_URL.to_string(),
        events: Some(log.clone()),
        ..Default::default()
    });
    (cache, log)
}

/// A cached-shape annotation, for exercising sorters without a cache.
pub fn annotation_fixture(
    unified_id: &str,
    position: Option<u64>,
    created_when: i64,
) -> UnifiedAnnotation {
    UnifiedAnnotation {
        unified_id: unified_id.to_string(),
        local_id: None,
        remote_id: None,
        normalized_page_url: TEST_PAGE_URL.to_string(),
        body: position.map(|_| format!("highlight {unified_id}")),
        comment: None,
        selector: position
            .map(|start| Selector::with_text_position(format!("quote {unified_id}"), start, start + 5)),
        creator: None,
        created_when,
        last_edited: created_when,
        privacy_level: PrivacyLevel::Private,
        color: None,
        unified_list_ids: Vec::new(),
    }
}

/// A locally owned highlight at `position` in the page text.
pub fn local_highlight(local_id: &str, position: u64, created_when: i64) -> AnnotationForCache {
    AnnotationForCache {
        local_id: Some(local_id.to_string()),
        normalized_page_url: TEST_PAGE_URL.to_string(),
        body: Some(format!("highlight {local_id}")),
        selector: Some(Selector::with_text_position(
            format!("quote {local_id}"),
            position,
            position + 5,
        )),
        creator: Some(UserReference::new("test-user")),
        created_when: Some(created_when),
        ..Default::default()
    }
}

/// A locally owned page note: comment only, no anchor.
pub fn local_note(local_id: &str, comment: &str, created_when: i64) -> AnnotationForCache {
    AnnotationForCache {
        local_id: Some(local_id.to_string()),
        normalized_page_url: TEST_PAGE_URL.to_string(),
        comment: Some(comment.to_string()),
        creator: Some(UserReference::new("test-user")),
        created_when: Some(created_when),
        ..Default::default()
    }
}

pub fn local_list(local_id: i64, name: &str) -> ListForCache {
    ListForCache {
        local_id: Some(local_id),
        name: name.to_string(),
        creator: Some(UserReference::new("test-user")),
        ..Default::default()
    }
}

pub fn shared_list(local_id: i64, remote_id: &str, name: &str) -> ListForCache {
    ListForCache {
        remote_id: Some(remote_id.to_string()),
        ..local_list(local_id, name)
    }
}
