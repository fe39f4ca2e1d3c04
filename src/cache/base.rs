//! PageAnnotationsCache: the in-memory source of truth for one page's annotations and lists.
//!
//! Every mutation is synchronous and optimistic. It either fails before touching any state, or it
//! applies in full and then emits its events, always ending with the affected collection's state
//! event. Backend calls happen outside the cache.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    config::CacheConfig,
    error::{CacheError, Result},
    event::{CacheEvent, EventChannel, EventEmitter},
    ids::IdGenerator,
    normalized::NormalizedState,
    properties::{
        AnnotationForCache, AnnotationUpdate, ListForCache, ListUpdate, PrivacyLevel,
        UnifiedAnnotation, UnifiedId, UnifiedList,
    },
    sorting::{sort_by_page_position, AnnotationsSorter, ListsSorter},
};

/// Construction-time collaborators. Everything is optional.
#[derive(Default)]
pub struct CacheDeps {
    pub normalized_page_url: String,
    /// Defaults to [sort_by_page_position]
    pub sorting_fn: Option<AnnotationsSorter>,
    /// Defaults to a fresh [EventChannel], reachable through [PageAnnotationsCache::channel]
    pub events: Option<Arc<dyn EventEmitter>>,
    /// Log unresolvable list references as warnings rather than debug lines
    pub debug: bool,
    pub default_highlight_color: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SetAnnotationsOpts {
    /// Timestamp for annotations missing `created_when`; defaults to the current time
    pub now: Option<i64>,
    /// Merge into the current annotations instead of replacing them. Inputs already cached (by
    /// local or remote id) are skipped, as are repeats within the batch, and the id counter keeps
    /// counting.
    pub keep_existing_data: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddAnnotationOpts {
    pub now: Option<i64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpdateAnnotationOpts {
    pub now: Option<i64>,
    pub update_last_edited_timestamp: bool,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

pub struct PageAnnotationsCache {
    normalized_page_url: String,
    annotations: Arc<NormalizedState<UnifiedAnnotation>>,
    lists: Arc<NormalizedState<UnifiedList>>,
    /// Normalized page url → the lists that page belongs to
    page_list_ids: BTreeMap<String, Vec<UnifiedId>>,
    annotation_ids: IdGenerator,
    list_ids: IdGenerator,
    sorting_fn: AnnotationsSorter,
    events: Arc<dyn EventEmitter>,
    channel: Option<Arc<EventChannel>>,
    debug: bool,
    default_highlight_color: Option<String>,
}

impl fmt::Debug for PageAnnotationsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageAnnotationsCache")
            .field("normalized_page_url", &self.normalized_page_url)
            .field("annotations", &self.annotations.len())
            .field("lists", &self.lists.len())
            .finish()
    }
}

impl fmt::Display for PageAnnotationsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PageAnnotationsCache({}: {} annotations, {} lists)",
            self.normalized_page_url,
            self.annotations.len(),
            self.lists.len()
        )
    }
}

impl Default for PageAnnotationsCache {
    fn default() -> Self {
        PageAnnotationsCache::new(CacheDeps::default())
    }
}

impl PageAnnotationsCache {
    pub fn new(deps: CacheDeps) -> Self {
        let (events, channel) = match deps.events {
            Some(events) => (events, None),
            None => {
                let channel = Arc::new(EventChannel::new());
                (channel.clone() as Arc<dyn EventEmitter>, Some(channel))
            }
        };
        PageAnnotationsCache {
            normalized_page_url: deps.normalized_page_url,
            annotations: Arc::default(),
            lists: Arc::default(),
            page_list_ids: BTreeMap::new(),
            annotation_ids: IdGenerator::new(),
            list_ids: IdGenerator::new(),
            sorting_fn: deps
                .sorting_fn
                .unwrap_or_else(|| Arc::new(sort_by_page_position)),
            events,
            channel,
            debug: deps.debug,
            default_highlight_color: deps.default_highlight_color,
        }
    }

    pub fn from_config(
        config: &CacheConfig,
        normalized_page_url: impl Into<String>,
        events: Option<Arc<dyn EventEmitter>>,
    ) -> Self {
        PageAnnotationsCache::new(CacheDeps {
            normalized_page_url: normalized_page_url.into(),
            sorting_fn: Some(config.sort_order.sorter()),
            events,
            debug: config.debug,
            default_highlight_color: config.default_highlight_color.clone(),
        })
    }

    pub fn normalized_page_url(&self) -> &str {
        &self.normalized_page_url
    }

    pub fn annotations(&self) -> &Arc<NormalizedState<UnifiedAnnotation>> {
        &self.annotations
    }

    pub fn lists(&self) -> &Arc<NormalizedState<UnifiedList>> {
        &self.lists
    }

    pub fn events(&self) -> &Arc<dyn EventEmitter> {
        &self.events
    }

    /// The default channel, present only when no emitter was injected.
    pub fn channel(&self) -> Option<&Arc<EventChannel>> {
        self.channel.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn last_assigned_annotation_id(&self) -> Option<UnifiedId> {
        self.annotation_ids.last_assigned_id()
    }

    pub fn last_assigned_list_id(&self) -> Option<UnifiedId> {
        self.list_ids.last_assigned_id()
    }

    pub fn set_default_highlight_color(&mut self, color: Option<String>) {
        self.default_highlight_color = color;
    }

    pub fn get_annotations_array(&self) -> Vec<UnifiedAnnotation> {
        self.annotations.to_vec()
    }

    pub fn get_lists_array(&self) -> Vec<UnifiedList> {
        self.lists.to_vec()
    }

    /// Annotations with a non-empty body, in display order.
    pub fn highlights(&self) -> Vec<UnifiedAnnotation> {
        self.annotations
            .iter()
            .filter(|annotation| annotation.is_highlight())
            .cloned()
            .collect()
    }

    pub fn get_annotation_by_local_id(&self, local_id: &str) -> Option<&UnifiedAnnotation> {
        self.annotations
            .iter()
            .find(|annotation| annotation.local_id.as_deref() == Some(local_id))
    }

    pub fn get_annotation_by_remote_id(&self, remote_id: &str) -> Option<&UnifiedAnnotation> {
        self.annotations
            .iter()
            .find(|annotation| annotation.remote_id.as_deref() == Some(remote_id))
    }

    pub fn get_list_by_local_id(&self, local_id: i64) -> Option<&UnifiedList> {
        self.lists.iter().find(|list| list.local_id == Some(local_id))
    }

    pub fn get_list_by_remote_id(&self, remote_id: &str) -> Option<&UnifiedList> {
        self.lists
            .iter()
            .find(|list| list.remote_id.as_deref() == Some(remote_id))
    }

    /// Lists recorded for the page through [PageAnnotationsCache::set_page_data].
    pub fn get_page_list_ids(&self, normalized_page_url: &str) -> &[UnifiedId] {
        self.page_list_ids
            .get(normalized_page_url)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The page's lists that are still cached and have a remote copy.
    pub fn get_shared_page_list_ids(&self, normalized_page_url: &str) -> Vec<UnifiedId> {
        self.get_page_list_ids(normalized_page_url)
            .iter()
            .filter(|list_id| self.is_list_shared(list_id))
            .cloned()
            .collect()
    }

    fn is_list_shared(&self, list_id: &str) -> bool {
        self.lists.get(list_id).is_some_and(UnifiedList::is_shared)
    }

    /// `None` when the list is not cached.
    fn list_references(&self, list_id: &str, annotation_id: &str) -> Option<bool> {
        self.lists
            .get(list_id)
            .map(|list| list.unified_annotation_ids.iter().any(|id| id == annotation_id))
    }

    fn emit(&self, event: CacheEvent) {
        tracing::trace!("[PageAnnotationsCache] emitting {event}");
        self.events.emit(&event);
    }

    fn emit_annotations_state(&self) {
        self.emit(CacheEvent::NewAnnotationsState(self.annotations.clone()));
    }

    fn emit_lists_state(&self) {
        self.emit(CacheEvent::NewListsState(self.lists.clone()));
    }

    fn is_cached(&self, annotation: &AnnotationForCache) -> bool {
        if let Some(local_id) = annotation.local_id.as_deref() {
            self.get_annotation_by_local_id(local_id).is_some()
        } else if let Some(remote_id) = annotation.remote_id.as_deref() {
            self.get_annotation_by_remote_id(remote_id).is_some()
        } else {
            false
        }
    }

    /// Shape an input annotation for caching, minus its unified id. List memberships are resolved
    /// to cached list ids; anything that does not resolve is dropped.
    fn prepare_annotation(&self, annotation: AnnotationForCache, now: i64) -> UnifiedAnnotation {
        let AnnotationForCache {
            local_id,
            remote_id,
            normalized_page_url,
            body,
            comment,
            selector,
            creator,
            created_when,
            last_edited,
            privacy_level,
            color,
            unified_list_ids,
            local_list_ids,
        } = annotation;

        let mut privacy_level = privacy_level;
        let mut candidates = unified_list_ids;
        for local_list_id in local_list_ids {
            match self.get_list_by_local_id(local_list_id) {
                Some(list) => {
                    // Entries in shared lists are at least selectively shared
                    if list.is_shared() && privacy_level < PrivacyLevel::Protected {
                        privacy_level = PrivacyLevel::Protected;
                    }
                    candidates.push(list.unified_id.clone());
                }
                None if self.debug => tracing::warn!(
                    "[PageAnnotationsCache] No cached list data found for local list ID \
                     {local_list_id} on annotation {local_id:?} - were lists cached before \
                     annotations?"
                ),
                None => tracing::debug!(
                    "[PageAnnotationsCache] dropping unresolved local list ID {local_list_id}"
                ),
            }
        }
        let mut resolved: Vec<UnifiedId> = Vec::with_capacity(candidates.len());
        for list_id in candidates {
            if self.lists.contains(&list_id) && !resolved.contains(&list_id) {
                resolved.push(list_id);
            }
        }

        let created_when = created_when.unwrap_or(now);
        UnifiedAnnotation {
            unified_id: UnifiedId::new(),
            local_id,
            remote_id,
            normalized_page_url,
            body,
            comment,
            selector,
            creator,
            created_when,
            last_edited: last_edited.unwrap_or(created_when),
            privacy_level,
            color: color.or_else(|| self.default_highlight_color.clone()),
            unified_list_ids: resolved,
        }
    }

    /// Give each list in `list_ids` a back-reference to the annotation. Returns whether any list
    /// changed.
    fn link_annotation_to_lists(&mut self, annotation_id: &str, list_ids: &[UnifiedId]) -> bool {
        let missing: Vec<&UnifiedId> = list_ids
            .iter()
            .filter(|list_id| self.list_references(list_id, annotation_id) == Some(false))
            .collect();
        if missing.is_empty() {
            return false;
        }
        let lists = Arc::make_mut(&mut self.lists);
        for list_id in missing {
            if let Some(list) = lists.get_mut(list_id) {
                list.unified_annotation_ids.insert(0, annotation_id.to_string());
            }
        }
        true
    }

    /// Give each annotation in `annotation_ids` a back-reference to the list. Returns whether any
    /// annotation changed.
    fn link_list_to_annotations(&mut self, list_id: &str, annotation_ids: &[UnifiedId]) -> bool {
        let missing: Vec<&UnifiedId> = annotation_ids
            .iter()
            .filter(|annotation_id| {
                self.annotations
                    .get(annotation_id)
                    .is_some_and(|annotation| {
                        !annotation.unified_list_ids.iter().any(|id| id == list_id)
                    })
            })
            .collect();
        if missing.is_empty() {
            return false;
        }
        let annotations = Arc::make_mut(&mut self.annotations);
        for annotation_id in missing {
            if let Some(annotation) = annotations.get_mut(annotation_id) {
                annotation.unified_list_ids.insert(0, list_id.to_string());
            }
        }
        true
    }

    /// Move back-references from lists the annotation left to lists it joined. Returns whether any
    /// list changed.
    fn relink_annotation_lists(
        &mut self,
        annotation_id: &str,
        previous: &[UnifiedId],
        next: &[UnifiedId],
    ) -> bool {
        let removed: Vec<&UnifiedId> = previous
            .iter()
            .filter(|id| !next.contains(id))
            .filter(|list_id| self.list_references(list_id, annotation_id) == Some(true))
            .collect();
        let added: Vec<&UnifiedId> = next
            .iter()
            .filter(|id| !previous.contains(id))
            .filter(|list_id| self.list_references(list_id, annotation_id) == Some(false))
            .collect();
        if removed.is_empty() && added.is_empty() {
            return false;
        }
        let lists = Arc::make_mut(&mut self.lists);
        for list_id in removed {
            if let Some(list) = lists.get_mut(list_id) {
                list.unified_annotation_ids.retain(|id| id != annotation_id);
            }
        }
        for list_id in added {
            if let Some(list) = lists.get_mut(list_id) {
                list.unified_annotation_ids.push(annotation_id.to_string());
            }
        }
        true
    }

    /// Point every shared annotation at its page's shared lists, keeping its private lists.
    /// Returns the ids of the annotations that changed.
    fn sync_shared_annotations_with_page_lists(&mut self) -> Vec<UnifiedId> {
        let updates: Vec<(UnifiedId, Vec<UnifiedId>)> = self
            .annotations
            .iter()
            .filter(|annotation| annotation.is_shared())
            .filter_map(|annotation| {
                let mut list_ids = self.get_shared_page_list_ids(&annotation.normalized_page_url);
                for list_id in &annotation.unified_list_ids {
                    if !self.is_list_shared(list_id) && !list_ids.contains(list_id) {
                        list_ids.push(list_id.clone());
                    }
                }
                let unchanged = list_ids.len() == annotation.unified_list_ids.len()
                    && list_ids
                        .iter()
                        .all(|id| annotation.unified_list_ids.contains(id));
                (!unchanged).then(|| (annotation.unified_id.clone(), list_ids))
            })
            .collect();
        if updates.is_empty() {
            return Vec::new();
        }

        let annotations = Arc::make_mut(&mut self.annotations);
        let mut changed = Vec::with_capacity(updates.len());
        for (annotation_id, list_ids) in updates {
            if let Some(annotation) = annotations.get_mut(&annotation_id) {
                annotation.unified_list_ids = list_ids;
                changed.push(annotation_id);
            }
        }
        changed
    }

    /// Make each list in `list_ids` reference exactly those of `annotation_ids` that reference it.
    /// Returns whether any list changed.
    fn reconcile_list_references(
        &mut self,
        list_ids: &[UnifiedId],
        annotation_ids: &[UnifiedId],
    ) -> bool {
        let list_ids: BTreeSet<&UnifiedId> = list_ids.iter().collect();
        let mut edits: Vec<(&UnifiedId, &UnifiedId, bool)> = Vec::new();
        for list_id in list_ids {
            let Some(list) = self.lists.get(list_id) else {
                continue;
            };
            for annotation_id in annotation_ids {
                let Some(annotation) = self.annotations.get(annotation_id) else {
                    continue;
                };
                let wanted = annotation.unified_list_ids.contains(list_id);
                if wanted != list.unified_annotation_ids.contains(annotation_id) {
                    edits.push((list_id, annotation_id, wanted));
                }
            }
        }
        if edits.is_empty() {
            return false;
        }

        let lists = Arc::make_mut(&mut self.lists);
        for (list_id, annotation_id, wanted) in edits {
            if let Some(list) = lists.get_mut(list_id) {
                if wanted {
                    list.unified_annotation_ids.push(annotation_id.clone());
                } else {
                    list.unified_annotation_ids.retain(|id| id != annotation_id);
                }
            }
        }
        true
    }

    /// Replace the cached annotations with `annotations`, scoped to `normalized_page_url`.
    ///
    /// Inputs are sorted with the configured sorter before ids are assigned, so ids follow display
    /// order. Returns the assigned ids in that order.
    pub fn set_annotations(
        &mut self,
        normalized_page_url: &str,
        annotations: Vec<AnnotationForCache>,
        opts: SetAnnotationsOpts,
    ) -> Vec<UnifiedId> {
        let now = opts.now.unwrap_or_else(now_ms);
        if !opts.keep_existing_data {
            self.annotation_ids.reset();
        }

        if self.normalized_page_url != normalized_page_url {
            tracing::debug!(
                "[PageAnnotationsCache::set_annotations] page changed: {} -> {}",
                self.normalized_page_url,
                normalized_page_url
            );
            self.normalized_page_url = normalized_page_url.to_string();
            self.emit(CacheEvent::UpdatedPageUrl(self.normalized_page_url.clone()));
        }

        let annotations = if opts.keep_existing_data {
            let mut seen = BTreeSet::new();
            annotations
                .into_iter()
                .filter(|annotation| !self.is_cached(annotation))
                .filter(|annotation| match annotation_key(annotation) {
                    Some(key) => seen.insert(key),
                    None => true,
                })
                .collect()
        } else {
            annotations
        };
        let mut prepared: Vec<UnifiedAnnotation> = annotations
            .into_iter()
            .map(|annotation| self.prepare_annotation(annotation, now))
            .collect();
        let sorter = self.sorting_fn.clone();
        prepared.sort_by(|a, b| sorter(a, b));

        for annotation in prepared.iter_mut() {
            annotation.unified_id = self.annotation_ids.generate_id();
        }

        // Old annotation ids are about to be reused; drop the lists' references to them.
        let mut lists_changed = false;
        if !opts.keep_existing_data
            && self
                .lists
                .iter()
                .any(|list| !list.unified_annotation_ids.is_empty())
        {
            for list in Arc::make_mut(&mut self.lists).values_mut() {
                list.unified_annotation_ids.clear();
            }
            lists_changed = true;
        }
        for annotation in prepared.iter() {
            lists_changed |=
                self.link_annotation_to_lists(&annotation.unified_id, &annotation.unified_list_ids);
        }

        let unified_ids: Vec<UnifiedId> = prepared.iter().map(|a| a.unified_id.clone()).collect();
        let mut seed = prepared;
        if opts.keep_existing_data {
            seed.extend(self.annotations.iter().cloned());
        }
        tracing::debug!(
            "[PageAnnotationsCache::set_annotations] caching {} new of {} annotations",
            unified_ids.len(),
            seed.len()
        );
        self.annotations = Arc::new(NormalizedState::from_seed(
            seed,
            |annotation: &UnifiedAnnotation| annotation.unified_id.clone(),
        ));

        self.emit_annotations_state();
        if lists_changed {
            self.emit_lists_state();
        }
        unified_ids
    }

    /// Replace the cached lists. Returns the assigned ids in input order.
    ///
    /// List ids restart from zero, so recorded page lists are forgotten.
    pub fn set_lists(&mut self, lists: Vec<ListForCache>) -> Vec<UnifiedId> {
        self.list_ids.reset();
        self.page_list_ids.clear();

        let mut seed = Vec::with_capacity(lists.len());
        for list in lists {
            let unified_id = self.list_ids.generate_id();
            seed.push(prepare_list(unified_id, list));
        }
        let unified_ids: Vec<UnifiedId> = seed.iter().map(|l| l.unified_id.clone()).collect();
        self.lists = Arc::new(NormalizedState::from_seed(seed, |list: &UnifiedList| {
            list.unified_id.clone()
        }));

        self.emit_lists_state();
        unified_ids
    }

    /// Cache a new annotation at the front of the display order.
    pub fn add_annotation(
        &mut self,
        annotation: AnnotationForCache,
        opts: AddAnnotationOpts,
    ) -> UnifiedId {
        let now = opts.now.unwrap_or_else(now_ms);
        let mut next = self.prepare_annotation(annotation, now);
        next.unified_id = self.annotation_ids.generate_id();
        let unified_id = next.unified_id.clone();

        if next.is_shared() {
            let mut list_ids = self.get_shared_page_list_ids(&next.normalized_page_url);
            for list_id in std::mem::take(&mut next.unified_list_ids) {
                if !list_ids.contains(&list_id) {
                    list_ids.push(list_id);
                }
            }
            next.unified_list_ids = list_ids;
        }

        let lists_changed = self.link_annotation_to_lists(&unified_id, &next.unified_list_ids);
        Arc::make_mut(&mut self.annotations).prepend(unified_id.clone(), next.clone());

        self.emit(CacheEvent::AddedAnnotation(next));
        self.emit_annotations_state();
        if lists_changed {
            self.emit_lists_state();
        }
        unified_id
    }

    /// Cache a new list at the front of the list order.
    ///
    /// A shared list also collects its creator's shared annotations, and every annotation the
    /// list holds gets a reference back to it.
    pub fn add_list(&mut self, list: ListForCache) -> UnifiedId {
        let unified_id = self.list_ids.generate_id();
        let mut next = prepare_list(unified_id.clone(), list);
        if next.is_shared() {
            for annotation in self.annotations.iter() {
                if annotation.is_shared()
                    && annotation.creator == next.creator
                    && !next.unified_annotation_ids.contains(&annotation.unified_id)
                {
                    next.unified_annotation_ids.push(annotation.unified_id.clone());
                }
            }
        }

        let annotations_changed =
            self.link_list_to_annotations(&unified_id, &next.unified_annotation_ids);
        Arc::make_mut(&mut self.lists).prepend(unified_id.clone(), next.clone());

        self.emit(CacheEvent::AddedList(next));
        self.emit_lists_state();
        if annotations_changed {
            self.emit_annotations_state();
        }
        unified_id
    }

    /// Record the lists `normalized_page_url` belongs to, replacing what was recorded before.
    /// Uncached list ids are ignored.
    ///
    /// Shared annotations on any page are then pointed at their page's shared lists, and the
    /// lists involved are brought in line with them.
    pub fn set_page_data(&mut self, normalized_page_url: &str, list_ids: Vec<UnifiedId>) {
        let previous = self
            .page_list_ids
            .remove(normalized_page_url)
            .unwrap_or_default();
        let mut page_lists: Vec<UnifiedId> = Vec::with_capacity(list_ids.len());
        for list_id in &list_ids {
            if self.lists.contains(list_id) && !page_lists.contains(list_id) {
                page_lists.push(list_id.clone());
            }
        }
        self.page_list_ids
            .insert(normalized_page_url.to_string(), page_lists.clone());
        self.emit(CacheEvent::UpdatedPageData(
            normalized_page_url.to_string(),
            page_lists,
        ));

        let changed = self.sync_shared_annotations_with_page_lists();
        if changed.is_empty() {
            return;
        }
        tracing::debug!(
            "[PageAnnotationsCache::set_page_data] {} shared annotations follow new page lists",
            changed.len()
        );
        let touched: Vec<UnifiedId> = previous.into_iter().chain(list_ids).collect();
        let lists_changed = self.reconcile_list_references(&touched, &changed);
        self.emit_annotations_state();
        if lists_changed {
            self.emit_lists_state();
        }
    }

    pub fn update_annotation(
        &mut self,
        updates: AnnotationUpdate,
        opts: UpdateAnnotationOpts,
    ) -> Result<()> {
        let previous = self
            .annotations
            .get(&updates.unified_id)
            .cloned()
            .ok_or_else(|| CacheError::AnnotationNotFound(updates.unified_id.clone()))?;

        let mut unified_list_ids: Vec<UnifiedId> = Vec::with_capacity(updates.unified_list_ids.len());
        for list_id in updates.unified_list_ids {
            if !unified_list_ids.contains(&list_id) {
                unified_list_ids.push(list_id);
            }
        }

        let next = UnifiedAnnotation {
            comment: updates.comment.or_else(|| previous.comment.clone()),
            privacy_level: updates.privacy_level,
            unified_list_ids,
            body: updates.body.or_else(|| previous.body.clone()),
            remote_id: updates.remote_id.or_else(|| previous.remote_id.clone()),
            color: updates.color.or_else(|| previous.color.clone()),
            last_edited: if opts.update_last_edited_timestamp {
                opts.now.unwrap_or_else(now_ms)
            } else {
                previous.last_edited
            },
            ..previous.clone()
        };

        let lists_changed = self.relink_annotation_lists(
            &previous.unified_id,
            &previous.unified_list_ids,
            &next.unified_list_ids,
        );
        if Arc::make_mut(&mut self.annotations)
            .replace(&previous.unified_id, next.clone())
            .is_err()
        {
            return Err(CacheError::AnnotationNotFound(previous.unified_id));
        }

        self.emit(CacheEvent::UpdatedAnnotation(next));
        self.emit_annotations_state();
        if lists_changed {
            self.emit_lists_state();
        }
        Ok(())
    }

    /// A list that gains or changes its remote id is newly shared: shared annotations on pages
    /// recorded as belonging to it join it.
    pub fn update_list(&mut self, updates: ListUpdate) -> Result<()> {
        let previous = self
            .lists
            .get(&updates.unified_id)
            .cloned()
            .ok_or_else(|| CacheError::ListNotFound(updates.unified_id.clone()))?;

        let next = UnifiedList {
            name: updates.name.unwrap_or_else(|| previous.name.clone()),
            description: updates.description.or_else(|| previous.description.clone()),
            remote_id: updates.remote_id.or_else(|| previous.remote_id.clone()),
            ..previous.clone()
        };
        let newly_shared = next.remote_id != previous.remote_id;
        if Arc::make_mut(&mut self.lists)
            .replace(&previous.unified_id, next)
            .is_err()
        {
            return Err(CacheError::ListNotFound(previous.unified_id));
        }

        let mut changed = Vec::new();
        if newly_shared {
            changed = self.sync_shared_annotations_with_page_lists();
            self.reconcile_list_references(std::slice::from_ref(&previous.unified_id), &changed);
        }

        if let Some(next) = self.lists.get(&previous.unified_id).cloned() {
            self.emit(CacheEvent::UpdatedList(next));
        }
        self.emit_lists_state();
        if !changed.is_empty() {
            self.emit_annotations_state();
        }
        Ok(())
    }

    pub fn remove_annotation(&mut self, unified_id: &str) -> Result<()> {
        if !self.annotations.contains(unified_id) {
            return Err(CacheError::AnnotationNotFound(unified_id.to_string()));
        }
        let previous = Arc::make_mut(&mut self.annotations)
            .remove(unified_id)
            .ok_or_else(|| CacheError::AnnotationNotFound(unified_id.to_string()))?;

        self.emit(CacheEvent::RemovedAnnotation(previous));
        self.emit_annotations_state();
        Ok(())
    }

    pub fn remove_annotation_by_local_id(&mut self, local_id: &str) -> Result<()> {
        let unified_id = self
            .get_annotation_by_local_id(local_id)
            .map(|annotation| annotation.unified_id.clone())
            .ok_or_else(|| CacheError::AnnotationNotFound(local_id.to_string()))?;
        self.remove_annotation(&unified_id)
    }

    /// Annotations keep any reference to the removed list in `unified_list_ids`. Recorded page
    /// lists forget it.
    pub fn remove_list(&mut self, unified_id: &str) -> Result<()> {
        if !self.lists.contains(unified_id) {
            return Err(CacheError::ListNotFound(unified_id.to_string()));
        }
        let previous = Arc::make_mut(&mut self.lists)
            .remove(unified_id)
            .ok_or_else(|| CacheError::ListNotFound(unified_id.to_string()))?;
        for list_ids in self.page_list_ids.values_mut() {
            list_ids.retain(|id| id != unified_id);
        }

        self.emit(CacheEvent::RemovedList(previous));
        self.emit_lists_state();
        Ok(())
    }

    /// Re-derive the annotation display order. A supplied sorter also becomes the default for
    /// later [PageAnnotationsCache::set_annotations] calls.
    pub fn sort_annotations(&mut self, sorting_fn: Option<AnnotationsSorter>) {
        if let Some(sorting_fn) = sorting_fn {
            self.sorting_fn = sorting_fn;
        }

        let mut order = self.annotations.all_ids().to_vec();
        {
            let state = &self.annotations;
            let sorter = &self.sorting_fn;
            order.sort_by(|a, b| match (state.get(a), state.get(b)) {
                (Some(a), Some(b)) => sorter(a, b),
                _ => Ordering::Equal,
            });
        }
        Arc::make_mut(&mut self.annotations).set_order(order);

        self.emit_annotations_state();
    }

    /// List ordering is not supported; this always fails.
    pub fn sort_lists(&mut self, _sorting_fn: Option<ListsSorter>) -> Result<()> {
        Err(CacheError::Unsupported(
            "List sorting not yet implemented".to_string(),
        ))
    }
}

/// The identity `keep_existing_data` deduplicates on: local id first, else remote id.
fn annotation_key(annotation: &AnnotationForCache) -> Option<(bool, String)> {
    match (&annotation.local_id, &annotation.remote_id) {
        (Some(local_id), _) => Some((true, local_id.clone())),
        (None, Some(remote_id)) => Some((false, remote_id.clone())),
        (None, None) => None,
    }
}

fn prepare_list(unified_id: UnifiedId, list: ListForCache) -> UnifiedList {
    let ListForCache {
        local_id,
        remote_id,
        name,
        description,
        creator,
        unified_annotation_ids,
        has_remote_annotations_to_load,
    } = list;
    UnifiedList {
        unified_id,
        local_id,
        remote_id,
        name,
        description,
        creator,
        unified_annotation_ids,
        has_remote_annotations_to_load,
    }
}
