use parking_lot::Mutex;
use std::fmt::{self, Display, Formatter};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::{
    error::CacheError,
    normalized::NormalizedState,
    properties::{UnifiedAnnotation, UnifiedId, UnifiedList},
};

/// Change notifications emitted by [crate::cache::PageAnnotationsCache].
///
/// State events carry the collection snapshot that was current when they fired. The snapshot is
/// shared copy-on-write with the cache, so `Arc::ptr_eq` between two received states tells a
/// subscriber whether anything changed.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// New normalized page URL
    UpdatedPageUrl(String),
    /// A page's complete set of list memberships
    UpdatedPageData(String, Vec<UnifiedId>),
    NewListsState(Arc<NormalizedState<UnifiedList>>),
    NewAnnotationsState(Arc<NormalizedState<UnifiedAnnotation>>),
    AddedAnnotation(UnifiedAnnotation),
    UpdatedAnnotation(UnifiedAnnotation),
    /// The annotation as it was immediately before removal
    RemovedAnnotation(UnifiedAnnotation),
    AddedList(UnifiedList),
    UpdatedList(UnifiedList),
    /// The list as it was immediately before removal
    RemovedList(UnifiedList),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheEventKind {
    UpdatedPageUrl,
    UpdatedPageData,
    NewListsState,
    NewAnnotationsState,
    AddedAnnotation,
    UpdatedAnnotation,
    RemovedAnnotation,
    AddedList,
    UpdatedList,
    RemovedList,
}

impl CacheEvent {
    pub fn kind(&self) -> CacheEventKind {
        match self {
            CacheEvent::UpdatedPageUrl(_) => CacheEventKind::UpdatedPageUrl,
            CacheEvent::UpdatedPageData(..) => CacheEventKind::UpdatedPageData,
            CacheEvent::NewListsState(_) => CacheEventKind::NewListsState,
            CacheEvent::NewAnnotationsState(_) => CacheEventKind::NewAnnotationsState,
            CacheEvent::AddedAnnotation(_) => CacheEventKind::AddedAnnotation,
            CacheEvent::UpdatedAnnotation(_) => CacheEventKind::UpdatedAnnotation,
            CacheEvent::RemovedAnnotation(_) => CacheEventKind::RemovedAnnotation,
            CacheEvent::AddedList(_) => CacheEventKind::AddedList,
            CacheEvent::UpdatedList(_) => CacheEventKind::UpdatedList,
            CacheEvent::RemovedList(_) => CacheEventKind::RemovedList,
        }
    }

    /// State events are the ones a subscriber can fully resync from.
    pub fn is_state_event(&self) -> bool {
        matches!(
            self,
            CacheEvent::NewListsState(_) | CacheEvent::NewAnnotationsState(_)
        )
    }
}

impl Display for CacheEventKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            CacheEventKind::UpdatedPageUrl => "updatedPageUrl",
            CacheEventKind::UpdatedPageData => "updatedPageData",
            CacheEventKind::NewListsState => "newListsState",
            CacheEventKind::NewAnnotationsState => "newAnnotationsState",
            CacheEventKind::AddedAnnotation => "addedAnnotation",
            CacheEventKind::UpdatedAnnotation => "updatedAnnotation",
            CacheEventKind::RemovedAnnotation => "removedAnnotation",
            CacheEventKind::AddedList => "addedList",
            CacheEventKind::UpdatedList => "updatedList",
            CacheEventKind::RemovedList => "removedList",
        };
        write!(f, "{name}")
    }
}

impl Display for CacheEvent {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            CacheEvent::UpdatedPageUrl(url) => write!(f, "{}({url})", self.kind()),
            CacheEvent::UpdatedPageData(url, list_ids) => {
                write!(f, "{}({url}: {} lists)", self.kind(), list_ids.len())
            }
            CacheEvent::NewListsState(state) => write!(f, "{}({} lists)", self.kind(), state.len()),
            CacheEvent::NewAnnotationsState(state) => {
                write!(f, "{}({} annotations)", self.kind(), state.len())
            }
            CacheEvent::AddedAnnotation(annotation)
            | CacheEvent::UpdatedAnnotation(annotation)
            | CacheEvent::RemovedAnnotation(annotation) => {
                write!(f, "{}({})", self.kind(), annotation.unified_id)
            }
            CacheEvent::AddedList(list)
            | CacheEvent::UpdatedList(list)
            | CacheEvent::RemovedList(list) => write!(f, "{}({})", self.kind(), list.unified_id),
        }
    }
}

/// The seam the cache writes its events to. Implementations must deliver synchronously, in
/// emission order.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: &CacheEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Default in-process [EventEmitter]: an observer list with synchronous dispatch.
///
/// Subscribers registered while an event is being delivered start receiving from the next event.
#[derive(Default)]
pub struct EventChannel {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback)>>,
    senders: Mutex<Vec<UnboundedSender<CacheEvent>>>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("callbacks", &self.callbacks.lock().len())
            .field("senders", &self.senders.lock().len())
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        EventChannel::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false when `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(other, _)| *other != id);
        callbacks.len() != before
    }

    /// Receive events over an unbounded channel, for consumers living in an async task. Dropping
    /// the receiver ends the subscription.
    pub fn subscribe_channel(&self) -> UnboundedReceiver<CacheEvent> {
        let (tx, rx) = unbounded_channel();
        self.senders.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.callbacks.lock().len() + self.senders.lock().len()
    }
}

impl EventEmitter for EventChannel {
    fn emit(&self, event: &CacheEvent) {
        // Snapshot under the lock, dispatch outside it, so callbacks may (un)subscribe.
        let callbacks: Vec<Callback> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }

        self.senders.lock().retain(|tx| match tx.send(event.clone()) {
            Ok(()) => true,
            Err(e) => {
                let err = CacheError::from(e);
                tracing::debug!("[EventChannel::emit] dropping closed channel subscriber: {err}");
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callbacks_receive_events_in_order() {
        let channel = EventChannel::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.subscribe(move |event| sink.lock().push(event.kind()));

        channel.emit(&CacheEvent::UpdatedPageUrl("a.com".to_string()));
        channel.emit(&CacheEvent::NewAnnotationsState(Arc::default()));

        assert_eq!(
            *seen.lock(),
            vec![
                CacheEventKind::UpdatedPageUrl,
                CacheEventKind::NewAnnotationsState
            ]
        );
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let channel = EventChannel::new();
        let count = Arc::new(AtomicU64::new(0));
        let counter = count.clone();
        let id = channel.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        channel.emit(&CacheEvent::NewListsState(Arc::default()));
        assert!(channel.unsubscribe(id));
        assert!(!channel.unsubscribe(id));
        channel.emit(&CacheEvent::NewListsState(Arc::default()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn subscribing_from_a_callback_does_not_deadlock() {
        let channel = Arc::new(EventChannel::new());
        let inner = channel.clone();
        channel.subscribe(move |_| {
            inner.subscribe(|_| {});
        });
        channel.emit(&CacheEvent::UpdatedPageUrl("a.com".to_string()));
        assert_eq!(channel.subscriber_count(), 2);
    }

    #[test]
    fn channel_subscribers_are_pruned_once_closed() {
        let channel = EventChannel::new();
        let mut rx = channel.subscribe_channel();
        channel.emit(&CacheEvent::UpdatedPageUrl("a.com".to_string()));
        assert_eq!(
            rx.try_recv().map(|event| event.kind()),
            Ok(CacheEventKind::UpdatedPageUrl)
        );

        drop(rx);
        channel.emit(&CacheEvent::UpdatedPageUrl("b.com".to_string()));
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn display_uses_event_names() {
        let event = CacheEvent::UpdatedPageUrl("a.com".to_string());
        assert_eq!(event.to_string(), "updatedPageUrl(a.com)");
        let page_data = CacheEvent::UpdatedPageData("a.com".to_string(), vec!["0".to_string()]);
        assert_eq!(page_data.to_string(), "updatedPageData(a.com: 1 lists)");
        assert!(!page_data.is_state_event());
        assert!(CacheEvent::NewListsState(Arc::default()).is_state_event());
        assert!(!event.is_state_event());
    }
}
