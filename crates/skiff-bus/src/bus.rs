//! Buffered topic bus.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{error, trace};

/// Default number of payloads retained per topic.
pub const DEFAULT_REPLAY_DEPTH: usize = 32;

/// Subscriber callback.
pub type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callback that sees every topic of a bus.
pub type Observer<T> = Arc<dyn Fn(&str, &T) + Send + Sync>;

/// Identity of one subscription, unique per bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// How a subscription behaves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Deliver buffered payloads immediately if the topic already fired.
    pub replay: bool,
    /// Remove the subscription after the first delivery.
    pub once: bool,
}

impl SubscribeOptions {
    /// Live payloads only, until unsubscribed.
    pub fn live() -> Self {
        Self::default()
    }

    /// Buffered payloads first, then live ones.
    pub fn replay() -> Self {
        Self {
            replay: true,
            once: false,
        }
    }

    /// Make the subscription one-shot.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

struct Subscriber<T> {
    id: SubscriptionId,
    once: bool,
    handler: Handler<T>,
}

struct Topic<T> {
    history: VecDeque<T>,
    subscribers: Vec<Subscriber<T>>,
}

impl<T> Default for Topic<T> {
    fn default() -> Self {
        Self {
            history: VecDeque::new(),
            subscribers: Vec::new(),
        }
    }
}

struct BusInner<T> {
    topics: Mutex<HashMap<String, Topic<T>>>,
    replay_depth: usize,
    next_id: AtomicU64,
    publish_count: AtomicU64,
    /// Buses this one was merged from; publishing here publishes there too.
    upstream: Vec<EventBus<T>>,
    /// Merged buses fed by this one.
    downstream: Mutex<Vec<Weak<BusInner<T>>>>,
    observers: Mutex<Vec<Observer<T>>>,
}

/// Topic-keyed publish/subscribe bus. Cloning shares the same bus.
pub struct EventBus<T> {
    inner: Arc<BusInner<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Create a bus with the default replay depth.
    pub fn new() -> Self {
        Self::with_replay_depth(DEFAULT_REPLAY_DEPTH)
    }

    /// Create a bus retaining the last `depth` payloads per topic.
    pub fn with_replay_depth(depth: usize) -> Self {
        Self::build(depth, Vec::new())
    }

    fn build(replay_depth: usize, upstream: Vec<EventBus<T>>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                topics: Mutex::new(HashMap::new()),
                replay_depth,
                next_id: AtomicU64::new(1),
                publish_count: AtomicU64::new(0),
                upstream,
                downstream: Mutex::new(Vec::new()),
                observers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Build a bus fed by every input.
    ///
    /// Anything published on an input is also delivered to the merged bus's
    /// subscribers; publishing on the merged bus reaches every input's
    /// subscribers.
    pub fn merge(buses: &[EventBus<T>]) -> Self {
        let depth = buses
            .iter()
            .map(|b| b.inner.replay_depth)
            .max()
            .unwrap_or(DEFAULT_REPLAY_DEPTH);
        let merged = Self::build(depth, buses.to_vec());
        for bus in buses {
            bus.inner.downstream.lock().push(Arc::downgrade(&merged.inner));
        }
        merged
    }

    /// Subscribe `handler` to `topic`.
    ///
    /// With `replay`, a persistent subscription first receives every buffered
    /// payload; a `once` subscription receives only the latest and is never
    /// registered when that replay satisfies it.
    pub fn subscribe<F>(&self, topic: &str, options: SubscribeOptions, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_arc(topic, options, Arc::new(handler))
    }

    /// [`subscribe`](Self::subscribe) with a shared handler.
    pub fn subscribe_arc(
        &self,
        topic: &str,
        options: SubscribeOptions,
        handler: Handler<T>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let replayed: Vec<T> = {
            let mut topics = self.inner.topics.lock();
            let entry = topics.entry(topic.to_owned()).or_default();
            let buffered: Vec<T> = if !options.replay {
                Vec::new()
            } else if options.once {
                entry.history.back().cloned().into_iter().collect()
            } else {
                entry.history.iter().cloned().collect()
            };
            if !(options.once && !buffered.is_empty()) {
                entry.subscribers.push(Subscriber {
                    id,
                    once: options.once,
                    handler: Arc::clone(&handler),
                });
            }
            buffered
        };

        for payload in &replayed {
            trace!(topic, "replaying buffered payload");
            invoke(topic, &handler, payload);
        }
        id
    }

    /// Observe every payload published on any topic, after topic handlers.
    ///
    /// Observers cannot be removed and never receive replays.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&str, &T) + Send + Sync + 'static,
    {
        self.inner.observers.lock().push(Arc::new(observer));
    }

    /// Remove a subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut topics = self.inner.topics.lock();
        let Some(entry) = topics.get_mut(topic) else {
            return false;
        };
        let before = entry.subscribers.len();
        entry.subscribers.retain(|s| s.id != id);
        before != entry.subscribers.len()
    }

    /// Receive the next payload on `topic` through a oneshot channel.
    ///
    /// With `replay`, an already-fired topic resolves immediately with its
    /// latest payload.
    pub fn next(&self, topic: &str, replay: bool) -> (SubscriptionId, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let options = SubscribeOptions { replay, once: true };
        let id = self.subscribe(topic, options, move |payload: &T| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(payload.clone());
            }
        });
        (id, rx)
    }

    /// Publish `payload` on `topic`.
    ///
    /// Returns the number of handlers invoked on this bus and any bus it feeds.
    pub fn publish(&self, topic: &str, payload: T) -> usize {
        let _ = self.inner.publish_count.fetch_add(1, Ordering::Relaxed);
        let mut delivered = 0;
        for bus in &self.inner.upstream {
            delivered += deliver(&bus.inner, topic, &payload);
        }
        delivered + fan_out(&self.inner, topic, &payload)
    }

    /// Payloads currently buffered on `topic`, oldest first.
    pub fn history(&self, topic: &str) -> Vec<T> {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(|t| t.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether `topic` has fired and still has a buffered payload.
    pub fn has_fired(&self, topic: &str) -> bool {
        self.inner
            .topics
            .lock()
            .get(topic)
            .is_some_and(|t| !t.history.is_empty())
    }

    /// Drop a topic with its history and subscribers.
    pub fn forget(&self, topic: &str) {
        let _ = self.inner.topics.lock().remove(topic);
    }

    /// Number of live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map_or(0, |t| t.subscribers.len())
    }

    /// Total number of `publish` calls on this bus.
    pub fn publish_count(&self) -> u64 {
        self.inner.publish_count.load(Ordering::Relaxed)
    }

    /// Configured per-topic replay depth.
    pub fn replay_depth(&self) -> usize {
        self.inner.replay_depth
    }
}

/// Deliver locally, then to every merged bus this one feeds.
fn fan_out<T: Clone + Send + Sync + 'static>(inner: &Arc<BusInner<T>>, topic: &str, payload: &T) -> usize {
    let mut delivered = deliver(inner, topic, payload);
    let downstream: Vec<Arc<BusInner<T>>> = {
        let mut links = inner.downstream.lock();
        links.retain(|w| w.strong_count() > 0);
        links.iter().filter_map(Weak::upgrade).collect()
    };
    for merged in &downstream {
        delivered += fan_out(merged, topic, payload);
    }
    delivered
}

/// Record `payload` and run the topic's handlers on this bus only.
fn deliver<T: Clone + Send + Sync + 'static>(inner: &BusInner<T>, topic: &str, payload: &T) -> usize {
    let handlers: Vec<Handler<T>> = {
        let mut topics = inner.topics.lock();
        let entry = topics.entry(topic.to_owned()).or_default();
        if inner.replay_depth > 0 {
            if entry.history.len() == inner.replay_depth {
                let _ = entry.history.pop_front();
            }
            entry.history.push_back(payload.clone());
        }
        let handlers = entry
            .subscribers
            .iter()
            .map(|s| Arc::clone(&s.handler))
            .collect();
        entry.subscribers.retain(|s| !s.once);
        handlers
    };

    for handler in &handlers {
        invoke(topic, handler, payload);
    }

    let observers: Vec<Observer<T>> = inner.observers.lock().clone();
    for observer in &observers {
        if catch_unwind(AssertUnwindSafe(|| observer(topic, payload))).is_err() {
            error!(topic, "bus observer panicked");
        }
    }
    handlers.len()
}

fn invoke<T>(topic: &str, handler: &Handler<T>, payload: &T) {
    if catch_unwind(AssertUnwindSafe(|| handler(payload))).is_err() {
        error!(topic, "bus handler panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |v: &u32| sink.lock().push(*v))
    }

    #[test]
    fn live_subscriber_sees_publish_order() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        let _ = bus.subscribe("t", SubscribeOptions::live(), handler);
        let _ = bus.publish("t", 1);
        let _ = bus.publish("t", 2);
        let _ = bus.publish("other", 9);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn live_subscriber_misses_earlier_payloads() {
        let bus = EventBus::new();
        let _ = bus.publish("t", 1);
        let (seen, handler) = recorder();
        let _ = bus.subscribe("t", SubscribeOptions::live(), handler);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn replay_delivers_all_buffered_then_live() {
        let bus = EventBus::new();
        let _ = bus.publish("t", 1);
        let _ = bus.publish("t", 2);
        let (seen, handler) = recorder();
        let _ = bus.subscribe("t", SubscribeOptions::replay(), handler);
        let _ = bus.publish("t", 3);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn once_replay_gets_latest_only_and_is_not_registered() {
        let bus = EventBus::new();
        let _ = bus.publish("t", 1);
        let _ = bus.publish("t", 2);
        let (seen, handler) = recorder();
        let _ = bus.subscribe("t", SubscribeOptions::replay().once(), handler);
        let _ = bus.publish("t", 3);
        assert_eq!(*seen.lock(), vec![2]);
        assert_eq!(bus.subscriber_count("t"), 0);
    }

    #[test]
    fn once_without_history_fires_on_next_publish_only() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        let _ = bus.subscribe("t", SubscribeOptions::replay().once(), handler);
        assert_eq!(bus.subscriber_count("t"), 1);
        let _ = bus.publish("t", 7);
        let _ = bus.publish("t", 8);
        assert_eq!(*seen.lock(), vec![7]);
    }

    #[test]
    fn replay_depth_bounds_history() {
        let bus = EventBus::with_replay_depth(2);
        for v in 1..=5 {
            let _ = bus.publish("t", v);
        }
        assert_eq!(bus.history("t"), vec![4, 5]);
    }

    #[test]
    fn zero_depth_keeps_nothing() {
        let bus = EventBus::with_replay_depth(0);
        let _ = bus.publish("t", 1);
        assert!(!bus.has_fired("t"));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (seen, handler) = recorder();
        let id = bus.subscribe("t", SubscribeOptions::live(), handler);
        assert!(bus.unsubscribe("t", id));
        assert!(!bus.unsubscribe("t", id));
        let _ = bus.publish("t", 1);
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn panicking_handler_does_not_stop_others() {
        let bus = EventBus::new();
        let _ = bus.subscribe("t", SubscribeOptions::live(), |_: &u32| panic!("boom"));
        let (seen, handler) = recorder();
        let _ = bus.subscribe("t", SubscribeOptions::live(), handler);
        assert_eq!(bus.publish("t", 1), 2);
        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn handlers_may_publish_reentrantly() {
        let bus: EventBus<u32> = EventBus::new();
        let inner = bus.clone();
        let _ = bus.subscribe("a", SubscribeOptions::live(), move |v: &u32| {
            let _ = inner.publish("b", v + 1);
        });
        let (seen, handler) = recorder();
        let _ = bus.subscribe("b", SubscribeOptions::live(), handler);
        let _ = bus.publish("a", 1);
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn merged_bus_sees_inputs() {
        let a = EventBus::new();
        let b = EventBus::new();
        let merged = EventBus::merge(&[a.clone(), b.clone()]);
        let (seen, handler) = recorder();
        let _ = merged.subscribe("t", SubscribeOptions::live(), handler);
        let _ = a.publish("t", 1);
        let _ = b.publish("t", 2);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn publish_on_merged_reaches_inputs_once() {
        let a = EventBus::new();
        let b = EventBus::new();
        let merged = EventBus::merge(&[a.clone(), b.clone()]);
        let count = Arc::new(AtomicUsize::new(0));
        for bus in [&a, &b, &merged] {
            let count = Arc::clone(&count);
            let _ = bus.subscribe("t", SubscribeOptions::live(), move |_: &u32| {
                let _ = count.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(merged.publish("t", 1), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropped_merged_bus_is_unlinked() {
        let a: EventBus<u32> = EventBus::new();
        let merged = EventBus::merge(&[a.clone()]);
        drop(merged);
        assert_eq!(a.publish("t", 1), 0);
        assert!(a.inner.downstream.lock().is_empty());
    }

    #[test]
    fn observer_sees_all_topics_of_merged_inputs() {
        let a = EventBus::new();
        let b = EventBus::new();
        let merged = EventBus::merge(&[a.clone(), b.clone()]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        merged.observe(move |topic: &str, v: &u32| sink.lock().push(format!("{topic}={v}")));
        let _ = a.publish("x", 1);
        let _ = b.publish("y", 2);
        assert_eq!(*seen.lock(), vec!["x=1".to_string(), "y=2".to_string()]);
    }

    #[tokio::test]
    async fn next_resolves_on_publish() {
        let bus = EventBus::new();
        let (_, rx) = bus.next("t", false);
        let _ = bus.publish("t", 5_u32);
        assert_eq!(rx.await.unwrap(), 5);
    }

    #[tokio::test]
    async fn next_with_replay_resolves_immediately() {
        let bus = EventBus::new();
        let _ = bus.publish("t", 5_u32);
        let (_, rx) = bus.next("t", true);
        assert_eq!(rx.await.unwrap(), 5);
    }

    #[test]
    fn publish_count_increments() {
        let bus = EventBus::new();
        let _ = bus.publish("t", 1_u32);
        let _ = bus.publish("u", 1_u32);
        assert_eq!(bus.publish_count(), 2);
    }
}
