//! Ephemeral subscriber registry and notification fan-out.
//!
//! Callbacks run synchronously on the publishing thread, in registration
//! order. A callback that returns an error or panics is logged and skipped;
//! delivery to the rest of the registry continues.
//!
//! Removal is strict: once [`SubscriberRegistry::unsubscribe`] returns, the
//! callback is never invoked again, and calls already running on other
//! threads have finished. The exception is an `unsubscribe` issued from
//! inside a callback: it stops new invocations but does not wait for calls
//! in flight elsewhere, so callbacks may unsubscribe themselves or each
//! other across threads without deadlocking.

use std::cell::Cell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, LockResult, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, warn};

use factbus_types::{EventCategory, EventEnvelope, SubscriptionId};

/// Failure reported by a subscriber callback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriberError {
    /// The callback could not handle the envelope.
    #[error("subscriber failed: {0}")]
    Failed(String),

    /// The consumer behind the callback has gone away.
    #[error("subscriber disconnected")]
    Disconnected,
}

/// Signature of a subscriber callback.
pub type Callback = dyn Fn(&EventEnvelope) -> Result<(), SubscriberError> + Send + Sync;

/// Restricts which envelopes a subscription receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// Deliver only envelopes of this trace.
    pub trace_id: Option<String>,
    /// Deliver only envelopes of this category.
    pub category: Option<EventCategory>,
}

impl SubscriptionFilter {
    /// Whether `envelope` passes the filter.
    pub fn matches(&self, envelope: &EventEnvelope) -> bool {
        self.trace_id.as_ref().is_none_or(|t| *t == envelope.trace_id)
            && self.category.is_none_or(|c| c == envelope.event_category)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

thread_local! {
    /// Callbacks currently running on this thread.
    static DELIVERING: Cell<usize> = const { Cell::new(0) };
}

fn inside_callback() -> bool {
    DELIVERING.with(|depth| depth.get() > 0)
}

#[derive(Debug)]
struct Gate {
    open: bool,
    /// Calls currently inside the callback.
    active: usize,
}

struct Subscription {
    id: SubscriptionId,
    filter: SubscriptionFilter,
    callback: Box<Callback>,
    gate: Mutex<Gate>,
    idle: Condvar,
}

fn relock<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl Subscription {
    /// Register a call; `false` once closed.
    fn enter(&self) -> bool {
        let mut gate = relock(self.gate.lock());
        if gate.open {
            gate.active = gate.active.saturating_add(1);
            DELIVERING.with(|depth| depth.set(depth.get().saturating_add(1)));
        }
        gate.open
    }

    fn leave(&self) {
        DELIVERING.with(|depth| depth.set(depth.get().saturating_sub(1)));
        let mut gate = relock(self.gate.lock());
        gate.active = gate.active.saturating_sub(1);
        drop(gate);
        self.idle.notify_all();
    }

    /// Close the gate. Outside a callback, also wait for running calls.
    fn close(&self) {
        let mut gate = relock(self.gate.lock());
        gate.open = false;
        if inside_callback() {
            return;
        }
        while gate.active > 0 {
            gate = relock(self.idle.wait(gate));
        }
    }

    fn deliver(&self, envelope: &EventEnvelope) {
        if !self.filter.matches(envelope) || !self.enter() {
            return;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| (self.callback)(envelope)));
        self.leave();

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                subscription_id = %self.id,
                event_id = %envelope.event_id,
                error = %err,
                "subscriber callback failed"
            ),
            Err(_) => warn!(
                subscription_id = %self.id,
                event_id = %envelope.event_id,
                "subscriber callback panicked"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Live subscriptions in registration order.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
}

impl core::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub const fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
        }
    }

    /// Register `callback` for envelopes passing `filter`.
    pub fn subscribe<F>(&self, filter: SubscriptionFilter, callback: F) -> SubscriptionId
    where
        F: Fn(&EventEnvelope) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let subscription = Arc::new(Subscription {
            id,
            filter,
            callback: Box::new(callback),
            gate: Mutex::new(Gate {
                open: true,
                active: 0,
            }),
            idle: Condvar::new(),
        });
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.push(subscription);
        debug!(subscription_id = %id, total = subscriptions.len(), "subscriber registered");
        id
    }

    /// Remove a subscription. Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut subscriptions = self
                .subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            subscriptions
                .iter()
                .position(|s| s.id == id)
                .map(|pos| subscriptions.remove(pos))
        };

        let Some(subscription) = removed else {
            return false;
        };
        subscription.close();
        debug!(subscription_id = %id, "subscriber removed");
        true
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no subscription is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `envelope` to every subscription registered at call time.
    pub fn notify(&self, envelope: &EventEnvelope) {
        let snapshot: Vec<Arc<Subscription>> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscription in &snapshot {
            subscription.deliver(envelope);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, OnceLock};
    use std::thread;

    use factbus_types::{EnvelopeBuilder, ProducerType};

    use super::*;

    fn envelope(category: EventCategory, trace: &str) -> EventEnvelope {
        EnvelopeBuilder::new(category, "Seen")
            .producer(ProducerType::Sensor, "s", "v1")
            .subject("order", "ORD-1")
            .trace_id(trace)
            .build()
    }

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Fn(&EventEnvelope) -> Result<(), SubscriberError> + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |_| {
            log.lock().unwrap().push(name);
            Ok(())
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe(SubscriptionFilter::default(), recorder(&log, "a"));
        registry.subscribe(SubscriptionFilter::default(), recorder(&log, "b"));

        registry.notify(&envelope(EventCategory::Fact, "t"));
        assert_eq!(*log.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn failing_and_panicking_callbacks_do_not_stop_delivery() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        registry.subscribe(
            SubscriptionFilter::default(),
            |_| Err(SubscriberError::Failed("nope".to_owned())),
        );
        registry.subscribe(SubscriptionFilter::default(), |_| panic!("boom"));
        registry.subscribe(SubscriptionFilter::default(), recorder(&log, "last"));

        registry.notify(&envelope(EventCategory::Fact, "t"));
        assert_eq!(*log.lock().unwrap(), ["last"]);
    }

    #[test]
    fn unsubscribed_callback_is_not_called() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = registry.subscribe(SubscriptionFilter::default(), recorder(&log, "a"));

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());

        registry.notify(&envelope(EventCategory::Fact, "t"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn filter_restricts_delivery() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.subscribe(
            SubscriptionFilter {
                trace_id: Some("t-1".to_owned()),
                category: Some(EventCategory::Decision),
            },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        registry.notify(&envelope(EventCategory::Decision, "t-1"));
        registry.notify(&envelope(EventCategory::Fact, "t-1"));
        registry.notify(&envelope(EventCategory::Decision, "t-2"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let registry = Arc::new(SubscriberRegistry::new());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let hits = Arc::new(AtomicUsize::new(0));

        let reg = Arc::clone(&registry);
        let own = Arc::clone(&slot);
        let counter = Arc::clone(&hits);
        let id = registry.subscribe(
            SubscriptionFilter::default(),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *own.lock().unwrap() {
                    reg.unsubscribe(id);
                }
                Ok(())
            },
        );
        *slot.lock().unwrap() = Some(id);

        registry.notify(&envelope(EventCategory::Fact, "t"));
        registry.notify(&envelope(EventCategory::Fact, "t"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn concurrent_unsubscribe_during_fan_out() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = registry.subscribe(
            SubscriptionFilter::default(),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );

        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..100 {
                    registry.notify(&envelope(EventCategory::Fact, "t"));
                }
            });
            s.spawn(|| {
                registry.unsubscribe(id);
            });
        });

        let after_removal = hits.load(Ordering::SeqCst);
        registry.notify(&envelope(EventCategory::Fact, "t"));
        assert_eq!(hits.load(Ordering::SeqCst), after_removal);
    }

    #[test]
    fn callbacks_on_two_threads_may_unsubscribe_each_other() {
        let registry = Arc::new(SubscriberRegistry::new());
        let both_inside = Arc::new(Barrier::new(2));
        let first: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());
        let second: Arc<OnceLock<SubscriptionId>> = Arc::new(OnceLock::new());

        let cross = |trace: &str, other: &Arc<OnceLock<SubscriptionId>>| {
            let reg = Arc::clone(&registry);
            let barrier = Arc::clone(&both_inside);
            let other = Arc::clone(other);
            let filter = SubscriptionFilter {
                trace_id: Some(trace.to_owned()),
                category: None,
            };
            let callback = move |_: &EventEnvelope| -> Result<(), SubscriberError> {
                barrier.wait();
                if let Some(id) = other.get() {
                    reg.unsubscribe(*id);
                }
                Ok(())
            };
            (filter, callback)
        };

        let (filter, callback) = cross("a", &second);
        first.set(registry.subscribe(filter, callback)).unwrap();
        let (filter, callback) = cross("b", &first);
        second.set(registry.subscribe(filter, callback)).unwrap();

        thread::scope(|s| {
            s.spawn(|| registry.notify(&envelope(EventCategory::Fact, "a")));
            s.spawn(|| registry.notify(&envelope(EventCategory::Fact, "b")));
        });
        assert!(registry.is_empty());
    }
}
