//! Named publish/subscribe channel between modules.
//!
//! # Responsibility
//! - Keep per-event subscriber lists in registration order.
//! - Deliver events synchronously and isolate handler faults.
//!
//! # Invariants
//! - `emit` never panics because of a handler; failed handlers are logged.
//! - Handlers run outside the internal lock, so they may call `on`/`off`.
//! - A handler subscribed during `emit` is not invoked by that same `emit`.
//! - Handlers that need the bus capture a [`WeakEventBus`]; a strong clone
//!   stored inside its own subscriber table would never be freed.

use crate::logging::describe_panic_payload;
use log::{debug, error};
use std::collections::BTreeMap;
use std::fmt::{self, Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Shared event handler. Identity (`Arc::ptr_eq`) is what `off` matches on.
pub type EventHandler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Subscriber<P> {
    token: u64,
    handler: EventHandler<P>,
}

struct BusState<P> {
    topics: BTreeMap<String, Vec<Subscriber<P>>>,
    next_token: u64,
}

impl<P> BusState<P> {
    fn remove_where(
        &mut self,
        event_name: &str,
        predicate: impl Fn(&Subscriber<P>) -> bool,
    ) -> usize {
        let Some(subscribers) = self.topics.get_mut(event_name) else {
            return 0;
        };
        let before = subscribers.len();
        subscribers.retain(|subscriber| !predicate(subscriber));
        let removed = before - subscribers.len();
        if subscribers.is_empty() {
            self.topics.remove(event_name);
        }
        removed
    }
}

fn lock_state<P>(state: &Mutex<BusState<P>>) -> MutexGuard<'_, BusState<P>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Delivery summary for one `emit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitReport {
    /// Handlers that returned normally.
    pub delivered: usize,
    /// Handlers that panicked.
    pub failed: usize,
}

/// Process-local event bus. Clones share the same subscriber table.
pub struct EventBus<P> {
    state: Arc<Mutex<BusState<P>>>,
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                topics: BTreeMap::new(),
                next_token: 0,
            })),
        }
    }
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P> Debug for EventBus<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = lock_state(&self.state);
        let topics: BTreeMap<&str, usize> = state
            .topics
            .iter()
            .map(|(name, subscribers)| (name.as_str(), subscribers.len()))
            .collect();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the subscribers of `event_name`.
    ///
    /// The returned handle removes exactly this subscription. Dropping it
    /// leaves the subscription in place.
    pub fn on(&self, event_name: impl Into<String>, handler: EventHandler<P>) -> Subscription<P> {
        let event_name = event_name.into();
        let mut state = lock_state(&self.state);
        let token = state.next_token;
        state.next_token += 1;
        state
            .topics
            .entry(event_name.clone())
            .or_default()
            .push(Subscriber { token, handler });
        debug!(
            "event=bus_subscribe module=event_bus status=ok name={} token={}",
            event_name, token
        );

        Subscription {
            state: Arc::downgrade(&self.state),
            event_name,
            token,
        }
    }

    /// Closure form of [`EventBus::on`].
    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F) -> Subscription<P>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        self.on(event_name, Arc::new(handler))
    }

    /// Removes every subscription of `event_name` whose handler is `handler`.
    ///
    /// Returns `false` when nothing matched.
    pub fn off(&self, event_name: &str, handler: &EventHandler<P>) -> bool {
        let removed = lock_state(&self.state).remove_where(event_name, |subscriber| {
            Arc::ptr_eq(&subscriber.handler, handler)
        });
        if removed > 0 {
            debug!(
                "event=bus_unsubscribe module=event_bus status=ok name={} removed={}",
                event_name, removed
            );
        }
        removed > 0
    }

    /// Invokes current subscribers of `event_name` in registration order.
    pub fn emit(&self, event_name: &str, data: &P) -> EmitReport {
        let handlers: Vec<EventHandler<P>> = lock_state(&self.state)
            .topics
            .get(event_name)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|subscriber| Arc::clone(&subscriber.handler))
                    .collect()
            })
            .unwrap_or_default();

        let mut report = EmitReport::default();
        for (index, handler) in handlers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| handler(data))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    report.failed += 1;
                    error!(
                        "event=bus_emit module=event_bus status=error name={} subscriber_index={} panic={}",
                        event_name,
                        index,
                        describe_panic_payload(&*payload)
                    );
                }
            }
        }

        debug!(
            "event=bus_emit module=event_bus status=ok name={} delivered={} failed={}",
            event_name, report.delivered, report.failed
        );
        report
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        lock_state(&self.state)
            .topics
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Drops all subscribers of `event_name`, returning how many were removed.
    pub fn clear(&self, event_name: &str) -> usize {
        lock_state(&self.state).remove_where(event_name, |_| true)
    }

    /// Non-owning handle for use inside handlers.
    pub fn downgrade(&self) -> WeakEventBus<P> {
        WeakEventBus {
            state: Arc::downgrade(&self.state),
        }
    }
}

/// Bus handle that does not keep the subscriber table alive.
pub struct WeakEventBus<P> {
    state: Weak<Mutex<BusState<P>>>,
}

impl<P> Clone for WeakEventBus<P> {
    fn clone(&self) -> Self {
        Self {
            state: Weak::clone(&self.state),
        }
    }
}

impl<P> Debug for WeakEventBus<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakEventBus")
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

impl<P> WeakEventBus<P> {
    /// Returns the bus while at least one `EventBus` clone is alive.
    pub fn upgrade(&self) -> Option<EventBus<P>> {
        self.state.upgrade().map(|state| EventBus { state })
    }
}

/// Disposer for one subscription.
pub struct Subscription<P> {
    state: Weak<Mutex<BusState<P>>>,
    event_name: String,
    token: u64,
}

impl<P> Debug for Subscription<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event_name", &self.event_name)
            .field("token", &self.token)
            .finish()
    }
}

impl<P> Subscription<P> {
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Returns whether the subscription is still registered on a live bus.
    pub fn is_active(&self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let state = lock_state(&state);
        state
            .topics
            .get(&self.event_name)
            .is_some_and(|subscribers| subscribers.iter().any(|s| s.token == self.token))
    }

    /// Removes this subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };
        let removed = lock_state(&state)
            .remove_where(&self.event_name, |subscriber| subscriber.token == self.token);
        removed > 0
    }
}
