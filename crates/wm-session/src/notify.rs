use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;
use wm_types::{ChainFamily, MaybeSendSync, SessionSnapshot, WalletAddress};

use crate::config::Hooks;

#[cfg(not(target_arch = "wasm32"))]
type Listener = Arc<dyn Fn(&SessionSnapshot) + Send + Sync>;
#[cfg(target_arch = "wasm32")]
type Listener = Arc<dyn Fn(&SessionSnapshot)>;

/// Handle returned by [`Session::subscribe`](crate::Session::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl From<SubscriptionId> for u64 {
    fn from(id: SubscriptionId) -> Self {
        id.0
    }
}

impl From<u64> for SubscriptionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

#[derive(Debug)]
pub(crate) enum Event {
    Changed(SessionSnapshot),
    Connected(WalletAddress, ChainFamily),
    Disconnected,
    Error(String),
}

#[derive(Default)]
struct Queue {
    events: VecDeque<Event>,
    draining: bool,
}

/// Ordered fan-out of session events.
///
/// Events are queued while the session state lock is held, so queue order is
/// commit order. Delivery happens in [`Notifier::flush`] after that lock is
/// released; exactly one caller drains at a time.
pub(crate) struct Notifier {
    hooks: Hooks,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
    queue: Mutex<Queue>,
}

fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A panicking listener or hook must not wedge the drain loop.
fn guarded(what: &str, call: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        warn!("session {} panicked; notification dropped", what);
    }
}

impl Notifier {
    pub(crate) fn new(hooks: Hooks) -> Self {
        Self {
            hooks,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue: Mutex::new(Queue::default()),
        }
    }

    pub(crate) fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionSnapshot) + MaybeSendSync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        relock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = relock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub(crate) fn enqueue(&self, event: Event) {
        relock(&self.queue).events.push_back(event);
    }

    pub(crate) fn flush(&self) {
        {
            let mut queue = relock(&self.queue);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = relock(&self.queue);
                match queue.events.pop_front() {
                    Some(event) => event,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };
            self.deliver(next);
        }
    }

    fn deliver(&self, event: Event) {
        match event {
            Event::Changed(snapshot) => {
                let listeners: Vec<Listener> = relock(&self.listeners)
                    .iter()
                    .map(|(_, listener)| Arc::clone(listener))
                    .collect();
                for listener in listeners {
                    guarded("listener", || listener(&snapshot));
                }
            }
            Event::Connected(address, family) => {
                if let Some(hook) = &self.hooks.on_connect {
                    guarded("on_connect hook", || hook(&address, &family));
                }
            }
            Event::Disconnected => {
                if let Some(hook) = &self.hooks.on_disconnect {
                    guarded("on_disconnect hook", || hook());
                }
            }
            Event::Error(message) => {
                if let Some(hook) = &self.hooks.on_error {
                    guarded("on_error hook", || hook(&message));
                }
            }
        }
    }
}
