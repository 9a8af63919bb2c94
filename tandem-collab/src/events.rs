//! Typed, deferred event dispatch.
//!
//! Emitted events go through one FIFO queue per bus. The first emitter
//! drains it; an emission from inside a handler is appended and delivered
//! after the current event, never recursively.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An event with a discriminant handlers can subscribe to.
pub trait Event: Send + 'static {
    type Kind: Copy + Eq + fmt::Debug + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Subscription<E: Event> {
    id: SubscriptionId,
    /// `None` subscribes to every kind.
    kind: Option<E::Kind>,
    handler: Handler<E>,
}

struct Inner<E: Event> {
    subscriptions: Mutex<Vec<Subscription<E>>>,
    queue: Mutex<VecDeque<E>>,
    flushing: AtomicBool,
    next_id: AtomicU64,
}

/// Cloning yields another handle to the same bus.
pub struct EventBus<E: Event> {
    inner: Arc<Inner<E>>,
}

impl<E: Event> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &lock(&self.inner.subscriptions).len())
            .field("queued", &lock(&self.inner.queue).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscriptions: Mutex::new(Vec::new()),
                queue: Mutex::new(VecDeque::new()),
                flushing: AtomicBool::new(false),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Calls `handler` for every event of `kind`.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(Some(kind), Arc::new(handler))
    }

    /// Calls `handler` for every event.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = lock(&self.inner.subscriptions);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscriptions).len()
    }

    fn add(&self, kind: Option<E::Kind>, handler: Handler<E>) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.subscriptions).push(Subscription { id, kind, handler });
        id
    }

    /// Queues `event` and, unless a flush is already running, delivers
    /// everything queued in FIFO order.
    pub fn emit(&self, event: E) {
        self.enqueue(event);
        self.flush();
    }

    /// Queues `event` without delivering it.
    ///
    /// Callers that produce events under their own lock enqueue while
    /// holding it and [`flush`](Self::flush) after releasing it, so queue
    /// order matches the order of their critical sections.
    pub fn enqueue(&self, event: E) {
        lock(&self.inner.queue).push_back(event);
    }

    /// Delivers everything queued, unless another flush is running; that
    /// flush delivers it instead.
    pub fn flush(&self) {
        loop {
            if self.inner.flushing.swap(true, Ordering::AcqRel) {
                return;
            }
            while let Some(event) = self.pop() {
                self.dispatch(&event);
            }
            self.inner.flushing.store(false, Ordering::Release);

            // Another thread may have queued between the last pop and the release.
            if lock(&self.inner.queue).is_empty() {
                return;
            }
        }
    }

    fn pop(&self) -> Option<E> {
        lock(&self.inner.queue).pop_front()
    }

    fn dispatch(&self, event: &E) {
        let kind = event.kind();
        let handlers: Vec<Handler<E>> = lock(&self.inner.subscriptions)
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }
}
