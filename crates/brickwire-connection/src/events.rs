//! Bounded event queues.
//!
//! The receive loop must never block on a slow consumer, so queues evict the
//! oldest item when full instead of applying backpressure.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::SystemTime;

use serde::Serialize;
use tokio::sync::Notify;

/// A bounded multi-producer multi-consumer queue with drop-oldest overflow.
#[derive(Debug)]
pub struct EventQueue<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
    capacity: usize,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> Clone for EventQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> EventQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                notify: Notify::new(),
                capacity,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an item, evicting the oldest one if the queue is full.
    ///
    /// Returns the evicted item. A closed queue rejects the push and hands
    /// `item` back.
    pub fn push(&self, item: T) -> Option<T> {
        let evicted = {
            let mut state = self.state();
            if state.closed {
                return Some(item);
            }
            let evicted = if state.items.len() >= self.shared.capacity {
                state.items.pop_front()
            } else {
                None
            };
            state.items.push_back(item);
            evicted
        };
        self.shared.notify.notify_one();
        evicted
    }

    /// Wait for the next item.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state();
                if let Some(item) = state.items.pop_front() {
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    pub fn try_recv(&self) -> Option<T> {
        self.state().items.pop_front()
    }

    /// Remove and return everything currently queued.
    pub fn drain(&self) -> Vec<T> {
        self.state().items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Stop accepting items. Queued items can still be received.
    pub fn close(&self) {
        self.state().closed = true;
        self.shared.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

/// A decoded device event as delivered to consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub timestamp: SystemTime,
    pub uid: u32,
    pub device_identifier: u16,
    pub event_kind: u8,
    pub value: serde_json::Value,
}

/// Per-device mapping from event kind to destination queue.
///
/// Kinds without a destination are decoded and discarded.
#[derive(Debug, Default)]
pub struct EventDestinations {
    queues: RwLock<HashMap<u8, EventQueue<EventRecord>>>,
}

impl EventDestinations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `event_kind` to `queue`, or stop routing it with `None`.
    ///
    /// Returns the previously registered queue.
    pub fn set(
        &self,
        event_kind: u8,
        queue: Option<EventQueue<EventRecord>>,
    ) -> Option<EventQueue<EventRecord>> {
        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        match queue {
            Some(queue) => queues.insert(event_kind, queue),
            None => queues.remove(&event_kind),
        }
    }

    pub fn get(&self, event_kind: u8) -> Option<EventQueue<EventRecord>> {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event_kind)
            .cloned()
    }
}
