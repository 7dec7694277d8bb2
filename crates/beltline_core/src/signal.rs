//! # Lifecycle Signals
//!
//! Typed publish/subscribe bus the world uses to announce entity lifecycle
//! changes to the filtered registries.
//!
//! ```text
//! ┌─────────┐ publish  ┌───────────┐  channel  ┌──────────────────┐
//! │  World  │─────────>│ SignalBus │──────────>│ SignalSubscription│ (registry A)
//! └─────────┘          └───────────┘──────────>│ SignalSubscription│ (registry B)
//!                                              └──────────────────┘
//! ```
//!
//! Delivery is buffered: subscribers drain their channel when they are
//! pumped, so a signal is processed against the world state at pump time.
//! Dropping a subscription unsubscribes it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender, TryIter};
use parking_lot::Mutex;

use crate::ecs::{ComponentKind, EntityId};

/// Lifecycle signals consumed by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// A new entity was spawned with its initial components.
    EntityAdded(EntityId),
    /// A component was attached to an existing entity.
    EntityComponentAdded(EntityId, ComponentKind),
    /// A component was detached from an entity.
    EntityComponentRemoved(EntityId, ComponentKind),
    /// Destruction was requested; the slot is freed on the next flush.
    EntityQueuedForDestroy(EntityId),
    /// The world finished loading.
    PostLoadHook,
    /// The outermost bulk operation ended.
    BulkOperationFinished,
    /// A new simulation frame started.
    FrameStarted(u64),
}

struct BusInner {
    subscribers: Mutex<Vec<(u64, Sender<Signal>)>>,
    next_id: AtomicU64,
}

/// Signal dispatcher. Cloning shares the same subscriber list.
#[derive(Clone)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

impl SignalBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Registers a new subscriber.
    ///
    /// The subscriber only sees signals published after this call.
    #[must_use]
    pub fn subscribe(&self) -> SignalSubscription {
        let (sender, receiver) = unbounded();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, sender));
        SignalSubscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Delivers a signal to every subscriber.
    ///
    /// Subscribers whose receiving end is gone are dropped.
    pub fn publish(&self, signal: Signal) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|(_, sender)| sender.send(signal).is_ok());
        tracing::trace!(?signal, subscribers = subscribers.len(), "signal published");
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SignalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Receiving end of a bus subscription.
pub struct SignalSubscription {
    id: u64,
    receiver: Receiver<Signal>,
    bus: Weak<BusInner>,
}

impl SignalSubscription {
    /// Takes the next pending signal, if any.
    #[inline]
    #[must_use]
    pub fn try_next(&self) -> Option<Signal> {
        self.receiver.try_recv().ok()
    }

    /// Drains all pending signals without blocking.
    pub fn drain(&self) -> TryIter<'_, Signal> {
        self.receiver.try_iter()
    }

    /// Number of signals waiting to be drained.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for SignalSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalSubscription")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .finish()
    }
}
