//! Push subscription lifecycle.
//!
//! A conversation listens to three inbound events (`newMessage`, `typing`,
//! `stopTyping`) only while it is active. [`PushSubscriptionManager::acquire`]
//! binds them and returns a [`PushSubscription`] handle; releasing the handle,
//! explicitly or by dropping it, unbinds them again.
//!
//! The manager tracks which listener it holds for each event name, so it
//! never leaves two of its own listeners on the same name, and a stale handle
//! can only remove listeners it registered itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use swiftchat_types::{PushEventKind, UserId};

use crate::lock;
use crate::push::{ListenerId, PushChannel, PushHandler};

type Bindings = HashMap<PushEventKind, ListenerId>;

/// Binds conversation handlers on a shared push channel.
#[derive(Clone)]
pub struct PushSubscriptionManager {
    channel: Arc<dyn PushChannel>,
    bound: Arc<Mutex<Bindings>>,
}

impl std::fmt::Debug for PushSubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSubscriptionManager")
            .field("bound", &*lock(&self.bound))
            .finish()
    }
}

impl PushSubscriptionManager {
    /// Create a manager over `channel`.
    pub fn new(channel: Arc<dyn PushChannel>) -> Self {
        Self {
            channel,
            bound: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The channel listeners are bound on.
    pub fn channel(&self) -> &Arc<dyn PushChannel> {
        &self.channel
    }

    /// Bind `handler` to every conversation event for `peer`.
    ///
    /// Listeners this manager already holds are removed first.
    pub fn acquire(&self, peer: UserId, handler: PushHandler) -> PushSubscription {
        let mut bound = lock(&self.bound);
        let mut listeners = Vec::with_capacity(PushEventKind::ALL.len());

        for kind in PushEventKind::ALL {
            if let Some(previous) = bound.remove(&kind) {
                self.channel.off(previous);
            }
            let id = self.channel.on(kind, Arc::clone(&handler));
            bound.insert(kind, id);
            listeners.push((kind, id));
        }

        tracing::debug!(peer = %peer, "push handlers bound");
        PushSubscription {
            peer,
            listeners,
            channel: Arc::clone(&self.channel),
            bound: Arc::downgrade(&self.bound),
            released: false,
        }
    }

    /// Unbind whatever this manager currently holds.
    pub fn release_all(&self) {
        let mut bound = lock(&self.bound);
        for (_, id) in bound.drain() {
            self.channel.off(id);
        }
    }

    /// Number of listeners this manager currently holds.
    pub fn bound_count(&self) -> usize {
        lock(&self.bound).len()
    }
}

/// Handle of an acquired subscription.
///
/// Released exactly once: by [`PushSubscription::release`] or on drop.
pub struct PushSubscription {
    peer: UserId,
    listeners: Vec<(PushEventKind, ListenerId)>,
    channel: Arc<dyn PushChannel>,
    bound: Weak<Mutex<Bindings>>,
    released: bool,
}

impl std::fmt::Debug for PushSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushSubscription")
            .field("peer", &self.peer)
            .field("listeners", &self.listeners)
            .field("released", &self.released)
            .finish()
    }
}

impl PushSubscription {
    /// The peer this subscription was acquired for.
    pub fn peer(&self) -> &UserId {
        &self.peer
    }

    /// Whether this handle's listeners are still the manager's current ones.
    pub fn is_current(&self) -> bool {
        let Some(bound) = self.bound.upgrade() else {
            return false;
        };
        let bound = lock(&bound);
        !self.released
            && self
                .listeners
                .iter()
                .all(|(kind, id)| bound.get(kind) == Some(id))
    }

    /// Unbind the listeners this handle registered.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let Some(bound) = self.bound.upgrade() else {
            // Manager is gone; our ids may still be live on the channel.
            for (_, id) in &self.listeners {
                self.channel.off(*id);
            }
            return;
        };
        let mut bound = lock(&bound);
        for (kind, id) in &self.listeners {
            // A newer acquire replaced this binding; leave it alone.
            if bound.get(kind) == Some(id) {
                bound.remove(kind);
                self.channel.off(*id);
            }
        }
        tracing::debug!(peer = %self.peer, "push handlers released");
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}
