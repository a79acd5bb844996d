//! Mock push channel for testing.
//!
//! Records registered listeners and emitted events, and delivers inbound
//! events to the listeners on demand.

use super::{ListenerId, PushChannel, PushError, PushHandler};
use std::sync::{Arc, Mutex};
use swiftchat_types::{InboundEvent, OutboundEvent, PushEventKind};

use crate::lock;

/// Mock push channel for testing.
///
/// Clones share the same listeners and emission log.
#[derive(Clone)]
pub struct MockPushChannel {
    inner: Arc<Mutex<MockPushInner>>,
}

#[derive(Default)]
struct MockPushInner {
    next_id: u64,
    listeners: Vec<(ListenerId, PushEventKind, PushHandler)>,
    emitted: Vec<OutboundEvent>,
    fail_next_emit: Option<String>,
    connected: bool,
}

impl std::fmt::Debug for MockPushChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MockPushChannel")
            .field("listeners", &inner.listeners.len())
            .field("emitted", &inner.emitted.len())
            .field("connected", &inner.connected)
            .finish()
    }
}

impl Default for MockPushChannel {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockPushInner {
                connected: true,
                ..MockPushInner::default()
            })),
        }
    }
}

impl MockPushChannel {
    /// Create a new, connected mock channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an inbound event to every listener of its kind.
    ///
    /// Returns the number of listeners invoked.
    pub fn deliver(&self, event: InboundEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<PushHandler> = {
            let inner = lock(&self.inner);
            inner
                .listeners
                .iter()
                .filter(|(_, k, _)| *k == kind)
                .map(|(_, _, h)| Arc::clone(h))
                .collect()
        };
        // Handlers run without the channel lock held.
        for handler in &handlers {
            handler(event.clone());
        }
        handlers.len()
    }

    /// Decode a raw wire event and deliver it.
    ///
    /// Unknown event names are dropped and deliver to nobody.
    pub fn deliver_raw(
        &self,
        name: &str,
        data: serde_json::Value,
    ) -> Result<usize, serde_json::Error> {
        match InboundEvent::from_parts(name, data)? {
            Some(event) => Ok(self.deliver(event)),
            None => Ok(0),
        }
    }

    /// Number of listeners bound for `kind`.
    pub fn listener_count(&self, kind: PushEventKind) -> usize {
        lock(&self.inner)
            .listeners
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .count()
    }

    /// Number of listeners bound across all kinds.
    pub fn total_listeners(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    /// All events emitted so far.
    pub fn emitted(&self) -> Vec<OutboundEvent> {
        lock(&self.inner).emitted.clone()
    }

    /// Forget the emission log.
    pub fn clear_emitted(&self) {
        lock(&self.inner).emitted.clear();
    }

    /// Cause the next emit() to fail with the given error.
    pub fn fail_next_emit(&self, error: &str) {
        lock(&self.inner).fail_next_emit = Some(error.to_string());
    }

    /// Simulate the channel dropping or coming back.
    pub fn set_connected(&self, connected: bool) {
        lock(&self.inner).connected = connected;
    }
}

impl PushChannel for MockPushChannel {
    fn on(&self, kind: PushEventKind, handler: PushHandler) -> ListenerId {
        let mut inner = lock(&self.inner);
        inner.next_id += 1;
        let id = ListenerId::new(inner.next_id);
        inner.listeners.push((id, kind, handler));
        id
    }

    fn off(&self, id: ListenerId) {
        lock(&self.inner).listeners.retain(|(l, _, _)| *l != id);
    }

    fn emit(&self, event: OutboundEvent) -> Result<(), PushError> {
        let mut inner = lock(&self.inner);

        if !inner.connected {
            return Err(PushError::Disconnected);
        }

        // Check for forced failure
        if let Some(error) = inner.fail_next_emit.take() {
            return Err(PushError::EmitFailed(error));
        }

        inner.emitted.push(event);
        Ok(())
    }
}
