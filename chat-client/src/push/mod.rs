//! Push channel abstraction for swiftchat.
//!
//! The push channel is a shared, already-connected event stream supplied by
//! the application. This crate only binds listeners to it and emits typing
//! signals on it; connecting, reconnecting and authenticating are the
//! channel owner's job.
//!
//! # Design
//!
//! The channel is event-name oriented:
//! - `on()` registers a listener for one inbound event kind
//! - `off()` removes exactly one listener
//! - `emit()` sends an outbound event
//!
//! # Example
//!
//! ```ignore
//! let channel = MockPushChannel::new();
//! let id = channel.on(PushEventKind::Typing, Arc::new(|event| println!("{:?}", event)));
//! channel.deliver(InboundEvent::typing("u1"));
//! channel.off(id);
//! ```

mod mock;

pub use mock::MockPushChannel;

use std::sync::Arc;
use swiftchat_types::{InboundEvent, OutboundEvent, PushEventKind};
use thiserror::Error;

/// A listener for inbound events.
///
/// Handlers run on the channel's delivery path and must not block.
pub type PushHandler = Arc<dyn Fn(InboundEvent) + Send + Sync>;

/// Handle of one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Create a listener id. Channel implementations mint these.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Push channel errors.
#[derive(Debug, Error)]
pub enum PushError {
    /// The channel is not connected.
    #[error("push channel disconnected")]
    Disconnected,

    /// Emit failed.
    #[error("emit failed: {0}")]
    EmitFailed(String),
}

/// A named-event push channel.
///
/// Implementations wrap whatever realtime transport the application uses.
pub trait PushChannel: Send + Sync {
    /// Register `handler` for events of `kind`.
    fn on(&self, kind: PushEventKind, handler: PushHandler) -> ListenerId;

    /// Remove one listener. Unknown ids are ignored.
    fn off(&self, id: ListenerId);

    /// Send an outbound event.
    fn emit(&self, event: OutboundEvent) -> Result<(), PushError>;
}
