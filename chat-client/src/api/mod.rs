//! Request client abstraction for swiftchat.
//!
//! This module provides a pluggable request/response layer over the remote
//! chat service (HTTP, mock for testing).
//!
//! # Design
//!
//! One async method per remote operation. Each returns the canonical
//! server-side record or an [`ApiError`] carrying the failure class and the
//! server's message. Timeouts are enforced by the implementation.
//!
//! # Example
//!
//! ```ignore
//! let api = MockChatApi::new();
//! api.set_peers(vec![Peer::new("u1", "Ada")]);
//! let peers = api.fetch_peers().await?;
//! ```

mod http;
mod mock;

pub use http::HttpChatApi;
pub use mock::{ApiCall, Deferred, DeferredHistory, DeferredPeers, MockChatApi};

use async_trait::async_trait;
use swiftchat_types::{ApiError, Message, MessageId, OutgoingMessage, Peer, UserId};

/// Request client for the remote chat service.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// List every peer of the local user, with unread counts and previews.
    async fn fetch_peers(&self) -> Result<Vec<Peer>, ApiError>;

    /// Fetch the whole conversation with `peer`, oldest first.
    async fn fetch_history(&self, peer: &UserId) -> Result<Vec<Message>, ApiError>;

    /// Send a draft to `to` and return the canonical message.
    async fn send_message(&self, to: &UserId, draft: &OutgoingMessage) -> Result<Message, ApiError>;

    /// Mark every message from `peer` as read.
    async fn mark_read(&self, peer: &UserId) -> Result<(), ApiError>;

    /// Delete a message.
    async fn delete_message(&self, id: &MessageId) -> Result<(), ApiError>;

    /// Replace a message's text and return the canonical edited message.
    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<Message, ApiError>;
}
