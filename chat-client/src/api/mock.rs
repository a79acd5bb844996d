//! Mock request client for testing.
//!
//! Keeps a tiny in-memory model of the remote service (peers and
//! conversations), records every call, and allows forcing failures or
//! holding a history response back until the test releases it.

use super::ChatApi;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use swiftchat_types::{
    ApiError, DeliveryStatus, Message, MessageId, OutgoingMessage, Peer, UserId,
};
use tokio::sync::oneshot;

use crate::lock;

type Held<T> = oneshot::Receiver<Result<T, ApiError>>;

/// A call made against [`MockChatApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `fetch_peers()`
    FetchPeers,
    /// `fetch_history(peer)`
    FetchHistory(UserId),
    /// `send_message(to, draft)`
    SendMessage(UserId, OutgoingMessage),
    /// `mark_read(peer)`
    MarkRead(UserId),
    /// `delete_message(id)`
    DeleteMessage(MessageId),
    /// `edit_message(id, text)`
    EditMessage(MessageId, String),
}

/// A response held back by [`MockChatApi::defer_history`] or
/// [`MockChatApi::defer_peers`].
#[derive(Debug)]
pub struct Deferred<T> {
    tx: oneshot::Sender<Result<T, ApiError>>,
}

/// A held history response.
pub type DeferredHistory = Deferred<Vec<Message>>;

/// A held peer-list response.
pub type DeferredPeers = Deferred<Vec<Peer>>;

impl<T> Deferred<T> {
    fn channel() -> (Self, Held<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Let the held request succeed with `value`.
    pub fn resolve(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }

    /// Let the held request fail with `error`.
    pub fn fail(self, error: ApiError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Mock request client for testing.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct MockChatApi {
    inner: Arc<Mutex<MockApiInner>>,
}

#[derive(Debug)]
struct MockApiInner {
    me: UserId,
    peers: Vec<Peer>,
    histories: HashMap<UserId, Vec<Message>>,
    deferred: HashMap<UserId, VecDeque<Held<Vec<Message>>>>,
    deferred_peers: VecDeque<Held<Vec<Peer>>>,
    calls: Vec<ApiCall>,
    next_message: u64,
    fail_next_fetch_peers: Option<ApiError>,
    fail_next_fetch_history: Option<ApiError>,
    fail_next_send: Option<ApiError>,
    fail_next_mark_read: Option<ApiError>,
    fail_next_delete: Option<ApiError>,
    fail_next_edit: Option<ApiError>,
}

impl Default for MockChatApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatApi {
    /// Create a mock where the local user is `me`.
    pub fn new() -> Self {
        Self::for_user("me")
    }

    /// Create a mock where the local user is `me`.
    pub fn for_user(me: impl Into<UserId>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockApiInner {
                me: me.into(),
                peers: Vec::new(),
                histories: HashMap::new(),
                deferred: HashMap::new(),
                deferred_peers: VecDeque::new(),
                calls: Vec::new(),
                next_message: 0,
                fail_next_fetch_peers: None,
                fail_next_fetch_history: None,
                fail_next_send: None,
                fail_next_mark_read: None,
                fail_next_delete: None,
                fail_next_edit: None,
            })),
        }
    }

    /// Replace the peer list the service returns.
    pub fn set_peers(&self, peers: Vec<Peer>) {
        lock(&self.inner).peers = peers;
    }

    /// Replace the stored conversation with `peer`.
    pub fn set_history(&self, peer: impl Into<UserId>, messages: Vec<Message>) {
        lock(&self.inner).histories.insert(peer.into(), messages);
    }

    /// Hold the next history request for `peer` until the returned handle is used.
    ///
    /// Dropping the handle fails the request with a network error.
    pub fn defer_history(&self, peer: impl Into<UserId>) -> DeferredHistory {
        let (gate, rx) = Deferred::channel();
        lock(&self.inner)
            .deferred
            .entry(peer.into())
            .or_default()
            .push_back(rx);
        gate
    }

    /// Hold the next peer-list request until the returned handle is used.
    ///
    /// Holds queue up: each call holds one more request, in call order.
    pub fn defer_peers(&self) -> DeferredPeers {
        let (gate, rx) = Deferred::channel();
        lock(&self.inner).deferred_peers.push_back(rx);
        gate
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        lock(&self.inner).calls.clone()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        lock(&self.inner).calls.clear();
    }

    /// Cause the next fetch_peers() to fail.
    pub fn fail_next_fetch_peers(&self, error: ApiError) {
        lock(&self.inner).fail_next_fetch_peers = Some(error);
    }

    /// Cause the next fetch_history() to fail.
    pub fn fail_next_fetch_history(&self, error: ApiError) {
        lock(&self.inner).fail_next_fetch_history = Some(error);
    }

    /// Cause the next send_message() to fail.
    pub fn fail_next_send(&self, error: ApiError) {
        lock(&self.inner).fail_next_send = Some(error);
    }

    /// Cause the next mark_read() to fail.
    pub fn fail_next_mark_read(&self, error: ApiError) {
        lock(&self.inner).fail_next_mark_read = Some(error);
    }

    /// Cause the next delete_message() to fail.
    pub fn fail_next_delete(&self, error: ApiError) {
        lock(&self.inner).fail_next_delete = Some(error);
    }

    /// Cause the next edit_message() to fail.
    pub fn fail_next_edit(&self, error: ApiError) {
        lock(&self.inner).fail_next_edit = Some(error);
    }
}

impl MockApiInner {
    fn find_message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.histories
            .values_mut()
            .flat_map(|messages| messages.iter_mut())
            .find(|m| &m.id == id)
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::status(404).with_message(format!("{} not found", what))
}

#[async_trait]
impl ChatApi for MockChatApi {
    async fn fetch_peers(&self) -> Result<Vec<Peer>, ApiError> {
        let held = {
            let mut inner = lock(&self.inner);
            inner.calls.push(ApiCall::FetchPeers);

            // Check for forced failure
            if let Some(error) = inner.fail_next_fetch_peers.take() {
                return Err(error);
            }

            match inner.deferred_peers.pop_front() {
                Some(rx) => rx,
                None => return Ok(inner.peers.clone()),
            }
        };

        held.await.unwrap_or_else(|_| Err(ApiError::network()))
    }

    async fn fetch_history(&self, peer: &UserId) -> Result<Vec<Message>, ApiError> {
        let held = {
            let mut inner = lock(&self.inner);
            inner.calls.push(ApiCall::FetchHistory(peer.clone()));

            if let Some(error) = inner.fail_next_fetch_history.take() {
                return Err(error);
            }

            match inner.deferred.get_mut(peer).and_then(VecDeque::pop_front) {
                Some(rx) => rx,
                None => return Ok(inner.histories.get(peer).cloned().unwrap_or_default()),
            }
        };

        held.await.unwrap_or_else(|_| Err(ApiError::network()))
    }

    async fn send_message(
        &self,
        to: &UserId,
        draft: &OutgoingMessage,
    ) -> Result<Message, ApiError> {
        let mut inner = lock(&self.inner);
        inner.calls.push(ApiCall::SendMessage(to.clone(), draft.clone()));

        if let Some(error) = inner.fail_next_send.take() {
            return Err(error);
        }

        inner.next_message += 1;
        let message = Message {
            id: MessageId::new(format!("m{}", inner.next_message)),
            sender_id: inner.me.clone(),
            receiver_id: to.clone(),
            text: draft.text.clone(),
            image: draft.image.clone(),
            reply_to: draft.reply_to.clone(),
            created_at: Utc::now(),
            status: DeliveryStatus::Sent,
            is_edited: false,
            edited_at: None,
        };
        inner
            .histories
            .entry(to.clone())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn mark_read(&self, peer: &UserId) -> Result<(), ApiError> {
        let mut inner = lock(&self.inner);
        inner.calls.push(ApiCall::MarkRead(peer.clone()));

        if let Some(error) = inner.fail_next_mark_read.take() {
            return Err(error);
        }

        if let Some(entry) = inner.peers.iter_mut().find(|p| &p.id == peer) {
            entry.unread_count = 0;
        }
        Ok(())
    }

    async fn delete_message(&self, id: &MessageId) -> Result<(), ApiError> {
        let mut inner = lock(&self.inner);
        inner.calls.push(ApiCall::DeleteMessage(id.clone()));

        if let Some(error) = inner.fail_next_delete.take() {
            return Err(error);
        }

        let mut found = false;
        for messages in inner.histories.values_mut() {
            let before = messages.len();
            messages.retain(|m| &m.id != id);
            found |= messages.len() != before;
        }
        if found {
            Ok(())
        } else {
            Err(not_found("Message"))
        }
    }

    async fn edit_message(&self, id: &MessageId, text: &str) -> Result<Message, ApiError> {
        let mut inner = lock(&self.inner);
        inner.calls.push(ApiCall::EditMessage(id.clone(), text.to_string()));

        if let Some(error) = inner.fail_next_edit.take() {
            return Err(error);
        }

        let message = inner.find_message_mut(id).ok_or_else(|| not_found("Message"))?;
        message.text = Some(text.to_string());
        message.is_edited = true;
        message.edited_at = Some(Utc::now());
        Ok(message.clone())
    }
}
