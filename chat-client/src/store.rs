//! ConversationStore - the main interface for swiftchat.
//!
//! This module provides [`ConversationStore`], the single owner of the
//! conversation view: the active peer, its messages, the peer list, loading
//! flags and the typing flag.
//!
//! # Architecture
//!
//! ConversationStore uses a pure state machine (from swiftchat-core) for the
//! view logic and interprets the actions it returns to perform the actual
//! I/O through the [`ChatApi`] request client and the push channel.
//!
//! ```text
//! Application → ConversationStore → ChatApi → remote service
//!                   ↓        ↑
//!   swiftchat-core state    PushChannel (inbound events)
//! ```
//!
//! State is only touched under a short lock that is never held across an
//! await point, so every mutation is atomic with respect to other
//! operations and to push events.
//!
//! # Example
//!
//! ```ignore
//! use swiftchat_client::{ConversationStore, MockChatApi, MockPushChannel};
//!
//! let store = ConversationStore::new(MockChatApi::new(), Arc::new(MockPushChannel::new()));
//!
//! store.load_peers().await?;
//! store.select_peer("u1").await;
//! store.send_message(OutgoingMessage::text("hi")).await?;
//! ```

use std::sync::{Arc, Mutex};

use swiftchat_core::{
    validate_draft, Action, ConversationState, DraftError, DraftLimits, Event, FetchTicket, Phase,
};
use swiftchat_types::{ApiError, InboundEvent, Message, MessageId, OutgoingMessage, Peer, UserId};
use tokio::runtime::Handle;

use crate::api::ChatApi;
use crate::cache::ChatCache;
use crate::config::ChatConfig;
use crate::error::ClientError;
use crate::notify::{Notifier, TracingNotifier};
use crate::push::{PushChannel, PushHandler};
use crate::subscription::{PushSubscription, PushSubscriptionManager};
use crate::typing::TypingController;
use crate::{lock, runtime_handle};

/// The conversation store.
///
/// Clones share the same store. Dropping the last clone releases the push
/// subscription.
pub struct ConversationStore<A: ChatApi + 'static> {
    inner: Arc<StoreInner<A>>,
}

struct StoreInner<A: ChatApi> {
    api: A,
    state: Mutex<ConversationState>,
    cache: ChatCache,
    subscriptions: PushSubscriptionManager,
    subscription: Mutex<Option<PushSubscription>>,
    typing: TypingController,
    notifier: Arc<dyn Notifier>,
    limits: DraftLimits,
    runtime: Option<Handle>,
}

impl<A: ChatApi + 'static> Clone for ConversationStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: ChatApi + 'static> std::fmt::Debug for ConversationStore<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("ConversationStore")
            .field("phase", state.phase())
            .field("messages", &state.messages().len())
            .field("peers", &state.peers().len())
            .finish()
    }
}

/// Builder for [`ConversationStore`].
pub struct StoreBuilder<A: ChatApi + 'static> {
    api: A,
    channel: Arc<dyn PushChannel>,
    config: ChatConfig,
    notifier: Arc<dyn Notifier>,
    cache: Option<ChatCache>,
    runtime: Option<Handle>,
}

impl<A: ChatApi + 'static> StoreBuilder<A> {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    /// Send user-visible failures to `notifier` instead of the log.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Share an existing cache instead of creating one from the configuration.
    pub fn cache(mut self, cache: ChatCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Spawn background work on `runtime` when called from outside one.
    ///
    /// Defaults to the runtime current at [`StoreBuilder::build`], if any.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the store.
    pub fn build(self) -> ConversationStore<A> {
        let runtime = self.runtime.or_else(|| Handle::try_current().ok());
        let mut cache = self.cache.unwrap_or_else(|| ChatCache::new(&self.config.cache));
        let mut typing =
            TypingController::new(Arc::clone(&self.channel), self.config.typing.stop_delay());
        if let Some(runtime) = &runtime {
            cache = cache.with_runtime(runtime.clone());
            typing = typing.with_runtime(runtime.clone());
        }
        ConversationStore {
            inner: Arc::new(StoreInner {
                api: self.api,
                state: Mutex::new(ConversationState::new()),
                cache,
                subscriptions: PushSubscriptionManager::new(self.channel),
                subscription: Mutex::new(None),
                typing,
                notifier: self.notifier,
                limits: self.config.limits.draft_limits(),
                runtime,
            }),
        }
    }
}

impl<A: ChatApi + 'static> ConversationStore<A> {
    /// Create a store with the default configuration.
    pub fn new(api: A, channel: Arc<dyn PushChannel>) -> Self {
        Self::builder(api, channel).build()
    }

    /// Start building a store.
    pub fn builder(api: A, channel: Arc<dyn PushChannel>) -> StoreBuilder<A> {
        StoreBuilder {
            api,
            channel,
            config: ChatConfig::default(),
            notifier: Arc::new(TracingNotifier),
            cache: None,
            runtime: None,
        }
    }

    // ===========================================
    // Peer list
    // ===========================================

    /// Load the peer list, serving it from cache when possible.
    ///
    /// On failure the previous list is kept and the failure is reported.
    pub async fn load_peers(&self) -> Result<Vec<Peer>, ClientError> {
        self.inner.load_peers(true).await.map_err(ClientError::from)
    }

    /// Re-fetch the peer list, bypassing the cache.
    ///
    /// Failures are logged only.
    pub async fn refresh_peers(&self) {
        self.inner.refresh_peers().await;
    }

    // ===========================================
    // Selection
    // ===========================================

    /// Open the conversation with `peer`.
    ///
    /// Switching peers clears the message list before anything goes on the
    /// wire, then fetches history while marking the conversation read and
    /// refreshing the peer list. Re-selecting the active peer only marks
    /// read and refreshes. Never fails; remote failures are reported.
    pub async fn select_peer(&self, peer: impl Into<UserId>) {
        let peer = peer.into();
        tracing::debug!(peer = %peer, "Selecting conversation");
        let actions = self.inner.apply(Event::PeerSelected { peer });
        self.inner.run(actions).await;
    }

    /// Close the active conversation.
    pub fn deselect(&self) {
        let actions = self.inner.apply(Event::Deselected);
        self.inner.run_detached(actions);
    }

    // ===========================================
    // Messages
    // ===========================================

    /// Send a draft to the active peer.
    ///
    /// The canonical message returned by the service is appended only if
    /// its conversation is still the active one.
    pub async fn send_message(&self, draft: OutgoingMessage) -> Result<Message, ClientError> {
        let to = self.active_peer().ok_or(ClientError::NoActivePeer)?;
        let draft = validate_draft(&draft, &self.inner.limits)?;
        self.inner.typing.end_burst();

        match self.inner.api.send_message(&to, &draft).await {
            Ok(message) => {
                tracing::debug!(to = %to, id = %message.id, "Message sent");
                let actions = self.inner.apply(Event::MessageSent {
                    to,
                    message: message.clone(),
                });
                self.inner.run(actions).await;
                Ok(message)
            }
            Err(e) => {
                self.inner.report(&e, "Failed to send message");
                Err(e.into())
            }
        }
    }

    /// Delete a message. The list changes only once the service confirms.
    pub async fn delete_message(&self, id: &MessageId) -> Result<(), ClientError> {
        match self.inner.api.delete_message(id).await {
            Ok(()) => {
                self.inner.apply(Event::MessageDeleted { id: id.clone() });
                Ok(())
            }
            Err(e) => {
                self.inner.report(&e, "Failed to delete message");
                Err(e.into())
            }
        }
    }

    /// Replace a message's text.
    ///
    /// Blank text is a no-op returning `Ok(None)` without a remote call.
    pub async fn edit_message(
        &self,
        id: &MessageId,
        text: &str,
    ) -> Result<Option<Message>, ClientError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let len = text.chars().count();
        if len > self.inner.limits.max_text_len {
            return Err(DraftError::TextTooLong {
                len,
                max: self.inner.limits.max_text_len,
            }
            .into());
        }

        match self.inner.api.edit_message(id, text).await {
            Ok(message) => {
                self.inner.apply(Event::MessageEdited {
                    message: message.clone(),
                });
                Ok(Some(message))
            }
            Err(e) => {
                self.inner.report(&e, "Failed to edit message");
                Err(e.into())
            }
        }
    }

    // ===========================================
    // Typing
    // ===========================================

    /// The local user edited the draft.
    pub fn typing_input(&self) {
        self.inner.typing.on_input(self.active_peer().as_ref());
    }

    /// The draft input lost focus.
    pub fn typing_blur(&self) {
        self.inner.typing.on_blur(self.active_peer().as_ref());
    }

    // ===========================================
    // Accessors
    // ===========================================

    /// The active peer, if any.
    pub fn active_peer(&self) -> Option<UserId> {
        lock(&self.inner.state).active_peer().cloned()
    }

    /// Messages of the active conversation.
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.inner.state).messages().to_vec()
    }

    /// The last loaded peer list.
    pub fn peers(&self) -> Vec<Peer> {
        lock(&self.inner.state).peers().to_vec()
    }

    /// Look up a peer in the loaded list, falling back to the cache.
    pub fn peer(&self, id: &UserId) -> Option<Peer> {
        let listed = lock(&self.inner.state).peer(id).cloned();
        listed.or_else(|| self.inner.cache.cached_user(id))
    }

    /// Unread count of `peer` as of the last peer-list load.
    pub fn unread_count(&self, peer: &UserId) -> u32 {
        lock(&self.inner.state)
            .peer(peer)
            .map_or(0, |p| p.unread_count)
    }

    /// Whether a peer-list fetch is in flight.
    pub fn is_users_loading(&self) -> bool {
        lock(&self.inner.state).is_users_loading()
    }

    /// Whether the active conversation's history is being fetched.
    pub fn is_messages_loading(&self) -> bool {
        lock(&self.inner.state).is_messages_loading()
    }

    /// Whether the active peer is typing.
    pub fn is_typing(&self) -> bool {
        lock(&self.inner.state).is_typing()
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        lock(&self.inner.state).phase().clone()
    }

    /// A copy of the whole view state.
    pub fn snapshot(&self) -> ConversationState {
        lock(&self.inner.state).clone()
    }

    /// The peer cache.
    pub fn cache(&self) -> &ChatCache {
        &self.inner.cache
    }

    /// The request client.
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    // ===========================================
    // Teardown
    // ===========================================

    /// Release every resource the store holds.
    ///
    /// Closes the conversation, unbinds push handlers, drops any pending
    /// typing signal without emitting it, and clears the cache.
    pub fn shutdown(&self) {
        // Actions are not run: the pending stop signal must be dropped, not sent.
        self.inner.apply(Event::Deselected);
        if let Some(subscription) = lock(&self.inner.subscription).take() {
            subscription.release();
        }
        self.inner.subscriptions.release_all();
        self.inner.typing.cancel();
        self.inner.cache.clear();
        tracing::info!("Conversation store shut down");
    }
}

impl<A: ChatApi + 'static> StoreInner<A> {
    fn apply(&self, event: Event) -> Vec<Action> {
        lock(&self.state).on_event(event)
    }

    /// Execute actions; remote ones are awaited.
    async fn run(self: &Arc<Self>, actions: Vec<Action>) {
        let remote = self.run_local(actions);
        self.run_remote(remote).await;
    }

    /// Execute actions; remote ones go to a background task.
    fn run_detached(self: &Arc<Self>, actions: Vec<Action>) {
        let remote = self.run_local(actions);
        if remote.is_empty() {
            return;
        }
        match runtime_handle(self.runtime.as_ref()) {
            Some(runtime) => {
                let inner = Arc::clone(self);
                runtime.spawn(async move { inner.run_remote(remote).await });
            }
            None => tracing::warn!(
                "No async runtime; dropping {} remote actions",
                remote.len()
            ),
        }
    }

    /// Perform the synchronous actions in order and return the remote ones.
    fn run_local(self: &Arc<Self>, actions: Vec<Action>) -> Vec<Action> {
        let mut remote = Vec::new();
        for action in actions {
            match action {
                Action::AcquireSubscription { peer } => self.acquire(peer),
                Action::ReleaseSubscription => {
                    if let Some(subscription) = lock(&self.subscription).take() {
                        subscription.release();
                    }
                }
                Action::EndTypingBurst => self.typing.end_burst(),
                other => remote.push(other),
            }
        }
        remote
    }

    /// History runs concurrently with the mark-read then refresh chain.
    async fn run_remote(&self, actions: Vec<Action>) {
        let mut history = None;
        let mut chain = Vec::new();
        for action in actions {
            match action {
                Action::FetchHistory { ticket } => history = Some(ticket),
                other => chain.push(other),
            }
        }

        let fetch = async {
            if let Some(ticket) = history {
                self.fetch_history(ticket).await;
            }
        };
        let follow = async {
            for action in chain {
                match action {
                    Action::MarkRead { peer } => self.mark_read(&peer).await,
                    Action::RefreshPeers => self.refresh_peers().await,
                    other => tracing::debug!("Unexpected remote action {:?}", other),
                }
            }
        };
        tokio::join!(fetch, follow);
    }

    fn acquire(self: &Arc<Self>, peer: UserId) {
        let store = Arc::downgrade(self);
        let handler: PushHandler = Arc::new(move |event| {
            if let Some(store) = store.upgrade() {
                store.on_push(event);
            }
        });
        let subscription = self.subscriptions.acquire(peer, handler);
        let previous = lock(&self.subscription).replace(subscription);
        // The manager already rebound every name, so this release is a no-op on the channel.
        drop(previous);
    }

    fn on_push(self: &Arc<Self>, event: InboundEvent) {
        tracing::debug!(event = %event.kind(), "Push event received");
        let actions = self.apply(Event::PushReceived { event });
        self.run_detached(actions);
    }

    async fn fetch_history(&self, ticket: FetchTicket) {
        let result = self.api.fetch_history(ticket.peer()).await;

        let mut state = lock(&self.state);
        if !state.is_current(&ticket) {
            tracing::debug!(
                peer = %ticket.peer(),
                seq = ticket.seq(),
                "Discarding stale history response"
            );
            return;
        }
        match result {
            Ok(messages) => {
                tracing::debug!(peer = %ticket.peer(), count = messages.len(), "History loaded");
                state.on_event(Event::HistoryLoaded { ticket, messages });
            }
            Err(e) => {
                state.on_event(Event::HistoryFailed { ticket });
                drop(state);
                self.report(&e, "Failed to fetch messages");
            }
        }
    }

    async fn mark_read(&self, peer: &UserId) {
        if let Err(e) = self.api.mark_read(peer).await {
            tracing::warn!("Failed to mark messages from {} as read: {}", peer, e);
        }
    }

    /// Returns the list the view shows once this load has settled.
    async fn load_peers(&self, notify: bool) -> Result<Vec<Peer>, ApiError> {
        if let Some(peers) = self.cache.cached_users() {
            let mut state = lock(&self.state);
            state.on_event(Event::PeersLoadStarted);
            let ticket = state.peers_ticket();
            state.on_event(Event::PeersLoaded {
                ticket,
                peers: peers.clone(),
            });
            return Ok(peers);
        }

        let ticket = {
            let mut state = lock(&self.state);
            state.on_event(Event::PeersLoadStarted);
            state.peers_ticket()
        };
        let result = self.api.fetch_peers().await;

        let mut state = lock(&self.state);
        match result {
            Ok(peers) => {
                // Cache writes stay under the state lock so a newer load cannot interleave.
                if state.is_latest_peers(&ticket) {
                    self.cache.cache_users(&peers);
                    for peer in &peers {
                        self.cache.cache_user(peer);
                    }
                } else {
                    tracing::debug!(seq = ticket.seq(), "Discarding stale peer list");
                }
                state.on_event(Event::PeersLoaded { ticket, peers });
                Ok(state.peers().to_vec())
            }
            Err(e) => {
                state.on_event(Event::PeersLoadFailed { ticket });
                drop(state);
                if notify {
                    self.report(&e, "Failed to fetch users");
                } else {
                    tracing::warn!("Peer list refresh failed: {}", e);
                }
                Err(e)
            }
        }
    }

    async fn refresh_peers(&self) {
        self.cache.invalidate_users();
        // Failures are already logged.
        let _ = self.load_peers(false).await;
    }

    fn report(&self, error: &ApiError, default: &str) {
        let report = swiftchat_core::report(error, default);
        tracing::error!(kind = ?report.kind, "{}: {}", default, error);
        self.notifier.notify_error(&report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiCall, MockChatApi};
    use crate::notify::RecordingNotifier;
    use crate::push::MockPushChannel;
    use chrono::{TimeZone, Utc};
    use swiftchat_types::{DeliveryStatus, OutboundEvent, PushEventKind};

    struct Harness {
        store: ConversationStore<MockChatApi>,
        api: MockChatApi,
        channel: MockPushChannel,
        notifier: RecordingNotifier,
    }

    fn harness() -> Harness {
        let api = MockChatApi::for_user("me");
        let channel = MockPushChannel::new();
        let notifier = RecordingNotifier::new();
        let store = ConversationStore::builder(api.clone(), Arc::new(channel.clone()))
            .notifier(Arc::new(notifier.clone()))
            .build();
        Harness {
            store,
            api,
            channel,
            notifier,
        }
    }

    fn msg(id: &str, from: &str, to: &str, text: &str) -> Message {
        Message {
            id: MessageId::new(id),
            sender_id: UserId::new(from),
            receiver_id: UserId::new(to),
            text: Some(text.to_string()),
            image: None,
            reply_to: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            status: DeliveryStatus::Sent,
            is_edited: false,
            edited_at: None,
        }
    }

    fn ids(store: &ConversationStore<MockChatApi>) -> Vec<String> {
        store
            .messages()
            .iter()
            .map(|m| m.id.as_str().to_string())
            .collect()
    }

    /// Let spawned background work run to completion.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ===========================================
    // Peer List Tests
    // ===========================================

    #[tokio::test]
    async fn load_peers_reads_through_cache() {
        let h = harness();
        h.api.set_peers(vec![Peer::new("u1", "Ada").with_unread(2)]);

        let first = h.store.load_peers().await.unwrap();
        let second = h.store.load_peers().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.api.calls(), vec![ApiCall::FetchPeers]);
        assert_eq!(h.store.unread_count(&UserId::new("u1")), 2);
        assert!(h.store.cache().cached_user(&UserId::new("u1")).is_some());
        assert!(!h.store.is_users_loading());
    }

    #[tokio::test]
    async fn load_peers_failure_keeps_previous_list() {
        let h = harness();
        h.api.set_peers(vec![Peer::new("u1", "Ada")]);
        h.store.load_peers().await.unwrap();
        h.store.cache().invalidate_users();
        h.api.fail_next_fetch_peers(ApiError::status(500));

        let err = h.store.load_peers().await.unwrap_err();

        assert!(matches!(err, ClientError::Api(_)));
        assert_eq!(h.store.peers().len(), 1);
        assert!(!h.store.is_users_loading());
        assert_eq!(
            h.notifier.messages(),
            vec!["Internal server error. Please try again later."]
        );
    }

    #[tokio::test]
    async fn refresh_bypasses_cache() {
        let h = harness();
        h.api.set_peers(vec![Peer::new("u1", "Ada").with_unread(1)]);
        h.store.load_peers().await.unwrap();

        h.api.set_peers(vec![Peer::new("u1", "Ada").with_unread(5)]);
        h.store.refresh_peers().await;

        assert_eq!(h.store.unread_count(&UserId::new("u1")), 5);
        assert_eq!(h.api.calls().len(), 2);
    }

    #[tokio::test]
    async fn refresh_failure_is_silent() {
        let h = harness();
        h.api.fail_next_fetch_peers(ApiError::network());

        h.store.refresh_peers().await;

        assert!(h.notifier.reports().is_empty());
        assert!(!h.store.is_users_loading());
    }

    #[tokio::test]
    async fn peer_lookup_falls_back_to_cache() {
        let h = harness();
        let ada = Peer::new("u1", "Ada");
        h.store.cache().cache_user(&ada);

        assert_eq!(h.store.peer(&UserId::new("u1")), Some(ada));
        assert!(h.store.peer(&UserId::new("u2")).is_none());
    }

    // ===========================================
    // Selection Tests
    // ===========================================

    #[tokio::test]
    async fn select_runs_effects_in_fixed_order() {
        let h = harness();
        h.api.set_history("u1", vec![msg("m1", "u1", "me", "hi")]);

        h.store.select_peer("u1").await;

        let u1 = UserId::new("u1");
        assert_eq!(
            h.api.calls(),
            vec![
                ApiCall::FetchHistory(u1.clone()),
                ApiCall::MarkRead(u1.clone()),
                ApiCall::FetchPeers,
            ]
        );
        assert_eq!(ids(&h.store), vec!["m1"]);
        assert_eq!(h.store.phase(), Phase::ConversationSelected { peer: u1 });
        assert!(!h.store.is_messages_loading());
        for kind in PushEventKind::ALL {
            assert_eq!(h.channel.listener_count(kind), 1);
        }
    }

    #[tokio::test]
    async fn reselecting_active_peer_does_not_reload() {
        let h = harness();
        h.api.set_history("u1", vec![msg("m1", "u1", "me", "hi")]);
        h.store.select_peer("u1").await;
        h.api.clear_calls();

        h.store.select_peer("u1").await;

        let u1 = UserId::new("u1");
        assert_eq!(h.api.calls(), vec![ApiCall::MarkRead(u1), ApiCall::FetchPeers]);
        assert_eq!(ids(&h.store), vec!["m1"]);
        assert_eq!(h.channel.total_listeners(), 3);
    }

    #[tokio::test]
    async fn switching_peer_clears_before_fetch_completes() {
        let h = harness();
        h.api.set_history("a", vec![msg("a1", "a", "me", "from a")]);
        h.store.select_peer("a").await;

        let gate = h.api.defer_history("b");
        let pending = {
            let store = h.store.clone();
            tokio::spawn(async move { store.select_peer("b").await })
        };
        settle().await;

        assert!(h.store.messages().is_empty());
        assert!(h.store.is_messages_loading());
        assert_eq!(h.store.active_peer(), Some(UserId::new("b")));

        gate.resolve(vec![msg("b1", "b", "me", "from b")]);
        pending.await.unwrap();
        assert_eq!(ids(&h.store), vec!["b1"]);
    }

    #[tokio::test]
    async fn late_history_for_previous_peer_is_discarded() {
        let h = harness();
        h.api.set_history("b", vec![msg("b1", "b", "me", "from b")]);
        let gate = h.api.defer_history("a");

        let pending = {
            let store = h.store.clone();
            tokio::spawn(async move { store.select_peer("a").await })
        };
        settle().await;
        h.store.select_peer("b").await;

        gate.resolve(vec![msg("a1", "a", "me", "from a")]);
        pending.await.unwrap();

        assert_eq!(ids(&h.store), vec!["b1"]);
        assert_eq!(h.store.active_peer(), Some(UserId::new("b")));
        assert!(h.notifier.reports().is_empty());
    }

    #[tokio::test]
    async fn history_failure_is_reported_and_settles() {
        let h = harness();
        h.api.fail_next_fetch_history(ApiError::status(404));

        h.store.select_peer("u1").await;

        assert!(h.store.messages().is_empty());
        assert!(!h.store.is_messages_loading());
        assert_eq!(h.notifier.messages(), vec!["Resource not found."]);
        // Mark-read and refresh still ran.
        assert!(h.api.calls().contains(&ApiCall::FetchPeers));
    }

    #[tokio::test]
    async fn mark_read_failure_is_silent_and_refresh_still_runs() {
        let h = harness();
        h.api.fail_next_mark_read(ApiError::status(500));

        h.store.select_peer("u1").await;

        assert!(h.notifier.reports().is_empty());
        assert_eq!(h.api.calls().last(), Some(&ApiCall::FetchPeers));
    }

    #[tokio::test]
    async fn selecting_refreshes_unread_counts() {
        let h = harness();
        h.api.set_peers(vec![Peer::new("u1", "Ada").with_unread(3)]);
        h.store.load_peers().await.unwrap();
        assert_eq!(h.store.unread_count(&UserId::new("u1")), 3);

        h.store.select_peer("u1").await;

        assert_eq!(h.store.unread_count(&UserId::new("u1")), 0);
    }

    #[tokio::test]
    async fn switching_peer_keeps_single_listener_set() {
        let h = harness();
        h.store.select_peer("a").await;
        h.store.select_peer("b").await;
        h.store.select_peer("c").await;

        assert_eq!(h.channel.total_listeners(), 3);
    }

    #[tokio::test]
    async fn deselect_releases_listeners_and_stops_typing() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.store.typing_input();
        h.channel.deliver(InboundEvent::typing("u1"));
        assert!(h.store.is_typing());

        h.store.deselect();

        assert_eq!(h.channel.total_listeners(), 0);
        assert_eq!(h.store.phase(), Phase::NoConversation);
        assert!(!h.store.is_typing());
        assert!(h.store.messages().is_empty());
        assert_eq!(
            h.channel.emitted(),
            vec![OutboundEvent::typing("u1"), OutboundEvent::stop_typing("u1")]
        );
    }

    // ===========================================
    // Push Tests
    // ===========================================

    #[tokio::test]
    async fn push_from_active_peer_appends_once() {
        let h = harness();
        h.store.select_peer("u1").await;

        h.channel.deliver(InboundEvent::NewMessage(msg("m1", "u1", "me", "hi")));
        h.channel.deliver(InboundEvent::NewMessage(msg("m1", "u1", "me", "hi")));

        assert_eq!(ids(&h.store), vec!["m1"]);
    }

    #[tokio::test]
    async fn push_from_other_peer_refreshes_list() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.api.set_peers(vec![Peer::new("z", "Zed").with_unread(1)]);
        h.api.clear_calls();

        h.channel.deliver(InboundEvent::NewMessage(msg("m9", "z", "me", "psst")));
        settle().await;

        assert!(h.store.messages().is_empty());
        assert_eq!(h.api.calls(), vec![ApiCall::FetchPeers]);
        assert_eq!(h.store.unread_count(&UserId::new("z")), 1);
    }

    #[tokio::test]
    async fn typing_push_tracks_active_peer_only() {
        let h = harness();
        h.store.select_peer("u1").await;

        h.channel.deliver(InboundEvent::typing("z"));
        assert!(!h.store.is_typing());

        h.channel.deliver(InboundEvent::typing("u1"));
        assert!(h.store.is_typing());

        h.channel.deliver(InboundEvent::stop_typing("u1"));
        assert!(!h.store.is_typing());
    }

    #[tokio::test]
    async fn no_push_handling_without_conversation() {
        let h = harness();
        assert_eq!(h.channel.deliver(InboundEvent::typing("u1")), 0);
        assert!(!h.store.is_typing());
    }

    // ===========================================
    // Send / Edit / Delete Tests
    // ===========================================

    #[tokio::test]
    async fn send_requires_active_peer() {
        let h = harness();

        let err = h
            .store
            .send_message(OutgoingMessage::text("hi"))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::NoActivePeer));
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_service() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.api.clear_calls();

        let err = h
            .store
            .send_message(OutgoingMessage::text("   "))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidDraft(DraftError::Empty)));
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn send_appends_canonical_message_and_refreshes() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.api.clear_calls();

        let sent = h
            .store
            .send_message(OutgoingMessage::text("  hello  "))
            .await
            .unwrap();

        assert_eq!(sent.text.as_deref(), Some("hello"));
        assert_eq!(h.store.messages(), vec![sent]);
        assert_eq!(h.api.calls().last(), Some(&ApiCall::FetchPeers));
    }

    #[tokio::test]
    async fn send_failure_leaves_list_unchanged() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.api.fail_next_send(ApiError::timeout());

        let err = h
            .store
            .send_message(OutgoingMessage::text("hi"))
            .await
            .unwrap_err();

        assert!(err.report("x").unwrap().retryable);
        assert!(h.store.messages().is_empty());
        assert_eq!(h.notifier.messages(), vec!["Request timeout. Please try again."]);
    }

    #[tokio::test]
    async fn sending_ends_typing_burst() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.store.typing_input();

        h.store
            .send_message(OutgoingMessage::text("hi"))
            .await
            .unwrap();

        assert_eq!(
            h.channel.emitted(),
            vec![OutboundEvent::typing("u1"), OutboundEvent::stop_typing("u1")]
        );
    }

    #[tokio::test]
    async fn edit_replaces_in_place() {
        let h = harness();
        h.api.set_history(
            "u1",
            vec![msg("m1", "me", "u1", "helo"), msg("m2", "u1", "me", "yo")],
        );
        h.store.select_peer("u1").await;

        let edited = h
            .store
            .edit_message(&MessageId::new("m1"), "hello")
            .await
            .unwrap()
            .unwrap();

        assert!(edited.is_edited);
        assert_eq!(ids(&h.store), vec!["m1", "m2"]);
        assert_eq!(h.store.messages()[0].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn blank_edit_is_noop() {
        let h = harness();
        h.store.select_peer("u1").await;
        h.api.clear_calls();

        let result = h
            .store
            .edit_message(&MessageId::new("m1"), "  \n ")
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(h.api.calls().is_empty());
    }

    #[tokio::test]
    async fn edit_failure_leaves_list_unchanged() {
        let h = harness();
        h.api.set_history("u1", vec![msg("m1", "me", "u1", "hi")]);
        h.store.select_peer("u1").await;
        h.api.fail_next_edit(ApiError::status(403));

        let err = h
            .store
            .edit_message(&MessageId::new("m1"), "changed")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Api(_)));
        assert_eq!(h.store.messages()[0].text.as_deref(), Some("hi"));
        assert_eq!(h.notifier.messages(), vec!["Access forbidden."]);
    }

    #[tokio::test]
    async fn delete_filters_after_confirmation() {
        let h = harness();
        h.api.set_history(
            "u1",
            vec![msg("m1", "me", "u1", "hi"), msg("m2", "u1", "me", "yo")],
        );
        h.store.select_peer("u1").await;

        h.api.fail_next_delete(ApiError::network());
        assert!(h.store.delete_message(&MessageId::new("m1")).await.is_err());
        assert_eq!(ids(&h.store), vec!["m1", "m2"]);

        h.store.delete_message(&MessageId::new("m1")).await.unwrap();
        assert_eq!(ids(&h.store), vec!["m2"]);
    }

    // ===========================================
    // Typing / Teardown Tests
    // ===========================================

    #[tokio::test]
    async fn typing_without_conversation_is_silent() {
        let h = harness();
        h.store.typing_input();
        h.store.typing_blur();
        assert!(h.channel.emitted().is_empty());
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let h = harness();
        h.api.set_peers(vec![Peer::new("u1", "Ada")]);
        h.store.load_peers().await.unwrap();
        h.store.select_peer("u1").await;
        h.store.typing_input();

        h.store.shutdown();

        assert_eq!(h.channel.total_listeners(), 0);
        assert!(h.store.cache().store().is_empty());
        assert_eq!(h.store.phase(), Phase::NoConversation);
        // Pending stop is dropped, not emitted.
        assert_eq!(h.channel.emitted(), vec![OutboundEvent::typing("u1")]);
    }

    #[tokio::test]
    async fn dropping_store_releases_listeners() {
        let h = harness();
        h.store.select_peer("u1").await;
        assert_eq!(h.channel.total_listeners(), 3);

        drop(h.store);

        assert_eq!(h.channel.total_listeners(), 0);
    }

    // ===========================================
    // Ordering / Runtime Tests
    // ===========================================

    #[tokio::test]
    async fn older_peer_refresh_finishing_last_is_discarded() {
        let h = harness();
        let older = h.api.defer_peers();
        let newer = h.api.defer_peers();

        let first = {
            let store = h.store.clone();
            tokio::spawn(async move { store.refresh_peers().await })
        };
        settle().await;
        let second = {
            let store = h.store.clone();
            tokio::spawn(async move { store.refresh_peers().await })
        };
        settle().await;
        assert!(h.store.is_users_loading());

        newer.resolve(vec![Peer::new("u1", "Ada")]);
        second.await.unwrap();
        older.resolve(vec![Peer::new("u1", "Ada").with_unread(3)]);
        first.await.unwrap();

        let u1 = UserId::new("u1");
        assert_eq!(h.store.unread_count(&u1), 0);
        assert!(!h.store.is_users_loading());
        let cached = h.store.cache().cached_users().unwrap();
        assert_eq!(cached[0].unread_count, 0);
        assert_eq!(h.store.cache().cached_user(&u1).unwrap().unread_count, 0);
    }

    #[test]
    fn typing_from_thread_without_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let channel = MockPushChannel::new();
        let store = ConversationStore::builder(MockChatApi::new(), Arc::new(channel.clone()))
            .config(ChatConfig::default().with_stop_delay_ms(20))
            .runtime(runtime.handle().clone())
            .build();
        runtime.block_on(store.select_peer("u1"));

        store.typing_input();
        assert_eq!(channel.emitted(), vec![OutboundEvent::typing("u1")]);

        runtime.block_on(async {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        });
        assert_eq!(
            channel.emitted(),
            vec![OutboundEvent::typing("u1"), OutboundEvent::stop_typing("u1")]
        );
    }

    #[test]
    fn store_without_any_runtime_does_not_panic() {
        let channel = MockPushChannel::new();
        let store = ConversationStore::new(MockChatApi::new(), Arc::new(channel.clone()));

        store.cache().cache_user(&Peer::new("u1", "Ada"));
        store.typing_input();
        store.deselect();
        store.shutdown();

        assert!(channel.emitted().is_empty());
        assert!(store.cache().store().is_empty());
    }
}
