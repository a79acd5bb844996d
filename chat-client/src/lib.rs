//! # chat-client
//!
//! Client-side sync engine for swiftchat direct messaging.
//!
//! This is the main library that applications use to drive a conversation
//! view against the remote chat service.
//!
//! ## Features
//!
//! - **Conversation Store**: one owner for the active peer, its messages and the peer list
//! - **Push Subscriptions**: at most one listener set per event name on a shared channel
//! - **Typing Signals**: debounced typing/stop-typing bursts
//! - **TTL Cache**: peer records expire on timers, reads never see stale entries
//! - **Pure State Machine**: Uses chat-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use swiftchat_client::{ChatConfig, ConversationStore, HttpChatApi};
//!
//! let config = ChatConfig::default();
//! let api = HttpChatApi::new(&config.api)?;
//! let store = ConversationStore::builder(api, channel).config(config).build();
//!
//! store.load_peers().await?;
//! store.select_peer("u1").await;
//! store.send_message(OutgoingMessage::text("hello")).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod push;
pub mod store;
pub mod subscription;
pub mod typing;

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;

pub use api::{
    ApiCall, ChatApi, Deferred, DeferredHistory, DeferredPeers, HttpChatApi, MockChatApi,
};
pub use cache::{CachedValue, ChatCache, TtlCache, DEFAULT_TTL, USERS_KEY};
pub use config::{ApiConfig, CacheConfig, ChatConfig, ConfigError, LimitsConfig, TypingConfig};
pub use error::ClientError;
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};
pub use push::{ListenerId, MockPushChannel, PushChannel, PushError, PushHandler};
pub use store::{ConversationStore, StoreBuilder};
pub use subscription::{PushSubscription, PushSubscriptionManager};
pub use typing::{TypingController, DEFAULT_STOP_DELAY};

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The runtime to spawn background work on: the caller's, else `fallback`.
pub(crate) fn runtime_handle(fallback: Option<&Handle>) -> Option<Handle> {
    Handle::try_current().ok().or_else(|| fallback.cloned())
}
