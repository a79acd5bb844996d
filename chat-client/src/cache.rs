//! TTL cache for swiftchat.
//!
//! A key/value store where every entry carries its own deadline. Eviction is
//! driven by a tokio timer task per entry; reads also check the deadline, so
//! an entry is never returned at or after it even if its timer has not run.
//! Without a runtime to spawn on, entries expire on read only.
//!
//! Cloning a [`TtlCache`] shares the same store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use swiftchat_types::{Peer, UserId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::{lock, runtime_handle};

/// Default time-to-live for entries (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache key of the peer list.
pub const USERS_KEY: &str = "users";

struct Entry<V> {
    value: V,
    deadline: Instant,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.deadline
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct CacheInner<V> {
    entries: HashMap<String, Entry<V>>,
    next_generation: u64,
}

/// Key/value store with per-entry expiry.
///
/// Absent and expired are indistinguishable to callers. There is no
/// enumeration and no size bound.
pub struct TtlCache<V> {
    inner: Arc<Mutex<CacheInner<V>>>,
    default_ttl: Duration,
    runtime: Option<Handle>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            default_ttl: self.default_ttl,
            runtime: self.runtime.clone(),
        }
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = lock(&self.inner).entries.len();
        f.debug_struct("TtlCache")
            .field("entries", &entries)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<V: Clone + Send + 'static> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Send + 'static> TtlCache<V> {
    /// Create an empty cache with the 5 minute default TTL.
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    /// Create an empty cache with a custom default TTL.
    ///
    /// Eviction timers run on the caller's runtime, else on the runtime
    /// current at construction.
    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_generation: 0,
            })),
            default_ttl,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Run eviction timers on `runtime` when the caller has none.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// The TTL used by [`TtlCache::set_default`].
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key`, expiring after `ttl`.
    ///
    /// Replacing an existing entry cancels its eviction timer first.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let deadline = Instant::now() + ttl;

        let mut inner = lock(&self.inner);
        if let Some(mut old) = inner.entries.remove(&key) {
            old.cancel_timer();
        }
        inner.next_generation = inner.next_generation.wrapping_add(1);
        let generation = inner.next_generation;

        let timer = runtime_handle(self.runtime.as_ref()).map(|runtime| {
            spawn_eviction(
                &runtime,
                Arc::downgrade(&self.inner),
                key.clone(),
                generation,
                deadline,
            )
        });
        inner.entries.insert(
            key,
            Entry {
                value,
                deadline,
                generation,
                timer,
            },
        );
    }

    /// Store `value` under `key` with the default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Get a live entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut inner = lock(&self.inner);
        match inner.entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                // Past its deadline; the timer has not caught up yet.
                if let Some(mut expired) = inner.entries.remove(key) {
                    expired.cancel_timer();
                }
                None
            }
            None => None,
        }
    }

    /// Check whether a live entry exists.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        lock(&self.inner)
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live(now))
    }

    /// Remove an entry and cancel its timer.
    pub fn delete(&self, key: &str) {
        if let Some(mut entry) = lock(&self.inner).entries.remove(key) {
            entry.cancel_timer();
        }
    }

    /// Remove every entry and cancel every timer.
    pub fn clear(&self) {
        let mut inner = lock(&self.inner);
        for (_, mut entry) in inner.entries.drain() {
            entry.cancel_timer();
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        lock(&self.inner)
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    /// True when there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn spawn_eviction<V: Send + 'static>(
    runtime: &Handle,
    inner: Weak<Mutex<CacheInner<V>>>,
    key: String,
    generation: u64,
    deadline: Instant,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        tokio::time::sleep_until(deadline).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut inner = lock(&inner);
        // A newer value may have replaced ours between wake-up and lock.
        if inner.entries.get(&key).map(|e| e.generation) == Some(generation) {
            inner.entries.remove(&key);
            tracing::trace!(key = %key, "cache entry expired");
        }
    })
}

/// A value held by [`ChatCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    /// A single peer, under `user:<id>`.
    Peer(Peer),
    /// The peer list, under `users`.
    Peers(Vec<Peer>),
}

/// Peer cache used by the conversation store.
///
/// Keys follow the `user:<id>` / `users` layout; TTLs come from
/// [`CacheConfig`].
#[derive(Debug, Clone)]
pub struct ChatCache {
    cache: TtlCache<CachedValue>,
    users_ttl: Duration,
    user_ttl: Duration,
}

impl Default for ChatCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

impl ChatCache {
    /// Create a cache with the given TTLs.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            cache: TtlCache::with_default_ttl(config.default_ttl()),
            users_ttl: config.users_ttl(),
            user_ttl: config.user_ttl(),
        }
    }

    fn user_key(id: &UserId) -> String {
        format!("user:{}", id)
    }

    /// Cache a single peer. Peers without an id are skipped.
    pub fn cache_user(&self, peer: &Peer) {
        if peer.id.is_empty() {
            return;
        }
        self.cache.set(
            Self::user_key(&peer.id),
            CachedValue::Peer(peer.clone()),
            self.user_ttl,
        );
    }

    /// A cached peer, if live.
    pub fn cached_user(&self, id: &UserId) -> Option<Peer> {
        if id.is_empty() {
            return None;
        }
        match self.cache.get(&Self::user_key(id)) {
            Some(CachedValue::Peer(peer)) => Some(peer),
            _ => None,
        }
    }

    /// Cache the peer list.
    pub fn cache_users(&self, peers: &[Peer]) {
        self.cache
            .set(USERS_KEY, CachedValue::Peers(peers.to_vec()), self.users_ttl);
    }

    /// The cached peer list, if live.
    pub fn cached_users(&self) -> Option<Vec<Peer>> {
        match self.cache.get(USERS_KEY) {
            Some(CachedValue::Peers(peers)) => Some(peers),
            _ => None,
        }
    }

    /// Drop the cached peer list.
    pub fn invalidate_users(&self) {
        self.cache.delete(USERS_KEY);
    }

    /// Run eviction timers on `runtime` when the caller has none.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.cache = self.cache.with_runtime(runtime);
        self
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// The underlying store.
    pub fn store(&self) -> &TtlCache<CachedValue> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, sleep};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // ===========================================
    // TtlCache Expiry Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn entry_visible_before_deadline() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, ms(100));

        advance(ms(99)).await;

        assert_eq!(cache.get("k"), Some(1));
        assert!(cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn entry_absent_at_deadline() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, ms(100));

        advance(ms(100)).await;

        assert_eq!(cache.get("k"), None);
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_evicts_entry() {
        let cache = TtlCache::new();
        cache.set("k", "v".to_string(), ms(100));
        assert_eq!(cache.len(), 1);

        sleep(ms(150)).await;

        assert!(cache.is_empty());
        assert_eq!(lock(&cache.inner).entries.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_moves_deadline() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, ms(100));
        advance(ms(80)).await;
        cache.set("k", 1u32, ms(100));

        advance(ms(80)).await;

        assert_eq!(cache.get("k"), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_cancels_old_timer() {
        let cache = TtlCache::new();
        cache.set("k", "first", ms(100));
        sleep(ms(50)).await;
        cache.set("k", "second", ms(100));

        // Past the first deadline, before the second.
        sleep(ms(70)).await;

        assert_eq!(cache.get("k"), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_default_uses_configured_ttl() {
        let cache = TtlCache::with_default_ttl(ms(10));
        cache.set_default("k", 7u8);

        sleep(ms(5)).await;
        assert!(cache.has("k"));

        sleep(ms(10)).await;
        assert!(!cache.has("k"));
    }

    // ===========================================
    // TtlCache Operation Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn delete_removes_entry_and_timer() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, ms(100));

        cache.delete("k");

        assert_eq!(cache.get("k"), None);
        assert!(lock(&cache.inner).entries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn delete_missing_key_is_noop() {
        let cache: TtlCache<u32> = TtlCache::new();
        cache.delete("nope");
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_drops_everything() {
        let cache = TtlCache::new();
        cache.set("a", 1u32, ms(100));
        cache.set("b", 2u32, ms(200));

        cache.clear();

        assert!(cache.is_empty());
        assert!(!cache.has("a"));
        assert!(!cache.has("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_store() {
        let cache = TtlCache::new();
        let other = cache.clone();

        cache.set("k", 1u32, ms(100));

        assert_eq!(other.get("k"), Some(1));
        other.delete("k");
        assert!(!cache.has("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_cache_stops_timers_quietly() {
        let cache = TtlCache::new();
        cache.set("k", 1u32, ms(100));
        drop(cache);

        // The eviction task wakes, finds nothing to upgrade, and exits.
        sleep(ms(150)).await;
    }

    // ===========================================
    // ChatCache Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn users_expire_after_five_minutes() {
        let cache = ChatCache::default();
        cache.cache_users(&[Peer::new("u1", "Ada")]);

        advance(Duration::from_secs(299)).await;
        assert_eq!(cache.cached_users().map(|p| p.len()), Some(1));

        advance(Duration::from_secs(1)).await;
        assert!(cache.cached_users().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn single_user_lives_ten_minutes() {
        let cache = ChatCache::default();
        let peer = Peer::new("u1", "Ada");
        cache.cache_user(&peer);

        advance(Duration::from_secs(9 * 60)).await;
        assert_eq!(cache.cached_user(&UserId::new("u1")), Some(peer));

        advance(Duration::from_secs(60)).await;
        assert!(cache.cached_user(&UserId::new("u1")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn peer_without_id_is_not_cached() {
        let cache = ChatCache::default();
        cache.cache_user(&Peer::new("", "Nobody"));
        assert!(cache.store().is_empty());
        assert!(cache.cached_user(&UserId::new("")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_users_keeps_single_entries() {
        let cache = ChatCache::default();
        let peer = Peer::new("u1", "Ada");
        cache.cache_users(std::slice::from_ref(&peer));
        cache.cache_user(&peer);

        cache.invalidate_users();

        assert!(cache.cached_users().is_none());
        assert!(cache.cached_user(&peer.id).is_some());
        assert!(cache.store().has("user:u1"));
    }

    // ===========================================
    // Runtime Tests
    // ===========================================

    #[test]
    fn expires_on_read_without_runtime() {
        let cache = TtlCache::new();

        cache.set("live", 1, Duration::from_secs(60));
        cache.set("gone", 2, Duration::ZERO);

        assert_eq!(cache.get("live"), Some(1));
        assert_eq!(cache.get("gone"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_on_given_runtime_from_outside_it() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let cache = TtlCache::new().with_runtime(runtime.handle().clone());

        cache.set("k", 1, ms(10));
        runtime.block_on(async { sleep(ms(50)).await });

        assert_eq!(lock(&cache.inner).entries.len(), 0);
    }
}
