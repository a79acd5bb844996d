//! Outgoing typing indicator.
//!
//! A typing burst starts with one `typing{to}` signal and ends with one
//! `stopTyping{to}`, either after a period without input or immediately when
//! the input loses focus. Inputs inside a burst only push the stop deadline
//! back.
//!
//! Stop timers run on the caller's runtime, else on the runtime current when
//! the controller was created. With neither, a burst ends only on blur, send
//! or peer switch.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use swiftchat_types::{OutboundEvent, UserId};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::push::PushChannel;
use crate::{lock, runtime_handle};

/// Default inactivity before the stop signal (1 second).
pub const DEFAULT_STOP_DELAY: Duration = Duration::from_millis(1000);

struct Burst {
    peer: UserId,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Burst {
    fn stop_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct TypingInner {
    burst: Option<Burst>,
    next_generation: u64,
}

/// Debounced typing signals for the active conversation.
#[derive(Clone)]
pub struct TypingController {
    channel: Arc<dyn PushChannel>,
    stop_delay: Duration,
    runtime: Option<Handle>,
    inner: Arc<Mutex<TypingInner>>,
}

impl std::fmt::Debug for TypingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let burst = lock(&self.inner).burst.as_ref().map(|b| b.peer.clone());
        f.debug_struct("TypingController")
            .field("stop_delay", &self.stop_delay)
            .field("burst", &burst)
            .finish()
    }
}

impl TypingController {
    /// Create a controller emitting on `channel`.
    pub fn new(channel: Arc<dyn PushChannel>, stop_delay: Duration) -> Self {
        Self {
            channel,
            stop_delay,
            runtime: Handle::try_current().ok(),
            inner: Arc::new(Mutex::new(TypingInner::default())),
        }
    }

    /// Run stop timers on `runtime` when the caller has none.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Inactivity before the stop signal.
    pub fn stop_delay(&self) -> Duration {
        self.stop_delay
    }

    /// The peer of the running burst, if any.
    pub fn burst_peer(&self) -> Option<UserId> {
        lock(&self.inner).burst.as_ref().map(|b| b.peer.clone())
    }

    /// The user changed the draft while `peer` is active.
    pub fn on_input(&self, peer: Option<&UserId>) {
        let Some(peer) = peer else {
            return;
        };

        let mut emits = Vec::new();
        {
            let mut inner = lock(&self.inner);
            let starting = match inner.burst.take() {
                Some(burst) => {
                    burst.stop_timer();
                    if &burst.peer != peer {
                        emits.push(OutboundEvent::stop_typing(burst.peer));
                        true
                    } else {
                        false
                    }
                }
                None => true,
            };
            if starting {
                emits.push(OutboundEvent::typing(peer.clone()));
            }

            inner.next_generation = inner.next_generation.wrapping_add(1);
            let generation = inner.next_generation;
            let timer = self.spawn_stop_timer(generation);
            inner.burst = Some(Burst {
                peer: peer.clone(),
                generation,
                timer,
            });
        }

        self.emit_all(emits);
    }

    /// The input lost focus while `peer` is active.
    ///
    /// Emits the stop signal now; the pending one never fires.
    pub fn on_blur(&self, peer: Option<&UserId>) {
        let mut emits = Vec::new();
        if let Some(burst) = lock(&self.inner).burst.take() {
            burst.stop_timer();
            if Some(&burst.peer) != peer {
                emits.push(OutboundEvent::stop_typing(burst.peer));
            }
        }
        if let Some(peer) = peer {
            emits.push(OutboundEvent::stop_typing(peer.clone()));
        }
        self.emit_all(emits);
    }

    /// End a running burst now, emitting its stop signal.
    pub fn end_burst(&self) {
        let burst = lock(&self.inner).burst.take();
        if let Some(burst) = burst {
            burst.stop_timer();
            self.emit_all(vec![OutboundEvent::stop_typing(burst.peer)]);
        }
    }

    /// Drop a running burst without emitting anything.
    pub fn cancel(&self) {
        if let Some(burst) = lock(&self.inner).burst.take() {
            burst.stop_timer();
        }
    }

    fn spawn_stop_timer(&self, generation: u64) -> Option<JoinHandle<()>> {
        let Some(runtime) = runtime_handle(self.runtime.as_ref()) else {
            tracing::warn!("No async runtime; typing stop waits for blur or send");
            return None;
        };
        let inner: Weak<Mutex<TypingInner>> = Arc::downgrade(&self.inner);
        let channel = Arc::clone(&self.channel);
        let delay = self.stop_delay;
        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let peer = {
                let mut inner = lock(&inner);
                // Superseded by a later input between wake-up and lock.
                match inner.burst.take() {
                    Some(burst) if burst.generation == generation => burst.peer,
                    other => {
                        inner.burst = other;
                        return;
                    }
                }
            };
            emit(channel.as_ref(), OutboundEvent::stop_typing(peer));
        }))
    }

    fn emit_all(&self, events: Vec<OutboundEvent>) {
        for event in events {
            emit(self.channel.as_ref(), event);
        }
    }
}

fn emit(channel: &dyn PushChannel, event: OutboundEvent) {
    let name = event.name();
    if let Err(e) = channel.emit(event) {
        tracing::warn!("Failed to emit {}: {}", name, e);
    }
}
