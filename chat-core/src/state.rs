//! Conversation state machine for swiftchat.
//!
//! This module provides a pure, side-effect-free state machine for the
//! conversation view: which peer is active, the messages of that
//! conversation, the peer list, loading flags and the typing flag. It takes
//! events as input, mutates itself, and returns a list of actions to execute.
//!
//! The actual I/O (remote calls, push channel listeners) is performed by
//! swiftchat-client, not by this module.
//!
//! # Stale responses
//!
//! Every history fetch is tagged with a [`FetchTicket`]. A response is applied
//! only while the state is still loading for that exact ticket; anything else
//! is dropped, so a slow response for a previous selection can never
//! overwrite the current conversation.

use swiftchat_types::{InboundEvent, Message, MessageId, Peer, UserId};

/// Tag carried by an in-flight history fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTicket {
    peer: UserId,
    seq: u64,
}

impl FetchTicket {
    /// The peer whose history was requested.
    pub fn peer(&self) -> &UserId {
        &self.peer
    }

    /// Sequence number of the selection that issued the fetch.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Tag carried by an in-flight peer-list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeersTicket {
    seq: u64,
}

impl PeersTicket {
    /// Sequence number of the fetch, increasing with every start.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Where the conversation view is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No conversation is open.
    NoConversation,
    /// A peer was selected and its history is being fetched.
    MessagesLoading {
        /// The active peer.
        peer: UserId,
        /// Ticket of the history fetch that will settle this phase.
        ticket: FetchTicket,
    },
    /// A peer is active and its history has settled (loaded or failed).
    ConversationSelected {
        /// The active peer.
        peer: UserId,
    },
}

impl Phase {
    /// The active peer, if any.
    pub fn peer(&self) -> Option<&UserId> {
        match self {
            Self::NoConversation => None,
            Self::MessagesLoading { peer, .. } | Self::ConversationSelected { peer } => Some(peer),
        }
    }
}

/// Conversation state machine - NO I/O, just state transitions.
#[derive(Debug, Clone)]
pub struct ConversationState {
    phase: Phase,
    messages: Vec<Message>,
    peers: Vec<Peer>,
    peers_in_flight: u32,
    peers_seq: u64,
    typing: bool,
    next_seq: u64,
}

impl ConversationState {
    /// Create a new state machine with no conversation open.
    pub fn new() -> Self {
        Self {
            phase: Phase::NoConversation,
            messages: Vec::new(),
            peers: Vec::new(),
            peers_in_flight: 0,
            peers_seq: 0,
            typing: false,
            next_seq: 0,
        }
    }

    /// Process an event and return the actions to execute.
    ///
    /// The caller (swiftchat-client) is responsible for executing the
    /// returned actions, in order.
    pub fn on_event(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::PeerSelected { peer } => self.select(peer),

            Event::Deselected => {
                if matches!(self.phase, Phase::NoConversation) {
                    return vec![];
                }
                self.phase = Phase::NoConversation;
                self.messages.clear();
                self.typing = false;
                vec![Action::ReleaseSubscription, Action::EndTypingBurst]
            }

            Event::HistoryLoaded { ticket, messages } => {
                if self.is_current(&ticket) {
                    self.messages = messages;
                    self.phase = Phase::ConversationSelected { peer: ticket.peer };
                }
                vec![]
            }
            Event::HistoryFailed { ticket } => {
                if self.is_current(&ticket) {
                    self.phase = Phase::ConversationSelected { peer: ticket.peer };
                }
                vec![]
            }

            Event::PeersLoadStarted => {
                self.peers_in_flight = self.peers_in_flight.saturating_add(1);
                self.peers_seq = self.peers_seq.wrapping_add(1);
                vec![]
            }
            Event::PeersLoaded { ticket, peers } => {
                self.peers_in_flight = self.peers_in_flight.saturating_sub(1);
                // An older fetch finishing last must not overwrite a newer list.
                if self.is_latest_peers(&ticket) {
                    self.peers = peers;
                }
                vec![]
            }
            Event::PeersLoadFailed { .. } => {
                self.peers_in_flight = self.peers_in_flight.saturating_sub(1);
                vec![]
            }

            Event::MessageSent { to, message } => {
                if self.phase.peer() == Some(&to) {
                    upsert(&mut self.messages, message);
                }
                vec![Action::RefreshPeers]
            }
            Event::MessageEdited { message } => {
                if let Some(slot) = self.messages.iter_mut().find(|m| m.id == message.id) {
                    *slot = message;
                }
                vec![]
            }
            Event::MessageDeleted { id } => {
                self.messages.retain(|m| m.id != id);
                vec![]
            }

            Event::PushReceived { event } => self.on_push(event),
        }
    }

    fn select(&mut self, peer: UserId) -> Vec<Action> {
        if self.phase.peer() == Some(&peer) {
            return vec![Action::MarkRead { peer }, Action::RefreshPeers];
        }

        // Clear before anything goes on the wire.
        self.messages.clear();
        self.typing = false;
        self.next_seq = self.next_seq.wrapping_add(1);
        let ticket = FetchTicket {
            peer: peer.clone(),
            seq: self.next_seq,
        };
        self.phase = Phase::MessagesLoading {
            peer: peer.clone(),
            ticket: ticket.clone(),
        };

        vec![
            Action::AcquireSubscription { peer: peer.clone() },
            Action::FetchHistory { ticket },
            Action::MarkRead { peer },
            Action::RefreshPeers,
        ]
    }

    fn on_push(&mut self, event: InboundEvent) -> Vec<Action> {
        match event {
            InboundEvent::NewMessage(message) => {
                if self.phase.peer().is_some_and(|peer| message.is_from(peer)) {
                    upsert(&mut self.messages, message);
                    vec![]
                } else {
                    vec![Action::RefreshPeers]
                }
            }
            InboundEvent::Typing(signal) => {
                if self.phase.peer() == Some(&signal.from) {
                    self.typing = true;
                }
                vec![]
            }
            InboundEvent::StopTyping(signal) => {
                if self.phase.peer() == Some(&signal.from) {
                    self.typing = false;
                }
                vec![]
            }
        }
    }

    /// Check whether a history response for `ticket` would be applied.
    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        matches!(&self.phase, Phase::MessagesLoading { ticket: current, .. } if current == ticket)
    }

    /// Current phase.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The active peer, if any.
    pub fn active_peer(&self) -> Option<&UserId> {
        self.phase.peer()
    }

    /// Messages of the active conversation, in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The last known peer list.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Look up a peer in the last known peer list.
    pub fn peer(&self, id: &UserId) -> Option<&Peer> {
        self.peers.iter().find(|p| &p.id == id)
    }

    /// Ticket of the most recently started peer-list fetch.
    pub fn peers_ticket(&self) -> PeersTicket {
        PeersTicket {
            seq: self.peers_seq,
        }
    }

    /// Check whether a peer-list response for `ticket` would be applied.
    pub fn is_latest_peers(&self, ticket: &PeersTicket) -> bool {
        ticket.seq == self.peers_seq
    }

    /// Whether a peer-list fetch is in flight.
    pub fn is_users_loading(&self) -> bool {
        self.peers_in_flight > 0
    }

    /// Whether the active conversation's history is being fetched.
    pub fn is_messages_loading(&self) -> bool {
        matches!(self.phase, Phase::MessagesLoading { .. })
    }

    /// Whether the active peer is typing.
    pub fn is_typing(&self) -> bool {
        self.typing
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a message, or replace the one already carrying its id.
fn upsert(messages: &mut Vec<Message>, message: Message) {
    match messages.iter_mut().find(|m| m.id == message.id) {
        Some(existing) => *existing = message,
        None => messages.push(message),
    }
}

/// Events that can occur in the conversation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User selected a peer.
    PeerSelected {
        /// The peer to open.
        peer: UserId,
    },
    /// User closed the conversation.
    Deselected,
    /// A history fetch succeeded.
    HistoryLoaded {
        /// Ticket the fetch was issued with.
        ticket: FetchTicket,
        /// The conversation, oldest first.
        messages: Vec<Message>,
    },
    /// A history fetch failed.
    HistoryFailed {
        /// Ticket the fetch was issued with.
        ticket: FetchTicket,
    },
    /// A peer-list fetch started.
    PeersLoadStarted,
    /// A peer-list fetch succeeded (or was served from cache).
    PeersLoaded {
        /// Ticket the fetch was issued with.
        ticket: PeersTicket,
        /// The peer list.
        peers: Vec<Peer>,
    },
    /// A peer-list fetch failed.
    PeersLoadFailed {
        /// Ticket the fetch was issued with.
        ticket: PeersTicket,
    },
    /// The remote service accepted a message.
    MessageSent {
        /// The peer the message was addressed to.
        to: UserId,
        /// The canonical message.
        message: Message,
    },
    /// The remote service accepted an edit.
    MessageEdited {
        /// The canonical, edited message.
        message: Message,
    },
    /// The remote service deleted a message.
    MessageDeleted {
        /// Id of the deleted message.
        id: MessageId,
    },
    /// An event arrived on the push channel.
    PushReceived {
        /// The inbound event.
        event: InboundEvent,
    },
}

/// Actions to be executed by swiftchat-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Bind the push handlers for a newly active peer, replacing any previous binding.
    AcquireSubscription {
        /// The newly active peer.
        peer: UserId,
    },
    /// Unbind the push handlers.
    ReleaseSubscription,
    /// Fetch the message history for the ticket's peer.
    FetchHistory {
        /// Ticket to hand back with the result.
        ticket: FetchTicket,
    },
    /// Mark messages from a peer as read on the remote service.
    MarkRead {
        /// The peer whose messages were read.
        peer: UserId,
    },
    /// Re-fetch the peer list, bypassing the cache.
    RefreshPeers,
    /// Stop any outgoing typing burst.
    EndTypingBurst,
}
