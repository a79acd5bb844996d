//! Push channel events.
//!
//! The push channel carries named events with a JSON payload. Inbound events
//! arrive from the server; outbound events are emitted by the local client.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Message, UserId};

/// Names of the inbound events a conversation listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PushEventKind {
    /// A message addressed to the local user.
    NewMessage,
    /// A peer started typing.
    Typing,
    /// A peer stopped typing.
    StopTyping,
}

impl PushEventKind {
    /// Every event kind a conversation binds.
    pub const ALL: [PushEventKind; 3] = [Self::NewMessage, Self::Typing, Self::StopTyping];

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage => "newMessage",
            Self::Typing => "typing",
            Self::StopTyping => "stopTyping",
        }
    }

    /// Parse a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "newMessage" => Some(Self::NewMessage),
            "typing" => Some(Self::Typing),
            "stopTyping" => Some(Self::StopTyping),
            _ => None,
        }
    }
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of an inbound typing signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingFrom {
    /// The peer who is typing.
    pub from: UserId,
}

/// Payload of an outbound typing signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingTo {
    /// The peer being typed to.
    pub to: UserId,
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
    /// A new message was sent to the local user.
    #[serde(rename = "newMessage")]
    NewMessage(Message),
    /// A peer started typing to the local user.
    #[serde(rename = "typing")]
    Typing(TypingFrom),
    /// A peer stopped typing to the local user.
    #[serde(rename = "stopTyping")]
    StopTyping(TypingFrom),
}

impl InboundEvent {
    /// Decode an event from its wire name and JSON payload.
    ///
    /// Returns `Ok(None)` for event names this engine does not consume.
    pub fn from_parts(
        name: &str,
        data: serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let event = match PushEventKind::from_name(name) {
            Some(PushEventKind::NewMessage) => Self::NewMessage(serde_json::from_value(data)?),
            Some(PushEventKind::Typing) => Self::Typing(serde_json::from_value(data)?),
            Some(PushEventKind::StopTyping) => Self::StopTyping(serde_json::from_value(data)?),
            None => return Ok(None),
        };
        Ok(Some(event))
    }

    /// The kind of this event.
    pub fn kind(&self) -> PushEventKind {
        match self {
            Self::NewMessage(_) => PushEventKind::NewMessage,
            Self::Typing(_) => PushEventKind::Typing,
            Self::StopTyping(_) => PushEventKind::StopTyping,
        }
    }

    /// A typing-start signal from `from`.
    pub fn typing(from: impl Into<UserId>) -> Self {
        Self::Typing(TypingFrom { from: from.into() })
    }

    /// A typing-stop signal from `from`.
    pub fn stop_typing(from: impl Into<UserId>) -> Self {
        Self::StopTyping(TypingFrom { from: from.into() })
    }
}

/// Events emitted by the local client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundEvent {
    /// The local user started typing to a peer.
    #[serde(rename = "typing")]
    Typing(TypingTo),
    /// The local user stopped typing to a peer.
    #[serde(rename = "stopTyping")]
    StopTyping(TypingTo),
}

impl OutboundEvent {
    /// A typing-start signal addressed to `to`.
    pub fn typing(to: impl Into<UserId>) -> Self {
        Self::Typing(TypingTo { to: to.into() })
    }

    /// A typing-stop signal addressed to `to`.
    pub fn stop_typing(to: impl Into<UserId>) -> Self {
        Self::StopTyping(TypingTo { to: to.into() })
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Typing(_) => "typing",
            Self::StopTyping(_) => "stopTyping",
        }
    }

    /// The addressee.
    pub fn to(&self) -> &UserId {
        match self {
            Self::Typing(t) | Self::StopTyping(t) => &t.to,
        }
    }

    /// The JSON payload that goes on the wire under [`OutboundEvent::name`].
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::Typing(t) | Self::StopTyping(t) => serde_json::json!({ "to": t.to }),
        }
    }
}
