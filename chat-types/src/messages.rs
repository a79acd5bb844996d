//! Message and peer records for swiftchat.
//!
//! Field names on the wire follow the remote JSON API (`_id`, `senderId`,
//! `createdAt`, ...). Everything the remote omits falls back to a default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, UserId};

/// Delivery status of a message, as tracked by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Accepted by the server.
    #[default]
    Sent,
    /// Delivered to the recipient's device.
    Delivered,
    /// Read by the recipient.
    Read,
}

/// A canonical message record returned by the remote service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Server-assigned identifier.
    #[serde(rename = "_id")]
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Addressee of the message.
    pub receiver_id: UserId,
    /// Text body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image reference (URL) or inline data URI, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Message this one replies to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
    /// Server creation time.
    pub created_at: DateTime<Utc>,
    /// Delivery status.
    #[serde(default)]
    pub status: DeliveryStatus,
    /// Whether the text was edited after creation.
    #[serde(default)]
    pub is_edited: bool,
    /// Time of the last edit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Message {
    /// Check whether this message was authored by `user`.
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("id", &self.id)
            .field("sender_id", &self.sender_id)
            .field("receiver_id", &self.receiver_id)
            .field(
                "text",
                &self.text.as_ref().map(|t| format!("[{} chars]", t.chars().count())),
            )
            .field(
                "image",
                &self.image.as_ref().map(|i| format!("[{} bytes]", i.len())),
            )
            .field("reply_to", &self.reply_to)
            .field("created_at", &self.created_at)
            .field("status", &self.status)
            .field("is_edited", &self.is_edited)
            .finish()
    }
}

/// A message draft submitted by the local user.
///
/// Drafts are never shown as part of a conversation; only the canonical
/// [`Message`] echoed by the remote service is.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    /// Text body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image payload (URL or inline data URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Message being replied to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

impl OutgoingMessage {
    /// A text-only draft.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// An image-only draft.
    pub fn image(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            ..Self::default()
        }
    }

    /// Attach an image to the draft.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Mark the draft as a reply.
    pub fn replying_to(mut self, id: MessageId) -> Self {
        self.reply_to = Some(id);
        self
    }
}

impl std::fmt::Debug for OutgoingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutgoingMessage")
            .field(
                "text",
                &self.text.as_ref().map(|t| format!("[{} chars]", t.chars().count())),
            )
            .field(
                "image",
                &self.image.as_ref().map(|i| format!("[{} bytes]", i.len())),
            )
            .field("reply_to", &self.reply_to)
            .finish()
    }
}

/// Denormalized summary of the last message exchanged with a peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessagePreview {
    /// Text of the last message, if it had any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Image of the last message, if it had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// When the last message was sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A conversation counterpart as listed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    /// User identifier.
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name.
    pub full_name: String,
    /// Avatar reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
    /// Summary of the last exchanged message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<LastMessagePreview>,
    /// Messages from this peer not yet marked read.
    #[serde(default)]
    pub unread_count: u32,
    /// Whether the local user pinned this peer.
    #[serde(default)]
    pub is_favorite: bool,
}

impl Peer {
    /// A peer with only an id and a display name.
    pub fn new(id: impl Into<UserId>, full_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            profile_pic: None,
            last_message: None,
            unread_count: 0,
            is_favorite: false,
        }
    }

    /// Set the unread count.
    pub fn with_unread(mut self, unread_count: u32) -> Self {
        self.unread_count = unread_count;
        self
    }
}
