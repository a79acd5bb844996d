//! # swiftchat-types
//!
//! Wire format types for the swiftchat direct-messaging sync engine.
//!
//! This crate provides the foundational types used across all swiftchat crates:
//! - [`UserId`], [`MessageId`] - Identity types assigned by the remote service
//! - [`Message`], [`OutgoingMessage`] - Canonical records and unconfirmed drafts
//! - [`Peer`] - A conversation counterpart as listed by the remote service
//! - [`InboundEvent`], [`OutboundEvent`] - Push channel events
//! - [`ApiError`] - Failure shape of remote calls

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod messages;

pub use error::{ApiError, ApiFailure};
pub use events::{InboundEvent, OutboundEvent, PushEventKind, TypingFrom, TypingTo};
pub use ids::{MessageId, UserId};
pub use messages::{DeliveryStatus, LastMessagePreview, Message, OutgoingMessage, Peer};
