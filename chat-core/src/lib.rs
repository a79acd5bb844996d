//! # chat-core
//!
//! Pure logic for swiftchat (no I/O, instant tests).
//!
//! This crate implements the conversation state machine, draft validation
//! and error classification without any network or timer I/O, enabling
//! fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (remote calls, push listeners, timers) is performed by
//! `chat-client`, which interprets the actions produced by these state
//! machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod report;
pub mod state;
pub mod validate;

pub use report::{
    classify, report, user_message, validation_messages, ClientErrorKind, ErrorKind, Report,
    DEFAULT_MESSAGE,
};
pub use state::{Action, ConversationState, Event, FetchTicket, PeersTicket, Phase};
pub use validate::{
    validate_draft, DraftError, DraftLimits, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_TEXT_LEN,
};
