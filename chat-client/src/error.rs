//! Error types for swiftchat-client.

use swiftchat_core::{DraftError, Report};
use swiftchat_types::ApiError;
use thiserror::Error;

/// Errors returned by [`ConversationStore`](crate::ConversationStore) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The remote call failed. Already reported to the notifier.
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// The operation needs an open conversation.
    #[error("no active conversation")]
    NoActivePeer,

    /// The draft was rejected before any remote call.
    #[error("invalid draft: {0}")]
    InvalidDraft(#[from] DraftError),
}

impl ClientError {
    /// The remote failure, if this error came from the service.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Classification of a remote failure, for callers deciding whether to offer a retry.
    pub fn report(&self, default: &str) -> Option<Report> {
        self.api_error().map(|e| swiftchat_core::report(e, default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(ClientError::NoActivePeer.to_string(), "no active conversation");
        assert_eq!(
            ClientError::from(ApiError::status(404)).to_string(),
            "api error: status 404"
        );
        assert_eq!(
            ClientError::from(DraftError::Empty).to_string(),
            "invalid draft: message has neither text nor image"
        );
    }

    #[test]
    fn report_only_for_remote_failures() {
        let err = ClientError::from(ApiError::status(503));
        let report = err.report("x").unwrap();
        assert!(report.retryable);

        assert!(ClientError::NoActivePeer.report("x").is_none());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClientError>();
    }
}
