//! Error types for swiftchat remote calls.

use thiserror::Error;

/// How a remote call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFailure {
    /// The service could not be reached.
    Network,
    /// The request client gave up waiting.
    Timeout,
    /// The service answered with an error status.
    Status(u16),
    /// Anything else (malformed response, client-side failure).
    Other,
}

/// A failed remote call.
///
/// Carries the classification signal and the server-supplied message, if any.
/// Everything else about the failure is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.failure, .message))]
pub struct ApiError {
    /// Classification signal.
    pub failure: ApiFailure,
    /// Human-readable message from the server or the request client.
    pub message: Option<String>,
}

fn describe(failure: &ApiFailure, message: &Option<String>) -> String {
    let head = match failure {
        ApiFailure::Network => "network error".to_string(),
        ApiFailure::Timeout => "request timed out".to_string(),
        ApiFailure::Status(code) => format!("status {}", code),
        ApiFailure::Other => "request failed".to_string(),
    };
    match message {
        Some(m) => format!("{}: {}", head, m),
        None => head,
    }
}

impl ApiError {
    /// The service could not be reached.
    pub fn network() -> Self {
        Self {
            failure: ApiFailure::Network,
            message: None,
        }
    }

    /// The request timed out.
    pub fn timeout() -> Self {
        Self {
            failure: ApiFailure::Timeout,
            message: None,
        }
    }

    /// The service answered with `code`.
    pub fn status(code: u16) -> Self {
        Self {
            failure: ApiFailure::Status(code),
            message: None,
        }
    }

    /// An unclassified failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            failure: ApiFailure::Other,
            message: Some(message.into()),
        }
    }

    /// Attach a human-readable message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The HTTP-like status code, if the service answered.
    pub fn status_code(&self) -> Option<u16> {
        match self.failure {
            ApiFailure::Status(code) => Some(code),
            _ => None,
        }
    }
}
