//! Error reporting for swiftchat.
//!
//! Turns a failed remote call into a classification and the message shown to
//! the user. Pure functions: logging and displaying the notification are up
//! to the caller.

use swiftchat_types::{ApiError, ApiFailure};

/// Fallback shown when nothing more specific is known.
pub const DEFAULT_MESSAGE: &str = "An unexpected error occurred";

/// 4xx-equivalent failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 409
    Conflict,
    /// 422
    Validation,
    /// Any other 4xx status.
    Other(u16),
}

/// Classification of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreachable or offline.
    Network,
    /// The request client gave up waiting.
    Timeout,
    /// The request was rejected.
    Client(ClientErrorKind),
    /// The service failed (5xx).
    Server(u16),
    /// Anything else, including non-error statuses reported as failures.
    Unknown,
}

impl ErrorKind {
    /// Whether the same call may succeed if the caller tries again.
    ///
    /// Nothing in the engine retries on its own; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network
                | Self::Timeout
                | Self::Server(502)
                | Self::Server(503)
                | Self::Server(504)
        )
    }
}

/// A classified failure, ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Classification.
    pub kind: ErrorKind,
    /// User-facing message.
    pub message: String,
    /// Whether trying again may help.
    pub retryable: bool,
}

/// Classify a failed call.
pub fn classify(error: &ApiError) -> ErrorKind {
    match error.failure {
        ApiFailure::Network => ErrorKind::Network,
        ApiFailure::Timeout => ErrorKind::Timeout,
        ApiFailure::Status(code) => match code {
            400 => ErrorKind::Client(ClientErrorKind::BadRequest),
            401 => ErrorKind::Client(ClientErrorKind::Unauthorized),
            403 => ErrorKind::Client(ClientErrorKind::Forbidden),
            404 => ErrorKind::Client(ClientErrorKind::NotFound),
            409 => ErrorKind::Client(ClientErrorKind::Conflict),
            422 => ErrorKind::Client(ClientErrorKind::Validation),
            400..=499 => ErrorKind::Client(ClientErrorKind::Other(code)),
            500..=599 => ErrorKind::Server(code),
            _ => ErrorKind::Unknown,
        },
        ApiFailure::Other => ErrorKind::Unknown,
    }
}

/// The message to show for a failed call.
///
/// A message supplied by the server wins over the generic text for most
/// statuses; gateway failures (502/503/504) always use the generic text.
pub fn user_message(error: &ApiError, default: &str) -> String {
    let server = error.message.as_deref().filter(|m| !m.is_empty());
    let or_server = |generic: &str| server.unwrap_or(generic).to_string();

    match error.failure {
        ApiFailure::Network => {
            "Network error. Please check your connection and try again.".to_string()
        }
        ApiFailure::Status(code) => match code {
            400 => or_server("Bad request. Please check your input."),
            401 => or_server("Unauthorized. Please log in again."),
            403 => or_server("Access forbidden."),
            404 => or_server("Resource not found."),
            409 => or_server("Conflict. This resource may already exist."),
            422 => or_server("Validation error. Please check your input."),
            500 => or_server("Internal server error. Please try again later."),
            502..=504 => "Service temporarily unavailable. Please try again later.".to_string(),
            _ => or_server(default),
        },
        ApiFailure::Timeout => "Request timeout. Please try again.".to_string(),
        ApiFailure::Other => or_server(default),
    }
}

/// Classify a failed call and build its user-facing message.
pub fn report(error: &ApiError, default: &str) -> Report {
    let kind = classify(error);
    Report {
        kind,
        message: user_message(error, default),
        retryable: kind.is_retryable(),
    }
}

/// Format field validation errors returned by the service.
///
/// Each `(field, message)` pair becomes one line; `prefix` is prepended as
/// `"<prefix>: <message>"` when non-empty.
pub fn validation_messages<'a, I>(prefix: &str, errors: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    errors
        .into_iter()
        .map(|(_field, message)| {
            if prefix.is_empty() {
                message.to_string()
            } else {
                format!("{}: {}", prefix, message)
            }
        })
        .collect()
}
