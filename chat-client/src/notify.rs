//! User-visible error notifications.

use std::sync::{Arc, Mutex};
use swiftchat_core::Report;

use crate::lock;

/// Receives failures that should be shown to the user.
pub trait Notifier: Send + Sync {
    /// Show `report` to the user.
    fn notify_error(&self, report: &Report);
}

/// Logs notifications through `tracing`. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify_error(&self, report: &Report) {
        tracing::warn!(
            kind = ?report.kind,
            retryable = report.retryable,
            "{}",
            report.message
        );
    }
}

/// Keeps notifications in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report received so far.
    pub fn reports(&self) -> Vec<Report> {
        lock(&self.reports).clone()
    }

    /// The messages of every report received so far.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.reports).iter().map(|r| r.message.clone()).collect()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        lock(&self.reports).clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify_error(&self, report: &Report) {
        lock(&self.reports).push(report.clone());
    }
}
