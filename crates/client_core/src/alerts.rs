use std::sync::Mutex;

use tracing::warn;

/// Blocking, user-facing notice. Each failure is surfaced exactly once.
pub trait AlertSink: Send + Sync {
    fn alert(&self, message: &str);
}

/// Sink for headless use: alerts become warnings in the log.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, message: &str) {
        warn!(alert = message, "user alert");
    }
}

/// Keeps every alert, for callers that render them later.
#[derive(Default)]
pub struct RecordingAlertSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingAlertSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
    }
}
