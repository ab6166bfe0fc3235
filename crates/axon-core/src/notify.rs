//! Transient user notifications (toasts).
//!
//! Notices are broadcast to whoever is listening at the time; slow listeners
//! lose the oldest notices rather than blocking publishers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NotificationCenter {
    tx: broadcast::Sender<Notice>,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(32)
    }
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        let notice = Notice {
            level,
            text: text.into(),
            at: Utc::now(),
        };
        match level {
            NoticeLevel::Info => tracing::info!(text = %notice.text, "notice"),
            NoticeLevel::Warning => tracing::warn!(text = %notice.text, "notice"),
            NoticeLevel::Error => tracing::error!(text = %notice.text, "notice"),
        }
        // No listeners is fine: the notice is transient.
        let _ = self.tx.send(notice);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Warning, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notify(NoticeLevel::Error, text);
    }
}
