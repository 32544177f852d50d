//! User-facing notices.
//!
//! Every mutating store action publishes exactly one success or failure
//! notice. UI code subscribes via [`Notifier::subscribe`] and renders them as
//! transient toasts. Publishing with nobody listening is fine; a slow
//! listener that falls more than the channel capacity behind skips the
//! oldest notices.

use serde::Serialize;
use tokio::sync::broadcast;

/// Severity of a notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    /// The action succeeded
    Success,
    /// Degraded but usable (e.g. fallback data shown)
    Warning,
    /// The action failed
    Error,
}

/// One toast-style message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Short heading
    pub title: String,
    /// Human-readable detail
    pub description: String,
}

impl Notice {
    fn new(level: NoticeLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Success notice
    #[must_use]
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, title, description)
    }

    /// Warning notice
    #[must_use]
    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, description)
    }

    /// Error notice
    #[must_use]
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, description)
    }
}

/// Broadcasts notices to any number of listeners.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    /// Create a notifier buffering up to `capacity` notices per listener
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a notice
    pub fn publish(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, title = %notice.title, "notice");
        let _ = self.tx.send(notice);
    }

    /// Receive every notice published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listeners_receive_notices_in_order() {
        let notifier = Notifier::new(4);
        notifier.publish(Notice::success("ignored", "nobody listening yet"));

        let mut rx = notifier.subscribe();
        notifier.publish(Notice::success("Success", "Event created successfully"));
        notifier.publish(Notice::error("Error", "Failed to create event"));

        assert_eq!(
            rx.recv().await.ok(),
            Some(Notice::success("Success", "Event created successfully"))
        );
        assert_eq!(rx.recv().await.ok().map(|n| n.level), Some(NoticeLevel::Error));
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let notifier = Notifier::new(0);
        notifier.publish(Notice::warning("Offline", "Showing built-in vendors"));
    }
}
