//! Transient user-facing notifications.
//!
//! Stores report the outcome of optimistic operations here ("Added to
//! cart", "Failed to add to cart"). Delivery is fire-and-forget: a sink
//! that cannot deliver simply drops the message.

use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Success,
    Info,
    Error,
}

/// A short message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// Sink for notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => tracing::warn!(text = %notification.message, "notification"),
            NotificationKind::Success | NotificationKind::Info => {
                tracing::info!(text = %notification.message, "notification");
            }
        }
    }
}

/// Forwards notifications over an unbounded channel to a UI loop.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver the UI drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is displaying toasts anymore.
        let _ = self.tx.send(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::channel();
        notifier.notify(Notification::success("Added Desk Lamp to cart"));
        notifier.notify(Notification::error("Failed to add to cart"));

        assert_eq!(
            rx.try_recv().ok(),
            Some(Notification::success("Added Desk Lamp to cart"))
        );
        assert_eq!(
            rx.try_recv().ok().map(|n| n.kind),
            Some(NotificationKind::Error)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(Notification::info("nobody listening"));
    }
}
