//! Notification abstraction.
//!
//! The gamification cascade never talks to Telegram. It queues
//! [`Notification`] values in an outbox while the database transaction is
//! open; the caller delivers them through a [`Notifier`] after commit, so a
//! rolled-back step never leaves a message behind.

pub mod messages;

use async_trait::async_trait;
use serde::Serialize;

/// A message addressed to one Telegram user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub telegram_id: i64,
    /// HTML-formatted body
    pub text: String,
}

impl Notification {
    pub fn new(telegram_id: i64, text: impl Into<String>) -> Self {
        Self {
            telegram_id,
            text: text.into(),
        }
    }
}

/// Result of a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Failed(String),
}

/// Sends text to a user. Implementations must not panic or return errors:
/// every failure is reported as [`NotifyOutcome::Failed`].
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, telegram_id: i64, text: &str) -> NotifyOutcome;
}

/// Summary of delivering a batch of notifications.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

/// Deliver notifications one by one, in order. Failures are logged and counted.
pub async fn deliver_all(notifier: &dyn Notifier, notifications: &[Notification]) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for notification in notifications {
        match notifier.send(notification.telegram_id, &notification.text).await {
            NotifyOutcome::Delivered => report.sent += 1,
            NotifyOutcome::Failed(reason) => {
                log::warn!("Failed to notify user {}: {}", notification.telegram_id, reason);
                report.failed += 1;
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyNotifier {
        seen: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, telegram_id: i64, _text: &str) -> NotifyOutcome {
            self.seen.lock().unwrap().push(telegram_id);
            if telegram_id < 0 {
                NotifyOutcome::Failed("chat not found".to_string())
            } else {
                NotifyOutcome::Delivered
            }
        }
    }

    #[tokio::test]
    async fn failures_are_counted_not_raised() {
        let notifier = FlakyNotifier { seen: Mutex::new(Vec::new()) };
        let batch = vec![
            Notification::new(1, "a"),
            Notification::new(-2, "b"),
            Notification::new(3, "c"),
        ];

        let report = deliver_all(&notifier, &batch).await;
        assert_eq!(report, DeliveryReport { sent: 2, failed: 1 });
        assert_eq!(report.total(), 3);
        assert_eq!(*notifier.seen.lock().unwrap(), vec![1, -2, 3]);
    }
}
