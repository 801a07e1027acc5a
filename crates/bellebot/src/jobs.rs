//! One-shot maintenance jobs run from the CLI.
//!
//! Each job reads what it needs on a pooled connection, releases it and only
//! then talks to Telegram.

use anyhow::{anyhow, Result};
use bellecore::gamification::reminders;
use bellecore::storage::users;
use bellecore::{deliver_all, get_connection, recheck_all_challenges, DbPool, DeliveryReport, Notifier};
use chrono::{DateTime, Utc};

/// Remind users about courses they left untouched for `inactive_days`.
pub async fn send_reminders(
    pool: &DbPool,
    notifier: &dyn Notifier,
    inactive_days: i64,
    now: DateTime<Utc>,
) -> Result<DeliveryReport> {
    let batch = {
        let conn = get_connection(pool)?;
        reminders::inactive_enrollments(&conn, now, inactive_days)?
    };
    log::info!(
        "Sending {} inactivity reminders ({} open enrollments scanned)",
        batch.notifications.len(),
        batch.scanned
    );

    let report = deliver_all(notifier, &batch.notifications).await;
    log::info!(
        "Reminders: {} sent, {} failed, {} total",
        report.sent,
        report.failed,
        report.total()
    );
    Ok(report)
}

/// Re-evaluate every running challenge of one user and send the resulting
/// completion messages. Returns the ids of challenges completed by this run.
pub async fn recheck_challenges(
    pool: &DbPool,
    notifier: &dyn Notifier,
    telegram_id: i64,
    now: DateTime<Utc>,
) -> Result<(Vec<i64>, DeliveryReport)> {
    let recheck = {
        let mut conn = get_connection(pool)?;
        let user = users::get_user_by_telegram_id(&conn, telegram_id)?
            .ok_or_else(|| anyhow!("No user with telegram id {}", telegram_id))?;
        recheck_all_challenges(&mut conn, user.id, now)?
    };

    let report = deliver_all(notifier, &recheck.notifications).await;
    log::info!(
        "Challenge recheck for {}: {} completed, {} notifications sent",
        telegram_id,
        recheck.completed.len(),
        report.sent
    );
    Ok((recheck.completed, report))
}

/// Tell every active user about a published course.
pub async fn announce_course(pool: &DbPool, notifier: &dyn Notifier, course_id: i64) -> Result<DeliveryReport> {
    let notifications = {
        let conn = get_connection(pool)?;
        reminders::new_course_announcements(&conn, course_id)?
    };
    log::info!("Announcing course {} to {} users", course_id, notifications.len());

    let report = deliver_all(notifier, &notifications).await;
    log::info!(
        "Announcement: {} sent, {} failed, {} total",
        report.sent,
        report.failed,
        report.total()
    );
    Ok(report)
}
