//! Outgoing notifications that are not triggered by a lesson: inactivity
//! reminders and new-course announcements.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};

use crate::core::error::{AppError, AppResult};
use crate::notify::{messages, Notification};
use crate::storage::{self, catalog};

/// Reminders to queue, and how many open enrollments were looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderBatch {
    pub notifications: Vec<Notification>,
    pub scanned: usize,
}

/// Remind users about courses they have not touched for `inactive_days`.
///
/// Activity is the last completed lesson of that course, or the enrollment
/// date when no lesson is completed yet.
pub fn inactive_enrollments(conn: &Connection, now: DateTime<Utc>, inactive_days: i64) -> AppResult<ReminderBatch> {
    let threshold = now - Duration::days(inactive_days);
    let open = catalog::open_enrollments(conn)?;

    let mut notifications = Vec::new();
    for enrollment in &open {
        let last = enrollment
            .last_activity
            .as_deref()
            .unwrap_or(&enrollment.purchased_at);
        let Some(last_at) = storage::parse_timestamp(last) else {
            log::warn!("Unparseable activity timestamp {:?} for user {}", last, enrollment.telegram_id);
            continue;
        };
        if last_at >= threshold {
            continue;
        }

        let days = (now - last_at).num_days();
        notifications.push(Notification::new(
            enrollment.telegram_id,
            messages::inactivity_reminder(&enrollment.course_title, days),
        ));
    }

    log::info!("{} of {} open enrollments need a reminder", notifications.len(), open.len());
    Ok(ReminderBatch {
        notifications,
        scanned: open.len(),
    })
}

/// Announce a course to every active user.
pub fn new_course_announcements(conn: &Connection, course_id: i64) -> AppResult<Vec<Notification>> {
    let course =
        catalog::get_course(conn, course_id)?.ok_or_else(|| AppError::not_found(format!("course {}", course_id)))?;
    if !course.is_active {
        return Err(AppError::Validation(format!("course {} is not published", course_id)));
    }
    let text = messages::new_course(&course.title, &course.description);

    let mut stmt = conn.prepare("SELECT telegram_id FROM users WHERE is_active = 1 ORDER BY id")?;
    let ids = stmt.query_map(params![], |row| row.get::<_, i64>(0))?;
    let mut notifications = Vec::new();
    for telegram_id in ids {
        notifications.push(Notification::new(telegram_id?, text.clone()));
    }
    Ok(notifications)
}
