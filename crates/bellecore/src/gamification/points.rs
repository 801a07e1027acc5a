//! Points ledger. Balances only ever go up.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::{self, users, users::PointsEntry};

/// Credit `amount` points to a user and record why.
///
/// The increment is a single `UPDATE ... SET points = points + ?`, so
/// concurrent awards inside their own transactions never lose an update.
/// Returns the balance after the award.
pub fn add_points(conn: &Connection, user_id: i64, amount: i64, reason: &str, now: DateTime<Utc>) -> AppResult<i64> {
    if amount <= 0 {
        return Err(AppError::Validation(format!("points amount must be positive, got {}", amount)));
    }
    if users::increment_points(conn, user_id, amount)? == 0 {
        return Err(AppError::not_found(format!("user {}", user_id)));
    }
    users::log_points(conn, user_id, amount, reason, &storage::timestamp(now))?;

    let balance = users::get_points(conn, user_id)?.ok_or_else(|| AppError::not_found(format!("user {}", user_id)))?;
    log::info!("User {} +{} points ({}), balance {}", user_id, amount, reason, balance);
    Ok(balance)
}

pub fn award_lesson(conn: &Connection, user_id: i64, lesson_title: &str, now: DateTime<Utc>) -> AppResult<i64> {
    add_points(conn, user_id, config::points::PER_LESSON, &format!("Lesson: {}", lesson_title), now)
}

pub fn award_course(conn: &Connection, user_id: i64, course_title: &str, now: DateTime<Utc>) -> AppResult<i64> {
    add_points(conn, user_id, config::points::PER_COURSE, &format!("Course: {}", course_title), now)
}

/// Newest entries first. `limit` is clamped to 1..=100.
pub fn points_history(conn: &Connection, user_id: i64, limit: u32) -> AppResult<Vec<PointsEntry>> {
    Ok(users::get_points_history(conn, user_id, limit.clamp(1, 100))?)
}
