//! Course completion detector.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use super::achievements::{self, GrantedAchievement};
use super::{best_effort, points, Outbox, SideEffect, Step};
use crate::core::error::AppResult;
use crate::storage::{self, catalog, progress};

/// What happened when an enrollment was flipped to completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCompletion {
    /// Balance after the course bonus
    pub bonus: SideEffect<i64>,
    pub achievements: SideEffect<Vec<GrantedAchievement>>,
}

/// Mark the enrollment completed if every lesson of the course is done.
///
/// Returns `Some` only for the single call that flips the enrollment; the
/// course bonus and achievement evaluation then run as best-effort steps.
/// `None` when there is no enrollment, it is already completed, the course
/// has no lessons or some lesson is still open.
pub fn detect_completion(
    conn: &Connection,
    outbox: &mut Outbox,
    user_id: i64,
    course_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Option<CourseCompletion>> {
    let Some(enrollment) = catalog::get_enrollment(conn, user_id, course_id)? else {
        return Ok(None);
    };
    if enrollment.is_completed {
        return Ok(None);
    }

    let total = catalog::count_course_lessons(conn, course_id)?;
    if total == 0 {
        return Ok(None);
    }
    if progress::count_completed_in_course(conn, user_id, course_id)? < total {
        return Ok(None);
    }

    if catalog::mark_enrollment_completed(conn, user_id, course_id, &storage::timestamp(now))? != 1 {
        return Ok(None);
    }
    log::info!("User {} completed course {}", user_id, course_id);

    let bonus = best_effort(conn, outbox, Step::CourseBonus, user_id, |conn, _| {
        let title = catalog::get_course(conn, course_id)?
            .map(|course| course.title)
            .unwrap_or_else(|| format!("#{}", course_id));
        points::award_course(conn, user_id, &title, now)
    });
    let achievements = best_effort(conn, outbox, Step::Achievements, user_id, |conn, outbox| {
        achievements::evaluate_and_grant(conn, outbox, user_id, now)
    });

    Ok(Some(CourseCompletion { bonus, achievements }))
}

/// `true` exactly once per enrollment: for the call that marks it completed.
pub fn check_and_mark(conn: &Connection, outbox: &mut Outbox, user_id: i64, course_id: i64, now: DateTime<Utc>) -> AppResult<bool> {
    Ok(detect_completion(conn, outbox, user_id, course_id, now)?.is_some())
}
