//! Lesson access and per-course progress.

use rusqlite::Connection;
use serde::Serialize;

use super::CascadeSettings;
use crate::core::error::{AppError, AppResult};
use crate::storage::catalog::{self, Course, Lesson};
use crate::storage::progress;
use crate::storage::users::{self, User};

/// A lesson the user may open, with its course and the user.
#[derive(Debug, Clone)]
pub struct LessonAccess {
    pub user: User,
    pub lesson: Lesson,
    pub course: Course,
}

/// Resolve user, lesson and course, then decide access.
///
/// A lesson is open when it is free, when it is the first lesson of its
/// course, when the user is enrolled, or when the user is an admin.
pub fn check_lesson_access(
    conn: &Connection,
    settings: &CascadeSettings,
    user_id: i64,
    lesson_id: i64,
) -> AppResult<LessonAccess> {
    let user = users::get_user(conn, user_id)?.ok_or_else(|| AppError::not_found(format!("user {}", user_id)))?;
    let lesson =
        catalog::get_lesson(conn, lesson_id)?.ok_or_else(|| AppError::not_found(format!("lesson {}", lesson_id)))?;
    let course = catalog::get_course(conn, lesson.course_id)?
        .ok_or_else(|| AppError::not_found(format!("course {}", lesson.course_id)))?;

    let allowed = lesson.is_free
        || lesson.lesson_order == 1
        || settings.is_admin(user.telegram_id)
        || catalog::get_enrollment(conn, user_id, course.id)?.is_some();
    if !allowed {
        return Err(AppError::Forbidden(format!(
            "user {} has no access to lesson {}",
            user_id, lesson_id
        )));
    }

    Ok(LessonAccess { user, lesson, course })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    pub course_id: i64,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    /// 0..=100, two decimals
    pub progress_percent: f64,
}

pub fn course_progress(conn: &Connection, user_id: i64, course_id: i64) -> AppResult<CourseProgress> {
    if catalog::get_course(conn, course_id)?.is_none() {
        return Err(AppError::not_found(format!("course {}", course_id)));
    }
    let total_lessons = catalog::count_course_lessons(conn, course_id)?;
    let completed_lessons = progress::count_completed_in_course(conn, user_id, course_id)?;

    Ok(CourseProgress {
        course_id,
        total_lessons,
        completed_lessons,
        progress_percent: percent(completed_lessons, total_lessons),
    })
}

fn percent(done: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let value = done as f64 / total as f64 * 100.0;
    (value * 100.0).round() / 100.0
}
