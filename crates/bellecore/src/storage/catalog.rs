//! Courses, lessons and enrollments.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// manicure, eyelashes, brows...
    pub category: String,
    pub is_active: bool,
    pub is_top: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    /// 1-based position inside the course; lesson 1 is an open preview
    pub lesson_order: i64,
    pub video_url: Option<String>,
    pub video_duration: Option<i64>,
    pub pdf_url: Option<String>,
    pub is_free: bool,
}

/// A user's access grant to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub purchased_at: String,
    pub is_completed: bool,
    pub completed_at: Option<String>,
}

/// An incomplete enrollment together with its owner and last activity,
/// used by the inactivity reminder job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEnrollment {
    pub telegram_id: i64,
    pub course_title: String,
    pub purchased_at: String,
    pub last_activity: Option<String>,
}

const COURSE_COLUMNS: &str = "id, title, description, category, is_active, is_top";
const LESSON_COLUMNS: &str =
    "id, course_id, title, description, lesson_order, video_url, video_duration, pdf_url, is_free";

fn parse_course(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        is_active: row.get::<_, i32>(4)? != 0,
        is_top: row.get::<_, i32>(5)? != 0,
    })
}

fn parse_lesson(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lesson> {
    Ok(Lesson {
        id: row.get(0)?,
        course_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        lesson_order: row.get(4)?,
        video_url: row.get(5)?,
        video_duration: row.get(6)?,
        pdf_url: row.get(7)?,
        is_free: row.get::<_, i32>(8)? != 0,
    })
}

fn parse_enrollment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        course_id: row.get(2)?,
        purchased_at: row.get(3)?,
        is_completed: row.get::<_, i32>(4)? != 0,
        completed_at: row.get(5)?,
    })
}

pub fn create_course(conn: &Connection, title: &str, description: &str, category: &str) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO courses (title, description, category) VALUES (?1, ?2, ?3)",
        params![title, description, category],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_course_active(conn: &Connection, course_id: i64, active: bool) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE courses SET is_active = ?1 WHERE id = ?2",
        params![active as i32, course_id],
    )
}

pub fn create_lesson(
    conn: &Connection,
    course_id: i64,
    title: &str,
    lesson_order: i64,
    is_free: bool,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO lessons (course_id, title, lesson_order, is_free) VALUES (?1, ?2, ?3, ?4)",
        params![course_id, title, lesson_order, is_free as i32],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_course(conn: &Connection, course_id: i64) -> rusqlite::Result<Option<Course>> {
    conn.query_row(
        &format!("SELECT {} FROM courses WHERE id = ?1", COURSE_COLUMNS),
        params![course_id],
        parse_course,
    )
    .optional()
}

pub fn get_lesson(conn: &Connection, lesson_id: i64) -> rusqlite::Result<Option<Lesson>> {
    conn.query_row(
        &format!("SELECT {} FROM lessons WHERE id = ?1", LESSON_COLUMNS),
        params![lesson_id],
        parse_lesson,
    )
    .optional()
}

/// Lessons of a course in display order.
pub fn get_course_lessons(conn: &Connection, course_id: i64) -> rusqlite::Result<Vec<Lesson>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM lessons WHERE course_id = ?1 ORDER BY lesson_order ASC, id ASC",
        LESSON_COLUMNS
    ))?;
    let rows = stmt.query_map(params![course_id], parse_lesson)?;
    rows.collect()
}

pub fn count_course_lessons(conn: &Connection, course_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM lessons WHERE course_id = ?1",
        params![course_id],
        |row| row.get(0),
    )
}

pub fn get_enrollment(conn: &Connection, user_id: i64, course_id: i64) -> rusqlite::Result<Option<Enrollment>> {
    conn.query_row(
        "SELECT id, user_id, course_id, purchased_at, is_completed, completed_at
         FROM enrollments WHERE user_id = ?1 AND course_id = ?2",
        params![user_id, course_id],
        parse_enrollment,
    )
    .optional()
}

/// Give a user access to a course. Idempotent: an existing grant is
/// returned untouched.
pub fn grant_access(conn: &Connection, user_id: i64, course_id: i64) -> rusqlite::Result<Enrollment> {
    conn.execute(
        "INSERT OR IGNORE INTO enrollments (user_id, course_id) VALUES (?1, ?2)",
        params![user_id, course_id],
    )?;
    get_enrollment(conn, user_id, course_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// Flip `is_completed` only if it is still false.
///
/// Returns the number of changed rows: exactly one caller per
/// (user, course) ever observes `1`.
pub fn mark_enrollment_completed(conn: &Connection, user_id: i64, course_id: i64, at: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE enrollments SET is_completed = 1, completed_at = ?1
         WHERE user_id = ?2 AND course_id = ?3 AND is_completed = 0",
        params![at, user_id, course_id],
    )
}

pub fn count_completed_courses(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM enrollments WHERE user_id = ?1 AND is_completed = 1",
        params![user_id],
        |row| row.get(0),
    )
}

/// First active course the user is not enrolled in, other than `exclude_course_id`.
/// With `category` set, only that category is considered.
pub fn find_unenrolled_course(
    conn: &Connection,
    user_id: i64,
    exclude_course_id: i64,
    category: Option<&str>,
) -> rusqlite::Result<Option<Course>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM courses c
             WHERE c.id != ?1
               AND c.is_active = 1
               AND (?2 IS NULL OR c.category = ?2)
               AND NOT EXISTS (
                   SELECT 1 FROM enrollments e WHERE e.user_id = ?3 AND e.course_id = c.id
               )
             ORDER BY c.is_top DESC, c.id ASC
             LIMIT 1",
            COURSE_COLUMNS
        ),
        params![exclude_course_id, category, user_id],
        parse_course,
    )
    .optional()
}

/// Incomplete enrollments of active users with the time of their last
/// completed lesson in that course.
pub fn open_enrollments(conn: &Connection) -> rusqlite::Result<Vec<OpenEnrollment>> {
    let mut stmt = conn.prepare(
        "SELECT u.telegram_id, c.title, e.purchased_at,
                (SELECT MAX(p.completed_at)
                   FROM lesson_progress p
                   JOIN lessons l ON l.id = p.lesson_id
                  WHERE p.user_id = e.user_id AND l.course_id = e.course_id AND p.completed = 1)
         FROM enrollments e
         JOIN users u ON u.id = e.user_id
         JOIN courses c ON c.id = e.course_id
         WHERE e.is_completed = 0 AND u.is_active = 1
         ORDER BY e.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(OpenEnrollment {
            telegram_id: row.get(0)?,
            course_title: row.get(1)?,
            purchased_at: row.get(2)?,
            last_activity: row.get(3)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_connection;
    use crate::storage::users::{create_user, NewUser};

    #[test]
    fn lessons_come_back_in_order() {
        let conn = test_connection();
        let course = create_course(&conn, "Gel polish", "", "manicure").unwrap();
        create_lesson(&conn, course, "Second", 2, false).unwrap();
        create_lesson(&conn, course, "First", 1, true).unwrap();

        let lessons = get_course_lessons(&conn, course).unwrap();
        let titles: Vec<_> = lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
        assert_eq!(count_course_lessons(&conn, course).unwrap(), 2);
    }

    #[test]
    fn grant_access_is_idempotent() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let course = create_course(&conn, "Brows", "", "brows").unwrap();

        let first = grant_access(&conn, user, course).unwrap();
        let second = grant_access(&conn, user, course).unwrap();
        assert_eq!(first.id, second.id);
        assert!(!first.is_completed);
    }

    #[test]
    fn mark_completed_changes_row_only_once() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let course = create_course(&conn, "Brows", "", "brows").unwrap();
        grant_access(&conn, user, course).unwrap();

        assert_eq!(mark_enrollment_completed(&conn, user, course, "2026-01-01 00:00:00").unwrap(), 1);
        assert_eq!(mark_enrollment_completed(&conn, user, course, "2026-01-02 00:00:00").unwrap(), 0);

        let enrollment = get_enrollment(&conn, user, course).unwrap().unwrap();
        assert_eq!(enrollment.completed_at.as_deref(), Some("2026-01-01 00:00:00"));
    }

    #[test]
    fn unenrolled_course_respects_category_and_enrollments() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let done = create_course(&conn, "Manicure basics", "", "manicure").unwrap();
        let enrolled = create_course(&conn, "Manicure pro", "", "manicure").unwrap();
        let other = create_course(&conn, "Lashes", "", "eyelashes").unwrap();
        grant_access(&conn, user, done).unwrap();
        grant_access(&conn, user, enrolled).unwrap();

        assert!(find_unenrolled_course(&conn, user, done, Some("manicure")).unwrap().is_none());
        let any = find_unenrolled_course(&conn, user, done, None).unwrap().unwrap();
        assert_eq!(any.id, other);
    }
}
