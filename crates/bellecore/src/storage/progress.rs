//! Per-lesson completion rows.

use rusqlite::{params, Connection, OptionalExtension};

/// Mark a lesson completed for a user.
///
/// Returns `true` only when this call moved the lesson from "not completed"
/// (or no row at all) to completed. Repeated calls refresh `completed_at`
/// and return `false`.
pub fn upsert_completed(conn: &Connection, user_id: i64, lesson_id: i64, at: &str) -> rusqlite::Result<bool> {
    let flipped = conn.execute(
        "UPDATE lesson_progress SET completed = 1, completed_at = ?1
         WHERE user_id = ?2 AND lesson_id = ?3 AND completed = 0",
        params![at, user_id, lesson_id],
    )?;
    if flipped == 1 {
        return Ok(true);
    }

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO lesson_progress (user_id, lesson_id, completed, completed_at)
         VALUES (?1, ?2, 1, ?3)",
        params![user_id, lesson_id, at],
    )?;
    if inserted == 1 {
        return Ok(true);
    }

    conn.execute(
        "UPDATE lesson_progress SET completed_at = ?1 WHERE user_id = ?2 AND lesson_id = ?3",
        params![at, user_id, lesson_id],
    )?;
    Ok(false)
}

pub fn is_completed(conn: &Connection, user_id: i64, lesson_id: i64) -> rusqlite::Result<bool> {
    let completed: Option<i32> = conn
        .query_row(
            "SELECT completed FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
            params![user_id, lesson_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(completed.unwrap_or(0) != 0)
}

/// Completed lessons across every course.
pub fn count_completed_lessons(conn: &Connection, user_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM lesson_progress WHERE user_id = ?1 AND completed = 1",
        params![user_id],
        |row| row.get(0),
    )
}

/// Completed lessons of one course. Lessons that were moved to another
/// course no longer count here.
pub fn count_completed_in_course(conn: &Connection, user_id: i64, course_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM lesson_progress p
         JOIN lessons l ON l.id = p.lesson_id
         WHERE p.user_id = ?1 AND l.course_id = ?2 AND p.completed = 1",
        params![user_id, course_id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::catalog::{create_course, create_lesson};
    use crate::storage::test_connection;
    use crate::storage::users::{create_user, NewUser};

    #[test]
    fn upsert_reports_only_the_first_completion() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let course = create_course(&conn, "Lashes", "", "eyelashes").unwrap();
        let lesson = create_lesson(&conn, course, "Intro", 1, true).unwrap();

        assert!(!is_completed(&conn, user, lesson).unwrap());
        assert!(upsert_completed(&conn, user, lesson, "2026-01-01 10:00:00").unwrap());
        assert!(!upsert_completed(&conn, user, lesson, "2026-01-02 10:00:00").unwrap());
        assert!(is_completed(&conn, user, lesson).unwrap());
        assert_eq!(count_completed_lessons(&conn, user).unwrap(), 1);
    }

    #[test]
    fn upsert_flips_an_existing_incomplete_row() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let course = create_course(&conn, "Lashes", "", "eyelashes").unwrap();
        let lesson = create_lesson(&conn, course, "Intro", 1, true).unwrap();
        conn.execute(
            "INSERT INTO lesson_progress (user_id, lesson_id, completed) VALUES (?1, ?2, 0)",
            params![user, lesson],
        )
        .unwrap();

        assert!(upsert_completed(&conn, user, lesson, "2026-01-01 10:00:00").unwrap());
    }

    #[test]
    fn course_count_is_scoped_to_course() {
        let conn = test_connection();
        let user = create_user(&conn, &NewUser { telegram_id: 1, full_name: "A", ..Default::default() }).unwrap();
        let a = create_course(&conn, "A", "", "brows").unwrap();
        let b = create_course(&conn, "B", "", "brows").unwrap();
        let la = create_lesson(&conn, a, "a1", 1, false).unwrap();
        let lb = create_lesson(&conn, b, "b1", 1, false).unwrap();
        upsert_completed(&conn, user, la, "2026-01-01 10:00:00").unwrap();
        upsert_completed(&conn, user, lb, "2026-01-01 10:00:00").unwrap();

        assert_eq!(count_completed_in_course(&conn, user, a).unwrap(), 1);
        assert_eq!(count_completed_lessons(&conn, user).unwrap(), 2);
    }
}
