//! Users and the points log.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// A registered student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    /// Telegram user id, the address for notifications
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub is_active: bool,
    pub points: i64,
    pub created_at: String,
}

/// Fields needed to register a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub telegram_id: i64,
    pub username: Option<&'a str>,
    pub full_name: &'a str,
    pub phone: Option<&'a str>,
    pub city: Option<&'a str>,
}

/// One row of the points log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointsEntry {
    pub amount: i64,
    pub reason: String,
    pub created_at: String,
}

const USER_COLUMNS: &str = "id, telegram_id, username, full_name, phone, city, is_active, points, created_at";

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        full_name: row.get(3)?,
        phone: row.get(4)?,
        city: row.get(5)?,
        is_active: row.get::<_, i32>(6)? != 0,
        points: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Insert a user and return its id.
pub fn create_user(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, full_name, phone, city) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![user.telegram_id, user.username, user.full_name, user.phone, user.city],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![user_id],
        parse_row,
    )
    .optional()
}

pub fn get_user_by_telegram_id(conn: &Connection, telegram_id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
        params![telegram_id],
        parse_row,
    )
    .optional()
}

/// Add `amount` to the balance in a single statement.
/// Returns the number of updated rows (0 when the user does not exist).
pub fn increment_points(conn: &Connection, user_id: i64, amount: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE users SET points = points + ?1 WHERE id = ?2",
        params![amount, user_id],
    )
}

pub fn get_points(conn: &Connection, user_id: i64) -> rusqlite::Result<Option<i64>> {
    conn.query_row("SELECT points FROM users WHERE id = ?1", params![user_id], |row| row.get(0))
        .optional()
}

pub fn log_points(conn: &Connection, user_id: i64, amount: i64, reason: &str, at: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO points_log (user_id, amount, reason, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, amount, reason, at],
    )?;
    Ok(())
}

/// Most recent points log entries first.
pub fn get_points_history(conn: &Connection, user_id: i64, limit: u32) -> rusqlite::Result<Vec<PointsEntry>> {
    let mut stmt = conn.prepare(
        "SELECT amount, reason, created_at FROM points_log
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![user_id, limit], |row| {
        Ok(PointsEntry {
            amount: row.get(0)?,
            reason: row.get(1)?,
            created_at: row.get(2)?,
        })
    })?;
    rows.collect()
}

pub fn count_active_users(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users WHERE is_active = 1", [], |row| row.get(0))
}
