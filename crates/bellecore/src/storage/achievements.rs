//! Achievement definitions and grants.

use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon_url: Option<String>,
    /// Bonus awarded on grant, 0 for none
    pub points: i64,
    pub condition_type: String,
    pub condition_value: i64,
}

/// An achievement together with the moment it was earned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EarnedAchievement {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub earned_at: String,
}

const COLUMNS: &str = "a.id, a.title, a.description, a.icon_url, a.points, a.condition_type, a.condition_value";

fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Achievement> {
    Ok(Achievement {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        icon_url: row.get(3)?,
        points: row.get(4)?,
        condition_type: row.get(5)?,
        condition_value: row.get(6)?,
    })
}

pub fn create_achievement(
    conn: &Connection,
    title: &str,
    points: i64,
    condition_type: &str,
    condition_value: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO achievements (title, points, condition_type, condition_value) VALUES (?1, ?2, ?3, ?4)",
        params![title, points, condition_type, condition_value],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_achievements(conn: &Connection) -> rusqlite::Result<Vec<Achievement>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM achievements a ORDER BY a.id", COLUMNS))?;
    let rows = stmt.query_map([], parse_row)?;
    rows.collect()
}

/// Definitions the user has not been granted yet.
pub fn list_unearned(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Achievement>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM achievements a
         WHERE NOT EXISTS (
             SELECT 1 FROM user_achievements ua WHERE ua.user_id = ?1 AND ua.achievement_id = a.id
         )
         ORDER BY a.id",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], parse_row)?;
    rows.collect()
}

pub fn list_earned(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<EarnedAchievement>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, ua.earned_at FROM user_achievements ua
         JOIN achievements a ON a.id = ua.achievement_id
         WHERE ua.user_id = ?1
         ORDER BY ua.earned_at DESC, ua.id DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(EarnedAchievement {
            achievement: parse_row(row)?,
            earned_at: row.get(7)?,
        })
    })?;
    rows.collect()
}

/// Insert a grant. Returns `false` if the user already had it.
pub fn insert_grant(conn: &Connection, user_id: i64, achievement_id: i64, at: &str) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, earned_at) VALUES (?1, ?2, ?3)",
        params![user_id, achievement_id, at],
    )?;
    Ok(inserted == 1)
}
