//! Time-boxed challenges and user participation.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub icon_url: Option<String>,
    pub points_reward: i64,
    pub condition_type: String,
    pub condition_value: i64,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub is_active: bool,
}

impl Challenge {
    /// Active and `now` (storage format) lies inside the optional window.
    pub fn is_open_at(&self, now: &str) -> bool {
        self.is_active
            && self.start_date.as_deref().is_none_or(|start| start <= now)
            && self.end_date.as_deref().is_none_or(|end| end >= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participation {
    pub id: i64,
    pub user_id: i64,
    pub challenge_id: i64,
    pub progress: i64,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub joined_at: String,
}

/// Participation joined with its challenge, for the "my challenges" view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserChallenge {
    pub challenge: Challenge,
    pub progress: i64,
    pub is_completed: bool,
    pub completed_at: Option<String>,
    pub joined_at: String,
}

/// Fields needed to create a challenge.
#[derive(Debug, Clone, Default)]
pub struct NewChallenge<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub points_reward: i64,
    pub condition_type: &'a str,
    pub condition_value: i64,
    pub start_date: Option<&'a str>,
    pub end_date: Option<&'a str>,
}

const COLUMNS: &str = "c.id, c.title, c.description, c.icon_url, c.points_reward, c.condition_type, \
                       c.condition_value, c.start_date, c.end_date, c.is_active";

fn parse_challenge(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        icon_url: row.get(3)?,
        points_reward: row.get(4)?,
        condition_type: row.get(5)?,
        condition_value: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        is_active: row.get::<_, i32>(9)? != 0,
    })
}

pub fn create_challenge(conn: &Connection, challenge: &NewChallenge<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO challenges
             (title, description, points_reward, condition_type, condition_value, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            challenge.title,
            challenge.description,
            challenge.points_reward,
            challenge.condition_type,
            challenge.condition_value,
            challenge.start_date,
            challenge.end_date,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_challenge_active(conn: &Connection, challenge_id: i64, active: bool) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE challenges SET is_active = ?1 WHERE id = ?2",
        params![active as i32, challenge_id],
    )
}

pub fn get_challenge(conn: &Connection, challenge_id: i64) -> rusqlite::Result<Option<Challenge>> {
    conn.query_row(
        &format!("SELECT {} FROM challenges c WHERE c.id = ?1", COLUMNS),
        params![challenge_id],
        parse_challenge,
    )
    .optional()
}

/// Active challenges whose window contains `now`.
pub fn list_open(conn: &Connection, now: &str) -> rusqlite::Result<Vec<Challenge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM challenges c
         WHERE c.is_active = 1
           AND (c.start_date IS NULL OR c.start_date <= ?1)
           AND (c.end_date IS NULL OR c.end_date >= ?1)
         ORDER BY c.id",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![now], parse_challenge)?;
    rows.collect()
}

pub fn get_participation(conn: &Connection, user_id: i64, challenge_id: i64) -> rusqlite::Result<Option<Participation>> {
    conn.query_row(
        "SELECT id, user_id, challenge_id, progress, is_completed, completed_at, joined_at
         FROM user_challenges WHERE user_id = ?1 AND challenge_id = ?2",
        params![user_id, challenge_id],
        |row| {
            Ok(Participation {
                id: row.get(0)?,
                user_id: row.get(1)?,
                challenge_id: row.get(2)?,
                progress: row.get(3)?,
                is_completed: row.get::<_, i32>(4)? != 0,
                completed_at: row.get(5)?,
                joined_at: row.get(6)?,
            })
        },
    )
    .optional()
}

/// Returns `false` when the user had already joined.
pub fn insert_participation(conn: &Connection, user_id: i64, challenge_id: i64, at: &str) -> rusqlite::Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_challenges (user_id, challenge_id, joined_at) VALUES (?1, ?2, ?3)",
        params![user_id, challenge_id, at],
    )?;
    Ok(inserted == 1)
}

/// Store progress on a participation that is still open.
pub fn set_progress(conn: &Connection, user_id: i64, challenge_id: i64, progress: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE user_challenges SET progress = ?1
         WHERE user_id = ?2 AND challenge_id = ?3 AND is_completed = 0",
        params![progress, user_id, challenge_id],
    )
}

/// Flip completion if still open. Only one caller ever gets `1` back.
pub fn mark_completed(conn: &Connection, user_id: i64, challenge_id: i64, at: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE user_challenges SET is_completed = 1, completed_at = ?1
         WHERE user_id = ?2 AND challenge_id = ?3 AND is_completed = 0",
        params![at, user_id, challenge_id],
    )
}

/// Ids of open participations whose challenge is active and inside its window.
pub fn open_participation_ids(conn: &Connection, user_id: i64, now: &str) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT uc.challenge_id FROM user_challenges uc
         JOIN challenges c ON c.id = uc.challenge_id
         WHERE uc.user_id = ?1
           AND uc.is_completed = 0
           AND c.is_active = 1
           AND (c.start_date IS NULL OR c.start_date <= ?2)
           AND (c.end_date IS NULL OR c.end_date >= ?2)
         ORDER BY uc.challenge_id",
    )?;
    let rows = stmt.query_map(params![user_id, now], |row| row.get(0))?;
    rows.collect()
}

pub fn list_user_challenges(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<UserChallenge>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, uc.progress, uc.is_completed, uc.completed_at, uc.joined_at
         FROM user_challenges uc
         JOIN challenges c ON c.id = uc.challenge_id
         WHERE uc.user_id = ?1
         ORDER BY uc.joined_at DESC, uc.id DESC",
        COLUMNS
    ))?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(UserChallenge {
            challenge: parse_challenge(row)?,
            progress: row.get(10)?,
            is_completed: row.get::<_, i32>(11)? != 0,
            completed_at: row.get(12)?,
            joined_at: row.get(13)?,
        })
    })?;
    rows.collect()
}
