//! Leaderboards over active users.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::users;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaderboardOrder {
    /// points, then courses, then lessons
    #[default]
    Points,
    /// courses, then points, then lessons; users without a finished course are left out
    Courses,
}

impl LeaderboardOrder {
    fn order_by(self) -> &'static str {
        match self {
            LeaderboardOrder::Points => "points DESC, courses DESC, lessons DESC, id ASC",
            LeaderboardOrder::Courses => "courses DESC, points DESC, lessons DESC, id ASC",
        }
    }

    fn filter(self) -> &'static str {
        match self {
            LeaderboardOrder::Points => "1 = 1",
            LeaderboardOrder::Courses => "courses > 0",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub position: i64,
    pub user_id: i64,
    pub full_name: String,
    pub points: i64,
    pub completed_courses: i64,
    pub completed_lessons: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MyPosition {
    pub position: i64,
    pub points: i64,
    pub completed_courses: i64,
    pub completed_lessons: i64,
    pub total_users: i64,
}

const STATS: &str = "WITH stats AS (
    SELECT u.id, u.full_name, u.points,
           (SELECT COUNT(*) FROM enrollments e WHERE e.user_id = u.id AND e.is_completed = 1) AS courses,
           (SELECT COUNT(*) FROM lesson_progress p WHERE p.user_id = u.id AND p.completed = 1) AS lessons
    FROM users u
    WHERE u.is_active = 1
)";

/// Clamp a client-supplied limit to `1..=MAX_LIMIT`, defaulting when absent.
pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(config::leaderboard::DEFAULT_LIMIT)
        .clamp(1, config::leaderboard::MAX_LIMIT)
}

pub fn top(conn: &Connection, limit: Option<u32>, order: LeaderboardOrder) -> AppResult<Vec<LeaderboardEntry>> {
    let sql = format!(
        "{} SELECT id, full_name, points, courses, lessons FROM stats WHERE {} ORDER BY {} LIMIT ?1",
        STATS,
        order.filter(),
        order.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![clamp_limit(limit)], |row| {
        Ok(LeaderboardEntry {
            position: 0,
            user_id: row.get(0)?,
            full_name: row.get(1)?,
            points: row.get(2)?,
            completed_courses: row.get(3)?,
            completed_lessons: row.get(4)?,
        })
    })?;

    let mut entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.position = index as i64 + 1;
    }
    Ok(entries)
}

/// Position of a user in the points leaderboard.
pub fn position(conn: &Connection, user_id: i64) -> AppResult<MyPosition> {
    let sql = format!(
        "{} SELECT position, points, courses, lessons FROM (
             SELECT id, points, courses, lessons,
                    ROW_NUMBER() OVER (ORDER BY {}) AS position
             FROM stats
         ) WHERE id = ?1",
        STATS,
        LeaderboardOrder::Points.order_by()
    );
    let found = conn
        .query_row(&sql, params![user_id], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })
        .optional()?;
    let Some((position, points, completed_courses, completed_lessons)) = found else {
        return Err(AppError::not_found(format!("active user {}", user_id)));
    };

    Ok(MyPosition {
        position,
        points,
        completed_courses,
        completed_lessons,
        total_users: users::count_active_users(conn)?,
    })
}
