//! Achievement evaluator.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

use super::{best_effort, points, Outbox, SideEffect, Step};
use crate::core::error::{AppError, AppResult};
use crate::notify::{messages, Notification};
use crate::storage::achievements::{self as store, Achievement};
use crate::storage::{self, catalog, progress, users};

/// Metric an achievement is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum AchievementCondition {
    CoursesCompleted,
    /// Meant to count courses of one category. Definitions carry no category
    /// yet, so this measures all completed courses.
    CategoryCoursesCompleted,
    LessonsCompleted,
    PointsEarned,
}

/// An achievement granted by one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantedAchievement {
    pub achievement_id: i64,
    pub title: String,
    pub points: i64,
}

fn measure(conn: &Connection, user_id: i64, condition: AchievementCondition) -> AppResult<i64> {
    let value = match condition {
        AchievementCondition::CoursesCompleted => catalog::count_completed_courses(conn, user_id)?,
        AchievementCondition::CategoryCoursesCompleted => {
            log::warn!("category_courses_completed is not category-aware yet, counting all courses");
            catalog::count_completed_courses(conn, user_id)?
        }
        AchievementCondition::LessonsCompleted => progress::count_completed_lessons(conn, user_id)?,
        AchievementCondition::PointsEarned => users::get_points(conn, user_id)?.unwrap_or(0),
    };
    Ok(value)
}

/// Grant every not-yet-earned achievement whose condition the user meets.
///
/// Grants are idempotent: a definition already granted is skipped up front,
/// and a concurrent grant that wins the unique index makes the insert a no-op
/// without a second reward.
pub fn evaluate_and_grant(
    conn: &Connection,
    outbox: &mut Outbox,
    user_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Vec<GrantedAchievement>> {
    let user = users::get_user(conn, user_id)?.ok_or_else(|| AppError::not_found(format!("user {}", user_id)))?;
    let at = storage::timestamp(now);

    let mut granted = Vec::new();
    for achievement in store::list_unearned(conn, user_id)? {
        let Ok(condition) = AchievementCondition::from_str(&achievement.condition_type) else {
            log::warn!(
                "Achievement {} has unknown condition type {:?}, skipping",
                achievement.id,
                achievement.condition_type
            );
            continue;
        };

        if measure(conn, user_id, condition)? < achievement.condition_value {
            continue;
        }

        let grant = best_effort(conn, outbox, Step::Achievements, user_id, |conn, outbox| {
            if !store::insert_grant(conn, user_id, achievement.id, &at)? {
                return Ok(false);
            }
            grant_rewards(conn, outbox, &user, &achievement, now)?;
            Ok(true)
        });
        match grant {
            SideEffect::Done(true) => {
                log::info!("User {} earned achievement {} ({})", user_id, achievement.id, achievement.title);
                granted.push(GrantedAchievement {
                    achievement_id: achievement.id,
                    title: achievement.title,
                    points: achievement.points,
                });
            }
            SideEffect::Done(false) => {}
            SideEffect::Failed(_) => {
                log::warn!("Achievement {} for user {} not granted", achievement.id, user_id);
            }
        }
    }

    Ok(granted)
}

fn grant_rewards(
    conn: &Connection,
    outbox: &mut Outbox,
    user: &users::User,
    achievement: &Achievement,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if achievement.points > 0 {
        points::add_points(
            conn,
            user.id,
            achievement.points,
            &format!("Achievement: {}", achievement.title),
            now,
        )?;
    }
    outbox.push(Notification::new(
        user.telegram_id,
        messages::achievement_granted(&achievement.title, &achievement.description, achievement.points),
    ));
    Ok(())
}
