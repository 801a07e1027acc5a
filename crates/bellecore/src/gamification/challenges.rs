//! Challenge tracker and participation.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

use super::{best_effort, points, Outbox, SideEffect, Step};
use crate::core::error::{AppError, AppResult};
use crate::notify::{messages, Notification};
use crate::storage::challenges::{self as store, Challenge, UserChallenge};
use crate::storage::{self, catalog, progress, users};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ChallengeCondition {
    CompleteLessons,
    CompleteCourses,
    EarnPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
}

fn measure(conn: &Connection, user_id: i64, condition_type: &str) -> AppResult<i64> {
    let value = match ChallengeCondition::from_str(condition_type) {
        Ok(ChallengeCondition::CompleteLessons) => progress::count_completed_lessons(conn, user_id)?,
        Ok(ChallengeCondition::CompleteCourses) => catalog::count_completed_courses(conn, user_id)?,
        Ok(ChallengeCondition::EarnPoints) => users::get_points(conn, user_id)?.unwrap_or(0),
        Err(_) => {
            log::warn!("Unknown challenge condition type {:?}, measuring 0", condition_type);
            0
        }
    };
    Ok(value)
}

/// Recompute progress of one participation.
///
/// Returns `true` only for the call that flips the participation to
/// completed; that call alone pays `points_reward` and queues the
/// notification.
pub fn recheck(conn: &Connection, outbox: &mut Outbox, user_id: i64, challenge_id: i64, now: DateTime<Utc>) -> AppResult<bool> {
    let Some(participation) = store::get_participation(conn, user_id, challenge_id)? else {
        return Ok(false);
    };
    if participation.is_completed {
        return Ok(false);
    }
    let Some(challenge) = store::get_challenge(conn, challenge_id)? else {
        return Ok(false);
    };

    let metric = measure(conn, user_id, &challenge.condition_type)?;
    let target = challenge.condition_value.max(0);
    store::set_progress(conn, user_id, challenge_id, metric.clamp(0, target))?;

    if metric < challenge.condition_value {
        return Ok(false);
    }
    if store::mark_completed(conn, user_id, challenge_id, &storage::timestamp(now))? != 1 {
        return Ok(false);
    }

    if challenge.points_reward > 0 {
        points::add_points(
            conn,
            user_id,
            challenge.points_reward,
            &format!("Challenge: {}", challenge.title),
            now,
        )?;
    }
    if let Some(user) = users::get_user(conn, user_id)? {
        outbox.push(Notification::new(
            user.telegram_id,
            messages::challenge_completed(&challenge.title, challenge.points_reward),
        ));
    }
    log::info!("User {} completed challenge {} ({})", user_id, challenge.id, challenge.title);
    Ok(true)
}

/// Recheck every open participation whose challenge is active and inside
/// its window. One failing challenge does not stop the others.
///
/// Returns the ids that became completed in this call.
pub fn recheck_all(conn: &Connection, outbox: &mut Outbox, user_id: i64, now: DateTime<Utc>) -> AppResult<Vec<i64>> {
    let ids = store::open_participation_ids(conn, user_id, &storage::timestamp(now))?;

    let mut completed = Vec::new();
    for challenge_id in ids {
        let effect = best_effort(conn, outbox, Step::Challenges, user_id, |conn, outbox| {
            recheck(conn, outbox, user_id, challenge_id, now)
        });
        if let SideEffect::Done(true) = effect {
            completed.push(challenge_id);
        }
    }
    Ok(completed)
}

pub fn list_active(conn: &Connection, now: DateTime<Utc>) -> AppResult<Vec<Challenge>> {
    Ok(store::list_open(conn, &storage::timestamp(now))?)
}

/// Join a challenge that is active and currently running.
pub fn join(conn: &Connection, outbox: &mut Outbox, user_id: i64, challenge_id: i64, now: DateTime<Utc>) -> AppResult<JoinOutcome> {
    let user = users::get_user(conn, user_id)?.ok_or_else(|| AppError::not_found(format!("user {}", user_id)))?;
    let challenge =
        store::get_challenge(conn, challenge_id)?.ok_or_else(|| AppError::not_found(format!("challenge {}", challenge_id)))?;

    let at = storage::timestamp(now);
    if !challenge.is_active {
        return Err(AppError::Validation("challenge is not active".to_string()));
    }
    if !challenge.is_open_at(&at) {
        return Err(AppError::Validation("challenge is not running right now".to_string()));
    }

    if !store::insert_participation(conn, user_id, challenge_id, &at)? {
        return Ok(JoinOutcome::AlreadyJoined);
    }
    outbox.push(Notification::new(
        user.telegram_id,
        messages::challenge_joined(&challenge.title, &challenge.description, challenge.points_reward),
    ));
    log::info!("User {} joined challenge {}", user_id, challenge_id);
    Ok(JoinOutcome::Joined)
}

pub fn user_challenges(conn: &Connection, user_id: i64) -> AppResult<Vec<UserChallenge>> {
    Ok(store::list_user_challenges(conn, user_id)?)
}
