//! Learning progress and gamification cascade.
//!
//! Everything here is synchronous and runs on a single `&Connection` (usually
//! a transaction opened by [`cascade::complete_lesson`]). Side effects that
//! must not break the caller run through [`best_effort`], which wraps them in
//! an SQL savepoint: on failure their writes are rolled back, the
//! notifications they queued are dropped and a [`SideEffect::Failed`] is
//! returned instead of an error.

pub mod achievements;
pub mod cascade;
pub mod certificates;
pub mod challenges;
pub mod completion;
pub mod leaderboard;
pub mod points;
pub mod progress;
pub mod recommendations;
pub mod reminders;

use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumString};

use crate::core::config;
use crate::core::error::AppResult;
use crate::notify::Notification;

/// Notifications queued during a cascade, delivered after commit.
pub type Outbox = Vec<Notification>;

/// Result of a step whose failure is tolerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect<T> {
    Done(T),
    Failed(String),
}

impl<T> SideEffect<T> {
    pub fn is_done(&self) -> bool {
        matches!(self, SideEffect::Done(_))
    }

    pub fn done(self) -> Option<T> {
        match self {
            SideEffect::Done(value) => Some(value),
            SideEffect::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            SideEffect::Done(_) => None,
            SideEffect::Failed(reason) => Some(reason),
        }
    }
}

/// Named steps of the cascade, reported back to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Step {
    LessonPoints,
    CourseCheck,
    CourseBonus,
    Achievements,
    NextCourse,
    Community,
    Certificate,
    /// Rendering the certificate PDF, after commit
    CertificateFile,
    Challenges,
}

/// How one side effect of a cascade ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: Step,
    /// `None` when the step succeeded
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn of<T>(step: Step, effect: &SideEffect<T>) -> Self {
        Self {
            step,
            error: effect.error().map(str::to_string),
        }
    }
}

/// Run `f` inside a savepoint. Errors roll back its writes and the
/// notifications it queued, get logged at warn and come back as
/// [`SideEffect::Failed`].
pub fn best_effort<T, F>(conn: &Connection, outbox: &mut Outbox, step: Step, user_id: i64, f: F) -> SideEffect<T>
where
    F: FnOnce(&Connection, &mut Outbox) -> AppResult<T>,
{
    if let Err(e) = conn.execute_batch("SAVEPOINT side_effect") {
        log::warn!("{} for user {} skipped, cannot open savepoint: {}", step, user_id, e);
        return SideEffect::Failed(e.to_string());
    }

    let queued = outbox.len();
    match f(conn, outbox) {
        Ok(value) => match conn.execute_batch("RELEASE side_effect") {
            Ok(()) => SideEffect::Done(value),
            Err(e) => {
                outbox.truncate(queued);
                log::warn!("{} for user {} failed on release: {}", step, user_id, e);
                SideEffect::Failed(e.to_string())
            }
        },
        Err(e) => {
            outbox.truncate(queued);
            if let Err(rollback) = conn.execute_batch("ROLLBACK TO side_effect; RELEASE side_effect") {
                log::error!("{} for user {}: savepoint rollback failed: {}", step, user_id, rollback);
            }
            log::warn!("{} for user {} failed: {}", step, user_id, e);
            SideEffect::Failed(e.to_string())
        }
    }
}

/// Whether a repeated lesson completion earns the lesson bonus again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LessonRewardPolicy {
    /// Only the completion that first marks the lesson done is rewarded
    #[default]
    Once,
    /// Every completion call is rewarded
    EveryCompletion,
}

/// Knobs of the cascade, passed explicitly instead of read from globals.
#[derive(Debug, Clone)]
pub struct CascadeSettings {
    pub lesson_reward: LessonRewardPolicy,
    /// Telegram ids that may open any lesson
    pub admin_ids: Vec<i64>,
    pub certificate_dir: PathBuf,
    /// Without trailing slash. `None` yields relative certificate URLs.
    pub public_base_url: Option<String>,
}

impl Default for CascadeSettings {
    fn default() -> Self {
        Self {
            lesson_reward: LessonRewardPolicy::Once,
            admin_ids: Vec::new(),
            certificate_dir: PathBuf::from("certificates"),
            public_base_url: None,
        }
    }
}

impl CascadeSettings {
    /// Build settings from the environment-backed config statics.
    pub fn from_env() -> Self {
        let lesson_reward = LessonRewardPolicy::from_str(config::LESSON_REWARD_POLICY.trim()).unwrap_or_else(|_| {
            log::warn!(
                "Unknown LESSON_REWARD_POLICY {:?}, using \"once\"",
                config::LESSON_REWARD_POLICY.as_str()
            );
            LessonRewardPolicy::Once
        });
        Self {
            lesson_reward,
            admin_ids: config::ADMIN_IDS.clone(),
            certificate_dir: PathBuf::from(config::CERTIFICATES_DIR.as_str()),
            public_base_url: config::PUBLIC_BASE_URL.clone(),
        }
    }

    pub fn is_admin(&self, telegram_id: i64) -> bool {
        self.admin_ids.contains(&telegram_id)
    }
}
