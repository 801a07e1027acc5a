//! Lesson-completion orchestrator.
//!
//! ```text
//! Started -> PointsAwarded -> CourseChecked -> [CourseCompleted -> CertificateIssued
//!                                               -> RecommendationsSent] -> Done
//! ```
//!
//! The whole cascade runs in one transaction. Only the access check and the
//! progress write can fail the call; every later step is best-effort and is
//! reported in [`LessonCompletion::steps`]. The certificate PDF is rendered
//! after commit, so a rolled-back cascade leaves no file behind.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use super::achievements::GrantedAchievement;
use super::completion::{self, CourseCompletion};
use super::progress::{check_lesson_access, LessonAccess};
use super::{best_effort, certificates, challenges, points, recommendations};
use super::{CascadeSettings, LessonRewardPolicy, Outbox, SideEffect, Step, StepOutcome};
use crate::core::config;
use crate::core::error::AppResult;
use crate::notify::{messages, Notification};
use crate::render::CertificateRenderer;
use crate::storage::certificates::Certificate;
use crate::storage::{self, progress};

/// Everything one lesson completion produced.
#[derive(Debug, Clone, Serialize)]
pub struct LessonCompletion {
    pub lesson_id: i64,
    pub course_id: i64,
    /// This call moved the lesson to completed
    pub newly_completed: bool,
    pub points_awarded: i64,
    pub course_completed: bool,
    pub certificate: Option<Certificate>,
    pub achievements: Vec<GrantedAchievement>,
    pub challenges_completed: Vec<i64>,
    /// Queued messages; deliver them after this returns
    #[serde(skip)]
    pub notifications: Vec<Notification>,
    pub steps: Vec<StepOutcome>,
}

/// Mark a lesson completed and run the reward cascade.
///
/// Fails with `NotFound` when the user, lesson or course is missing and with
/// `Forbidden` when the user may not open the lesson; nothing is written in
/// either case.
pub fn complete_lesson(
    conn: &mut Connection,
    renderer: &dyn CertificateRenderer,
    settings: &CascadeSettings,
    user_id: i64,
    lesson_id: i64,
    now: DateTime<Utc>,
) -> AppResult<LessonCompletion> {
    let tx = conn.transaction()?;
    let access = check_lesson_access(&tx, settings, user_id, lesson_id)?;
    let newly_completed = progress::upsert_completed(&tx, user_id, lesson_id, &storage::timestamp(now))?;

    let mut outbox = Outbox::new();
    let mut steps = Vec::new();

    let points_awarded = award_lesson_points(&tx, &mut outbox, &mut steps, settings, &access, newly_completed, now);

    let course_id = access.course.id;
    let checked = best_effort(&tx, &mut outbox, Step::CourseCheck, user_id, |conn, outbox| {
        completion::detect_completion(conn, outbox, user_id, course_id, now)
    });
    steps.push(StepOutcome::of(Step::CourseCheck, &checked));

    let mut achievements = Vec::new();
    let mut certificate = None;
    let course_completed = match checked {
        SideEffect::Done(Some(course_completion)) => {
            achievements = announce_course_completion(&mut outbox, &mut steps, &access, course_completion);
            let issued = best_effort(&tx, &mut outbox, Step::Certificate, user_id, |conn, _| {
                certificates::issue_record(conn, settings, user_id, course_id, now)
            });
            steps.push(StepOutcome::of(Step::Certificate, &issued));
            certificate = issued.done();
            recommend(&tx, &mut outbox, &mut steps, &access);
            true
        }
        _ => false,
    };

    let rechecked = best_effort(&tx, &mut outbox, Step::Challenges, user_id, |conn, outbox| {
        challenges::recheck_all(conn, outbox, user_id, now)
    });
    steps.push(StepOutcome::of(Step::Challenges, &rechecked));
    let challenges_completed = rechecked.done().unwrap_or_default();

    tx.commit()?;

    // Files are written only once the certificate row is committed
    if let Some(issued) = &certificate {
        let rendered = match certificates::ensure_file(conn, renderer, settings, issued) {
            Ok(path) => SideEffect::Done(path),
            Err(e) => {
                log::warn!("{} for user {} failed: {}", Step::CertificateFile, user_id, e);
                SideEffect::Failed(e.to_string())
            }
        };
        steps.push(StepOutcome::of(Step::CertificateFile, &rendered));
    }

    log::info!(
        "User {} completed lesson {} (new: {}, +{} points, course completed: {})",
        user_id,
        lesson_id,
        newly_completed,
        points_awarded,
        course_completed
    );

    Ok(LessonCompletion {
        lesson_id,
        course_id,
        newly_completed,
        points_awarded,
        course_completed,
        certificate,
        achievements,
        challenges_completed,
        notifications: outbox,
        steps,
    })
}

fn award_lesson_points(
    conn: &Connection,
    outbox: &mut Outbox,
    steps: &mut Vec<StepOutcome>,
    settings: &CascadeSettings,
    access: &LessonAccess,
    newly_completed: bool,
    now: DateTime<Utc>,
) -> i64 {
    let rewarded = match settings.lesson_reward {
        LessonRewardPolicy::Once => newly_completed,
        LessonRewardPolicy::EveryCompletion => true,
    };
    if !rewarded {
        return 0;
    }

    let awarded = best_effort(conn, outbox, Step::LessonPoints, access.user.id, |conn, outbox| {
        points::award_lesson(conn, access.user.id, &access.lesson.title, now)?;
        outbox.push(Notification::new(
            access.user.telegram_id,
            messages::lesson_completed(&access.lesson.title, &access.course.title, config::points::PER_LESSON),
        ));
        Ok(config::points::PER_LESSON)
    });
    steps.push(StepOutcome::of(Step::LessonPoints, &awarded));
    awarded.done().unwrap_or(0)
}

/// Record the completion steps and queue the course-completed message.
/// Returns the achievements granted by the completion.
fn announce_course_completion(
    outbox: &mut Outbox,
    steps: &mut Vec<StepOutcome>,
    access: &LessonAccess,
    course_completion: CourseCompletion,
) -> Vec<GrantedAchievement> {
    steps.push(StepOutcome::of(Step::CourseBonus, &course_completion.bonus));
    steps.push(StepOutcome::of(Step::Achievements, &course_completion.achievements));
    let bonus = if course_completion.bonus.is_done() {
        config::points::PER_COURSE
    } else {
        0
    };

    outbox.push(Notification::new(
        access.user.telegram_id,
        messages::course_completed(&access.course.title, bonus),
    ));
    course_completion.achievements.done().unwrap_or_default()
}

/// Next-course and community recommendations after a course completion.
fn recommend(conn: &Connection, outbox: &mut Outbox, steps: &mut Vec<StepOutcome>, access: &LessonAccess) {
    let user = &access.user;
    let course = &access.course;

    let next = best_effort(conn, outbox, Step::NextCourse, user.id, |conn, outbox| {
        if let Some(next) = recommendations::next_course(conn, user.id, course)? {
            outbox.push(Notification::new(user.telegram_id, messages::next_course(&next.title)));
        }
        Ok(())
    });
    steps.push(StepOutcome::of(Step::NextCourse, &next));

    let community = best_effort(conn, outbox, Step::Community, user.id, |conn, outbox| {
        if let Some(pick) = recommendations::community_for(conn, user, course)? {
            outbox.push(Notification::new(
                user.telegram_id,
                messages::community(&pick.community.title, &pick.community.telegram_link, &pick.reason),
            ));
        }
        Ok(())
    });
    steps.push(StepOutcome::of(Step::Community, &community));
}

/// Outcome of a standalone challenge recheck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeRecheck {
    pub completed: Vec<i64>,
    #[serde(skip)]
    pub notifications: Vec<Notification>,
}

/// Recheck all of a user's running challenges in one transaction.
pub fn recheck_all_challenges(conn: &mut Connection, user_id: i64, now: DateTime<Utc>) -> AppResult<ChallengeRecheck> {
    let tx = conn.transaction()?;
    let mut outbox = Outbox::new();
    let completed = challenges::recheck_all(&tx, &mut outbox, user_id, now)?;
    tx.commit()?;
    Ok(ChallengeRecheck {
        completed,
        notifications: outbox,
    })
}
