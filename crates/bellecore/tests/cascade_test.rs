//! Lesson-completion cascade, end to end against an on-disk database.

mod common;

use bellecore::gamification::achievements::evaluate_and_grant;
use bellecore::gamification::challenges::{join, JoinOutcome};
use bellecore::gamification::completion::check_and_mark;
use bellecore::gamification::{certificates, LessonRewardPolicy, Outbox, Step};
use bellecore::render::{CertificateContent, CertificateRenderer};
use bellecore::storage::achievements::create_achievement;
use bellecore::storage::catalog::get_enrollment;
use bellecore::storage::certificates::get_certificate;
use bellecore::storage::challenges::{create_challenge, get_participation, NewChallenge};
use bellecore::storage::communities::{create_community, CommunityKind};
use bellecore::storage::progress::{is_completed, upsert_completed};
use bellecore::storage::users::get_points;
use bellecore::{
    complete_lesson, deliver_all, recheck_all_challenges, AppError, AppResult, DbPool, PdfCertificateRenderer,
};
use common::{at, RecordingNotifier, TestEnvironment};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};

struct BrokenRenderer;

impl CertificateRenderer for BrokenRenderer {
    fn render(&self, _content: &CertificateContent<'_>, _output_path: &Path) -> AppResult<PathBuf> {
        Err(AppError::Render("disk full".to_string()))
    }
}

#[test]
fn three_lesson_course_completes_exactly_once() {
    let env = TestEnvironment::new();
    let user = env.user(100, "Anna Petrova", None);
    let (course, lessons) = env.course("Gel polish", "manicure", 3);
    env.enroll(user, course);
    let mut conn = env.conn();

    for lesson in &lessons[..2] {
        let result = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, *lesson, at(1, 10)).unwrap();
        assert!(!result.course_completed);
        assert!(result.certificate.is_none());
    }
    assert!(!get_enrollment(&conn, user, course).unwrap().unwrap().is_completed);

    let last = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[2], at(1, 11)).unwrap();
    assert!(last.course_completed);
    assert!(last.steps.iter().all(|s| s.error.is_none()), "{:?}", last.steps);

    let certificate = last.certificate.expect("certificate issued");
    assert_eq!(certificate.certificate_number, format!("CERT-{:05}-{:03}-20260601", user, course));
    assert_eq!(
        certificate.certificate_url,
        format!("/api/certificates/{}/download", certificate.id)
    );
    assert!(env
        .settings
        .certificate_dir
        .join(format!("{}.pdf", certificate.certificate_number))
        .exists());

    // 3 lessons + course bonus
    assert_eq!(get_points(&conn, user).unwrap(), Some(130));

    let mut outbox = Outbox::new();
    assert!(!check_and_mark(&conn, &mut outbox, user, course, at(1, 12)).unwrap());
    assert!(get_enrollment(&conn, user, course).unwrap().unwrap().is_completed);

    let again = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[2], at(1, 12)).unwrap();
    assert!(!again.course_completed);
    assert_eq!(get_points(&conn, user).unwrap(), Some(130));
}

#[test]
fn first_course_achievement_adds_two_hundred_points() {
    let env = TestEnvironment::new();
    let user = env.user(200, "Bella", None);
    let (course, lessons) = env.course("Brow shaping", "brows", 1);
    env.enroll(user, course);
    let conn = env.conn();
    let achievement = create_achievement(&conn, "First course", 100, "courses_completed", 1).unwrap();

    let mut outbox = Outbox::new();
    assert!(evaluate_and_grant(&conn, &mut outbox, user, at(2, 9)).unwrap().is_empty());

    upsert_completed(&conn, user, lessons[0], "2026-06-02 09:00:00").unwrap();
    let baseline = get_points(&conn, user).unwrap().unwrap();

    assert!(check_and_mark(&conn, &mut outbox, user, course, at(2, 10)).unwrap());
    assert_eq!(get_points(&conn, user).unwrap(), Some(baseline + 200));

    // granted once, a second evaluation changes nothing
    assert!(evaluate_and_grant(&conn, &mut outbox, user, at(2, 11)).unwrap().is_empty());
    assert_eq!(get_points(&conn, user).unwrap(), Some(baseline + 200));
    let granted: Vec<_> = bellecore::storage::achievements::list_earned(&conn, user)
        .unwrap()
        .into_iter()
        .map(|e| e.achievement.id)
        .collect();
    assert_eq!(granted, vec![achievement]);
}

#[test]
fn achievements_reported_by_the_cascade() {
    let env = TestEnvironment::new();
    let user = env.user(201, "Bella", None);
    let (course, lessons) = env.course("Brow shaping", "brows", 1);
    env.enroll(user, course);
    create_achievement(&env.conn(), "First course", 100, "courses_completed", 1).unwrap();
    let mut conn = env.conn();

    let result = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(2, 9)).unwrap();
    assert!(result.course_completed);
    assert_eq!(result.achievements.len(), 1);
    assert_eq!(result.achievements[0].title, "First course");
    // lesson + course + achievement
    assert_eq!(get_points(&conn, user).unwrap(), Some(210));
}

#[test]
fn repeat_completion_is_rewarded_once_by_default() {
    let env = TestEnvironment::new();
    let user = env.user(300, "Carla", None);
    let (course, lessons) = env.course("Lash lift", "eyelashes", 2);
    env.enroll(user, course);
    let mut conn = env.conn();

    let first = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(3, 9)).unwrap();
    assert!(first.newly_completed);
    assert_eq!(first.points_awarded, 10);

    let second = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(3, 10)).unwrap();
    assert!(!second.newly_completed);
    assert_eq!(second.points_awarded, 0);
    assert!(second.notifications.is_empty());
    assert_eq!(get_points(&conn, user).unwrap(), Some(10));
}

#[test]
fn repeat_completion_pays_again_under_every_completion_policy() {
    let mut env = TestEnvironment::new();
    env.settings.lesson_reward = LessonRewardPolicy::EveryCompletion;
    let user = env.user(301, "Carla", None);
    let (course, lessons) = env.course("Lash lift", "eyelashes", 2);
    env.enroll(user, course);
    let mut conn = env.conn();

    complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(3, 9)).unwrap();
    let second = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(3, 10)).unwrap();
    assert_eq!(second.points_awarded, 10);
    assert_eq!(get_points(&conn, user).unwrap(), Some(20));
}

#[test]
fn five_lesson_challenge_pays_once() {
    let env = TestEnvironment::new();
    let user = env.user(400, "Dina", None);
    let (course, lessons) = env.course("Nail art", "manicure", 6);
    env.enroll(user, course);
    let mut conn = env.conn();
    let challenge = create_challenge(
        &conn,
        &NewChallenge {
            title: "Five in June",
            description: "Finish five lessons",
            points_reward: 50,
            condition_type: "complete_lessons",
            condition_value: 5,
            start_date: Some("2026-06-01 00:00:00"),
            end_date: Some("2026-06-30 23:59:59"),
        },
    )
    .unwrap();
    let mut outbox = Outbox::new();
    assert_eq!(join(&conn, &mut outbox, user, challenge, at(4, 8)).unwrap(), JoinOutcome::Joined);

    for lesson in &lessons[..3] {
        complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, *lesson, at(4, 9)).unwrap();
    }
    let participation = get_participation(&conn, user, challenge).unwrap().unwrap();
    assert_eq!(participation.progress, 3);
    assert!(!participation.is_completed);

    complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[3], at(4, 10)).unwrap();
    let fifth = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[4], at(4, 11)).unwrap();
    assert_eq!(fifth.challenges_completed, vec![challenge]);

    let participation = get_participation(&conn, user, challenge).unwrap().unwrap();
    assert_eq!(participation.progress, 5);
    assert!(participation.is_completed);
    // 5 lessons + challenge reward
    assert_eq!(get_points(&conn, user).unwrap(), Some(100));

    assert!(recheck_all_challenges(&mut conn, user, at(4, 12)).unwrap().completed.is_empty());
    assert!(recheck_all_challenges(&mut conn, user, at(4, 13)).unwrap().completed.is_empty());
    assert_eq!(get_points(&conn, user).unwrap(), Some(100));
}

#[test]
fn challenges_outside_their_window_are_not_rechecked() {
    let env = TestEnvironment::new();
    let user = env.user(401, "Dina", None);
    let (course, lessons) = env.course("Nail art", "manicure", 2);
    env.enroll(user, course);
    let mut conn = env.conn();
    let challenge = create_challenge(
        &conn,
        &NewChallenge {
            title: "One in June",
            condition_type: "complete_lessons",
            condition_value: 1,
            points_reward: 20,
            end_date: Some("2026-06-05 23:59:59"),
            ..Default::default()
        },
    )
    .unwrap();
    let mut outbox = Outbox::new();
    join(&conn, &mut outbox, user, challenge, at(4, 8)).unwrap();

    let late = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(10, 9)).unwrap();
    assert!(late.challenges_completed.is_empty());
    assert!(!get_participation(&conn, user, challenge).unwrap().unwrap().is_completed);
}

#[test]
fn locked_lesson_is_forbidden_and_writes_nothing() {
    let env = TestEnvironment::new();
    let user = env.user(500, "Eva", None);
    let (_course, lessons) = env.course("Pedicure", "manicure", 3);
    let mut conn = env.conn();

    let err = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[1], at(5, 9)).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(!is_completed(&conn, user, lessons[1]).unwrap());
    assert_eq!(get_points(&conn, user).unwrap(), Some(0));

    // the first lesson is an open preview
    let preview = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(5, 9)).unwrap();
    assert_eq!(preview.points_awarded, 10);

    let missing = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, 9_999, at(5, 9)).unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}

#[test]
fn admins_open_any_lesson() {
    let mut env = TestEnvironment::new();
    env.settings.admin_ids = vec![600];
    let admin = env.user(600, "Admin", None);
    let (_course, lessons) = env.course("Pedicure", "manicure", 3);
    let mut conn = env.conn();

    let result = complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, admin, lessons[2], at(5, 9)).unwrap();
    assert!(result.newly_completed);
    // not enrolled, so the course can't complete
    assert!(!result.course_completed);
}

#[test]
fn certificate_failure_does_not_undo_completion() {
    let env = TestEnvironment::new();
    let user = env.user(700, "Fiona", None);
    let (course, lessons) = env.course("Makeup", "makeup", 1);
    env.enroll(user, course);
    let mut conn = env.conn();

    let result = complete_lesson(&mut conn, &BrokenRenderer, &env.settings, user, lessons[0], at(6, 9)).unwrap();
    assert!(result.course_completed);
    let failed: Vec<_> = result.steps.iter().filter(|s| s.error.is_some()).map(|s| s.step).collect();
    assert_eq!(failed, vec![Step::CertificateFile]);

    assert!(get_enrollment(&conn, user, course).unwrap().unwrap().is_completed);
    assert_eq!(get_points(&conn, user).unwrap(), Some(110));

    // The record stands and the file is rendered on the next request for it
    let certificate = result.certificate.expect("certificate issued");
    let path = certificates::file_path(&env.settings, &certificate);
    assert!(!path.exists());
    certificates::ensure_file(&conn, &PdfCertificateRenderer, &env.settings, &certificate).unwrap();
    assert!(path.exists());
}

/// Refuses to render unless the certificate row is visible to another
/// connection, i.e. already committed.
struct CommittedOnlyRenderer {
    pool: DbPool,
}

impl CertificateRenderer for CommittedOnlyRenderer {
    fn render(&self, content: &CertificateContent<'_>, output_path: &Path) -> AppResult<PathBuf> {
        let other = self.pool.get()?;
        if get_certificate(&other, content.user.id, content.course.id)?.is_none() {
            return Err(AppError::Render("certificate row is not committed yet".to_string()));
        }
        PdfCertificateRenderer.render(content, output_path)
    }
}

#[test]
fn certificate_file_is_written_after_commit() {
    let env = TestEnvironment::new();
    let user = env.user(750, "Анна Петрова", None);
    let (course, lessons) = env.course("Маникюр", "manicure", 1);
    env.enroll(user, course);
    let renderer = CommittedOnlyRenderer { pool: env.pool.clone() };
    let mut conn = env.conn();

    let result = complete_lesson(&mut conn, &renderer, &env.settings, user, lessons[0], at(6, 10)).unwrap();
    assert!(result.steps.iter().all(|s| s.error.is_none()), "{:?}", result.steps);
    let certificate = result.certificate.expect("certificate issued");
    assert!(certificates::file_path(&env.settings, &certificate).exists());
}

#[tokio::test]
async fn notifications_are_delivered_after_commit() {
    let env = TestEnvironment::new();
    let user = env.user(800, "Galina", Some("Kazan"));
    let (course, lessons) = env.course("Gel polish", "manicure", 1);
    env.course("Gel polish pro", "manicure", 2);
    env.enroll(user, course);
    create_community(
        &env.conn(),
        "Kazan beauty",
        CommunityKind::City,
        Some("Kazan"),
        None,
        "https://t.me/kazan_beauty",
    )
    .unwrap();

    let result = {
        let mut conn = env.conn();
        complete_lesson(&mut conn, &PdfCertificateRenderer, &env.settings, user, lessons[0], at(7, 9)).unwrap()
    };
    // lesson, course, next course, community
    assert_eq!(result.notifications.len(), 4);

    let notifier = RecordingNotifier {
        failing: vec![800],
        ..Default::default()
    };
    let report = deliver_all(&notifier, &result.notifications).await;
    assert_eq!(report.failed, 4);
    assert_eq!(report.sent, 0);

    let texts = notifier.messages_for(800);
    assert!(texts[0].contains("Lesson completed"));
    assert!(texts[1].contains("Congratulations"));
    assert!(texts[2].contains("Gel polish pro"));
    assert!(texts[3].contains("https://t.me/kazan_beauty"));
    assert!(texts[3].contains("Kazan"));
}
