//! Common test utilities
//!
//! Shared by the bellecore integration tests: an on-disk database in a
//! temporary directory, a small catalog builder and a notifier that records
//! what it was asked to send.

#![allow(dead_code)]

use async_trait::async_trait;
use bellecore::gamification::CascadeSettings;
use bellecore::notify::{Notifier, NotifyOutcome};
use bellecore::storage::catalog::{create_course, create_lesson, grant_access};
use bellecore::storage::users::{create_user, NewUser};
use bellecore::{create_pool, DbConnection, DbPool};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Mutex;
use tempfile::TempDir;

/// Temporary database plus certificate directory.
pub struct TestEnvironment {
    pub dir: TempDir,
    pub pool: DbPool,
    pub settings: CascadeSettings,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("belle.sqlite");
        let pool = create_pool(db_path.to_str().expect("utf-8 path")).expect("create pool");
        let settings = CascadeSettings {
            certificate_dir: dir.path().join("certificates"),
            ..Default::default()
        };
        Self { dir, pool, settings }
    }

    pub fn conn(&self) -> DbConnection {
        self.pool.get().expect("pooled connection")
    }

    pub fn user(&self, telegram_id: i64, full_name: &str, city: Option<&str>) -> i64 {
        create_user(
            &self.conn(),
            &NewUser {
                telegram_id,
                full_name,
                city,
                ..Default::default()
            },
        )
        .expect("create user")
    }

    /// A course with `lessons` lessons; only the first is free.
    pub fn course(&self, title: &str, category: &str, lessons: i64) -> (i64, Vec<i64>) {
        let conn = self.conn();
        let course = create_course(&conn, title, "", category).expect("create course");
        let ids = (1..=lessons)
            .map(|n| create_lesson(&conn, course, &format!("{} #{}", title, n), n, n == 1).expect("create lesson"))
            .collect();
        (course, ids)
    }

    pub fn enroll(&self, user: i64, course: i64) {
        grant_access(&self.conn(), user, course).expect("grant access");
    }
}

/// A fixed moment so certificate numbers and windows are predictable.
pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap()
}

/// Records every send; telegram ids listed in `failing` get `Failed`.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub failing: Vec<i64>,
}

impl RecordingNotifier {
    pub fn messages_for(&self, telegram_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == telegram_id)
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, telegram_id: i64, text: &str) -> NotifyOutcome {
        self.sent.lock().unwrap().push((telegram_id, text.to_string()));
        if self.failing.contains(&telegram_id) {
            NotifyOutcome::Failed("bot was blocked by the user".to_string())
        } else {
            NotifyOutcome::Delivered
        }
    }
}
