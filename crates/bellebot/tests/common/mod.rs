//! Common test utilities
//!
//! Builds the Mini App router over a temporary on-disk database with a
//! recording notifier, and signs init data the way Telegram does.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bellebot::telegram::webapp_auth::sign_init_data;
use bellebot::{create_webapp_router, AuthSettings, WebAppState};
use bellecore::gamification::CascadeSettings;
use bellecore::storage::catalog::{create_course, create_lesson, grant_access};
use bellecore::storage::users::{create_user, NewUser};
use bellecore::{create_pool, DbConnection, DbPool, Notifier, NotifyOutcome, PdfCertificateRenderer};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOT_TOKEN: &str = "7000000001:test-token";

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i64, String)>>,
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
        NotifyOutcome::Delivered
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub pool: Arc<DbPool>,
    pub notifier: Arc<RecordingNotifier>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_dev_mode(false)
    }

    pub fn with_dev_mode(dev_mode: bool) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db_path = dir.path().join("belle.sqlite");
        let pool = Arc::new(create_pool(db_path.to_str().expect("utf-8 path")).expect("create pool"));
        let notifier = Arc::new(RecordingNotifier::default());

        let state = WebAppState {
            db_pool: Arc::clone(&pool),
            notifier: notifier.clone(),
            renderer: Arc::new(PdfCertificateRenderer),
            settings: CascadeSettings {
                certificate_dir: dir.path().join("certificates"),
                ..Default::default()
            },
            auth: AuthSettings {
                bot_token: BOT_TOKEN.to_string(),
                max_age_secs: 86_400,
                dev_mode,
            },
        };

        Self {
            router: create_webapp_router(state),
            dir,
            pool,
            notifier,
        }
    }

    pub fn conn(&self) -> DbConnection {
        self.pool.get().expect("pooled connection")
    }

    pub fn user(&self, telegram_id: i64, full_name: &str) -> i64 {
        create_user(
            &self.conn(),
            &NewUser {
                telegram_id,
                full_name,
                ..Default::default()
            },
        )
        .expect("create user")
    }

    /// A course with `lessons` lessons; only the first is free.
    pub fn course(&self, title: &str, lessons: i64) -> (i64, Vec<i64>) {
        let conn = self.conn();
        let course = create_course(&conn, title, "", "manicure").expect("create course");
        let ids = (1..=lessons)
            .map(|n| create_lesson(&conn, course, &format!("{} #{}", title, n), n, n == 1).expect("create lesson"))
            .collect();
        (course, ids)
    }

    pub fn enroll(&self, user: i64, course: i64) {
        grant_access(&self.conn(), user, course).expect("grant access");
    }

    /// Send a request signed for `telegram_id` (unsigned when `None`).
    pub async fn call(&self, method: &str, uri: &str, telegram_id: Option<i64>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = telegram_id {
            builder = builder.header("X-Telegram-Init-Data", init_data_for(id));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    /// Raw response for non-JSON endpoints: status, content type and body.
    pub async fn download(&self, uri: &str, telegram_id: Option<i64>) -> (StatusCode, Option<String>, Vec<u8>) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(id) = telegram_id {
            builder = builder.header("X-Telegram-Init-Data", init_data_for(id));
        }
        let response = self.router.clone().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, bytes.to_vec())
    }

    /// Wait for background delivery to reach `count` messages for a user.
    pub async fn wait_for_messages(&self, telegram_id: i64, count: usize) -> Vec<String> {
        for _ in 0..100 {
            let messages = self.notifier.messages_for(telegram_id);
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.notifier.messages_for(telegram_id)
    }
}

pub fn init_data_for(telegram_id: i64) -> String {
    let user = format!(r#"{{"id":{},"first_name":"Test"}}"#, telegram_id);
    let auth_date = Utc::now().timestamp().to_string();
    sign_init_data(&[("query_id", "AAHtest"), ("user", &user), ("auth_date", &auth_date)], BOT_TOKEN).unwrap()
}
