use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bellecore::gamification::leaderboard::{self, LeaderboardEntry, LeaderboardOrder, MyPosition};
use bellecore::gamification::progress::{self, CourseProgress};
use bellecore::gamification::{certificates, challenges, points, CascadeSettings};
use bellecore::notify::Notification;
use bellecore::storage::achievements::{self as achievement_store, Achievement, EarnedAchievement};
use bellecore::storage::certificates::CertificateListing;
use bellecore::storage::challenges::{Challenge, UserChallenge};
use bellecore::storage::users::{self, PointsEntry, User};
use bellecore::{
    complete_lesson, deliver_all, AppError as CoreError, CertificateRenderer, DbConnection, DbPool, LessonCompletion,
    Notifier,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::telegram::webapp_auth;

// ============================================================================
// API DATA STRUCTURES
// ============================================================================

/// Lesson as shown in the Mini App player
#[derive(Debug, Serialize)]
pub struct LessonDetail {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub order: i64,
    pub video_url: Option<String>,
    pub video_duration: Option<i64>,
    pub pdf_url: Option<String>,
    /// The first lesson of a course is always a free preview
    pub is_free: bool,
}

#[derive(Debug, Serialize)]
pub struct MyAchievements {
    pub total_points: i64,
    pub achievements: Vec<EarnedAchievement>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
    /// "points" (default) or "courses"
    pub by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// Cascade result plus the balance after it
#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    #[serde(flatten)]
    pub completion: LessonCompletion,
    pub total_points: i64,
}

// ============================================================================
// APPLICATION STATE
// ============================================================================

/// How callers are authenticated
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub bot_token: String,
    /// Oldest accepted initData, in seconds
    pub max_age_secs: i64,
    /// Accept `X-Telegram-User-Id` without a signature (local development only)
    pub dev_mode: bool,
}

/// Shared state for all endpoints
#[derive(Clone)]
pub struct WebAppState {
    pub db_pool: Arc<DbPool>,
    pub notifier: Arc<dyn Notifier>,
    pub renderer: Arc<dyn CertificateRenderer>,
    pub settings: CascadeSettings,
    pub auth: AuthSettings,
}

// ============================================================================
// HELPERS
// ============================================================================

/// Telegram id of the caller, from signed init data (or the dev header)
fn extract_telegram_id(headers: &HeaderMap, auth: &AuthSettings) -> Result<i64, ApiError> {
    if auth.dev_mode {
        if let Some(id) = headers
            .get("X-Telegram-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            log::debug!("Dev mode: trusting X-Telegram-User-Id {}", id);
            return Ok(id);
        }
    }

    let init_data = headers
        .get("X-Telegram-Init-Data")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Telegram init data".to_string()))?;

    let user = webapp_auth::validate_telegram_webapp_data(
        init_data,
        &auth.bot_token,
        auth.max_age_secs,
        Utc::now().timestamp(),
    )
    .map_err(|e| {
        log::warn!("Rejected Mini App request: {}", e);
        ApiError::Unauthorized(format!("Invalid init data: {}", e))
    })?;

    Ok(user.id)
}

fn connection(state: &WebAppState) -> Result<DbConnection, ApiError> {
    bellecore::get_connection(&state.db_pool).map_err(|e| ApiError::Internal(format!("DB error: {}", e)))
}

/// Registered user behind a Telegram id
fn current_user(conn: &DbConnection, telegram_id: i64) -> Result<User, ApiError> {
    users::get_user_by_telegram_id(conn, telegram_id)
        .map_err(CoreError::from)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

/// Send queued notifications without holding up the response.
fn deliver_in_background(state: &WebAppState, notifications: Vec<Notification>) {
    if notifications.is_empty() {
        return;
    }
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        let report = deliver_all(notifier.as_ref(), &notifications).await;
        log::info!("Delivered {} of {} notifications", report.sent, report.total());
    });
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            CoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            CoreError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
            CoreError::Validation(_) => ApiError::BadRequest(err.to_string()),
            _ => {
                log::error!("Request failed: {}", err);
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the Mini App router
pub fn create_webapp_router(state: WebAppState) -> Router {
    // CORS for the Mini App
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/lessons/{id}", get(handle_get_lesson))
        .route("/api/lessons/{id}/complete", post(handle_complete_lesson))
        .route("/api/courses/{id}/progress", get(handle_course_progress))
        .route("/api/achievements", get(handle_list_achievements))
        .route("/api/achievements/my", get(handle_my_achievements))
        .route("/api/challenges", get(handle_list_challenges))
        .route("/api/challenges/my", get(handle_my_challenges))
        .route("/api/challenges/{id}/join", post(handle_join_challenge))
        .route("/api/leaderboard", get(handle_leaderboard))
        .route("/api/leaderboard/my-position", get(handle_my_position))
        .route("/api/certificates/my", get(handle_my_certificates))
        .route("/api/certificates/course/{course_id}", get(handle_course_certificate))
        .route("/api/certificates/{id}/download", get(handle_download_certificate))
        .route("/api/points/history", get(handle_points_history))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Start the Mini App web server
pub async fn run_webapp_server(port: u16, state: WebAppState) -> anyhow::Result<()> {
    let app = create_webapp_router(state);

    let addr = format!("0.0.0.0:{}", port);
    log::info!("Starting Mini App API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// API HANDLERS
// ============================================================================

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "belle-webapp"
    }))
}

/// GET /api/lessons/{id} - lesson content, if the caller may open it
async fn handle_get_lesson(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<i64>,
) -> Result<Json<LessonDetail>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;

    let access = progress::check_lesson_access(&conn, &state.settings, user.id, lesson_id)?;
    let lesson = access.lesson;
    Ok(Json(LessonDetail {
        id: lesson.id,
        course_id: lesson.course_id,
        is_free: lesson.is_free || lesson.lesson_order == 1,
        title: lesson.title,
        description: lesson.description,
        order: lesson.lesson_order,
        video_url: lesson.video_url,
        video_duration: lesson.video_duration,
        pdf_url: lesson.pdf_url,
    }))
}

/// POST /api/lessons/{id}/complete - mark done and run the reward cascade
async fn handle_complete_lesson(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<i64>,
) -> Result<Json<CompletionResponse>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let mut conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;

    let completion = complete_lesson(
        &mut conn,
        state.renderer.as_ref(),
        &state.settings,
        user.id,
        lesson_id,
        Utc::now(),
    )?;
    let total_points = users::get_points(&conn, user.id).map_err(CoreError::from)?.unwrap_or(0);
    drop(conn);

    deliver_in_background(&state, completion.notifications.clone());

    Ok(Json(CompletionResponse {
        completion,
        total_points,
    }))
}

/// GET /api/courses/{id}/progress
async fn handle_course_progress(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(course_id): Path<i64>,
) -> Result<Json<CourseProgress>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    Ok(Json(progress::course_progress(&conn, user.id, course_id)?))
}

/// GET /api/achievements - the full catalogue
async fn handle_list_achievements(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Achievement>>, ApiError> {
    extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let achievements = achievement_store::list_achievements(&conn).map_err(CoreError::from)?;
    Ok(Json(achievements))
}

/// GET /api/achievements/my
async fn handle_my_achievements(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
) -> Result<Json<MyAchievements>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    let achievements = achievement_store::list_earned(&conn, user.id).map_err(CoreError::from)?;
    Ok(Json(MyAchievements {
        total_points: user.points,
        achievements,
    }))
}

/// GET /api/challenges - challenges running right now
async fn handle_list_challenges(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Challenge>>, ApiError> {
    extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    Ok(Json(challenges::list_active(&conn, Utc::now())?))
}

/// GET /api/challenges/my
async fn handle_my_challenges(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserChallenge>>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    Ok(Json(challenges::user_challenges(&conn, user.id)?))
}

/// POST /api/challenges/{id}/join
async fn handle_join_challenge(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(challenge_id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;

    let mut outbox = Vec::new();
    let outcome = challenges::join(&conn, &mut outbox, user.id, challenge_id, Utc::now())?;
    drop(conn);
    deliver_in_background(&state, outbox);

    Ok(Json(serde_json::json!({
        "challenge_id": challenge_id,
        "status": outcome
    })))
}

/// GET /api/leaderboard?limit=10&by=points
async fn handle_leaderboard(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    extract_telegram_id(&headers, &state.auth)?;
    let order = match query.by.as_deref() {
        None => LeaderboardOrder::default(),
        Some(by) => by
            .parse::<LeaderboardOrder>()
            .map_err(|_| ApiError::BadRequest(format!("Unknown leaderboard order: {}", by)))?,
    };
    let conn = connection(&state)?;
    Ok(Json(leaderboard::top(&conn, query.limit, order)?))
}

/// GET /api/leaderboard/my-position
async fn handle_my_position(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
) -> Result<Json<MyPosition>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    Ok(Json(leaderboard::position(&conn, user.id)?))
}

/// GET /api/certificates/my
async fn handle_my_certificates(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CertificateListing>>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    Ok(Json(certificates::user_certificates(&conn, user.id)?))
}

/// GET /api/certificates/course/{course_id}
async fn handle_course_certificate(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(course_id): Path<i64>,
) -> Result<Json<CertificateListing>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    Ok(Json(certificates::user_certificate_for_course(&conn, user.id, course_id)?))
}

/// GET /api/certificates/{id}/download - the caller's own certificate PDF
async fn handle_download_certificate(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Path(certificate_id): Path<i64>,
) -> Result<Response, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    let (certificate, path) =
        certificates::owned_file(&conn, state.renderer.as_ref(), &state.settings, user.id, certificate_id)?;
    drop(conn);

    let bytes = fs_err::read(&path).map_err(|e| {
        log::error!("Cannot read certificate {}: {}", certificate.certificate_number, e);
        ApiError::Internal("Internal server error".to_string())
    })?;
    let disposition = format!(
        "attachment; filename=\"certificate_{}.pdf\"",
        certificate.certificate_number
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/points/history?limit=20
async fn handle_points_history(
    State(state): State<Arc<WebAppState>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<PointsEntry>>, ApiError> {
    let telegram_id = extract_telegram_id(&headers, &state.auth)?;
    let conn = connection(&state)?;
    let user = current_user(&conn, telegram_id)?;
    Ok(Json(points::points_history(&conn, user.id, query.limit.unwrap_or(20))?))
}
