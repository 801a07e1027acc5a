use once_cell::sync::Lazy;
use std::env;

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: belle.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "belle.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: belle.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "belle.log".to_string()));

/// Log level for console and file output ("error", "warn", "info", "debug", "trace")
/// Read from LOG_LEVEL environment variable
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable.
/// Used both for sending notifications and for validating Mini App initData.
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Telegram IDs with administrative access to every lesson.
/// Read from ADMIN_IDS as a comma-separated list, e.g. "123456789,987654321".
/// Malformed entries are skipped.
pub static ADMIN_IDS: Lazy<Vec<i64>> =
    Lazy::new(|| parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default()));

/// Directory where certificate PDFs are written
/// Read from CERTIFICATES_DIR environment variable
/// Default: certificates
pub static CERTIFICATES_DIR: Lazy<String> =
    Lazy::new(|| env::var("CERTIFICATES_DIR").unwrap_or_else(|_| "certificates".to_string()));

/// Public base URL used to build absolute certificate links.
/// When unset, certificate URLs are relative (`/api/certificates/<id>/download`).
pub static PUBLIC_BASE_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("PUBLIC_BASE_URL")
        .ok()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
});

/// Port of the Mini App HTTP API
/// Read from WEBAPP_PORT environment variable
/// Default: 8000
pub static WEBAPP_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBAPP_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000)
});

/// Whether repeating a lesson completion awards the lesson bonus again.
/// Read from LESSON_REWARD_POLICY: "once" (default) or "every_completion".
pub static LESSON_REWARD_POLICY: Lazy<String> =
    Lazy::new(|| env::var("LESSON_REWARD_POLICY").unwrap_or_else(|_| "once".to_string()));

/// Maximum accepted age of Telegram initData, in seconds.
/// Read from INIT_DATA_MAX_AGE_SECS. Default: 86400 (24 hours)
pub static INIT_DATA_MAX_AGE_SECS: Lazy<i64> = Lazy::new(|| {
    env::var("INIT_DATA_MAX_AGE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(86_400)
});

/// Local development switch: accept `X-Telegram-User-Id` without a signature.
/// Read from WEBAPP_DEV_MODE ("1" / "true"). Never enable in production.
pub static WEBAPP_DEV_MODE: Lazy<bool> = Lazy::new(|| {
    env::var("WEBAPP_DEV_MODE")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
});

/// Point rewards
pub mod points {
    /// Points for completing a lesson
    pub const PER_LESSON: i64 = 10;

    /// Points for completing a whole course
    pub const PER_COURSE: i64 = 100;
}

/// Leaderboard configuration
pub mod leaderboard {
    /// Entries returned when the client does not ask for a limit
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Upper bound for the `limit` query parameter
    pub const MAX_LIMIT: u32 = 100;
}

/// Inactivity reminder configuration
pub mod reminders {
    /// Days without a completed lesson before a reminder goes out
    pub const INACTIVE_DAYS: i64 = 7;
}

pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|id| {
            let id = id.trim();
            if id.is_empty() {
                return None;
            }
            match id.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Ignoring malformed ADMIN_IDS entry: {:?}", id);
                    None
                }
            }
        })
        .collect()
}
