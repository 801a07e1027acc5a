use thiserror::Error;

/// Centralized error type for the core library.
///
/// `NotFound` and `Forbidden` are the hard failures of the lesson-completion
/// flow and are surfaced to callers as-is. Everything a best-effort step
/// produces is converted into a [`crate::gamification::SideEffect::Failed`]
/// and logged instead of being returned.
///
/// # Example
///
/// ```no_run
/// use bellecore::AppError;
///
/// fn describe(err: &AppError) -> String {
///     format!("Error: {}", err)
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Referenced user, lesson, course, challenge... does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Caller lacks access to the requested resource
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Request is well-formed but not allowed in the current state
    #[error("Validation error: {0}")]
    Validation(String),

    /// Certificate renderer failures
    #[error("Certificate rendering failed: {0}")]
    Render(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }
}
