//! Belle core library
//!
//! Storage, learning progress and the gamification cascade of the Belle
//! beauty school. This crate has no Telegram dependency: notifications are
//! produced as plain [`notify::Notification`] values and delivered by
//! whichever [`notify::Notifier`] the binary plugs in.
//!
//! # Modules
//!
//! - [`core`] - configuration, errors and logging
//! - [`storage`] - SQLite pool, migrations and per-entity queries
//! - [`gamification`] - points, achievements, challenges, course completion,
//!   certificates and the lesson-completion orchestrator
//! - [`notify`] - notifier trait and message texts
//! - [`render`] - certificate PDF rendering

pub mod core;
pub mod gamification;
pub mod notify;
pub mod render;
pub mod storage;

pub use crate::core::{init_logger, AppError, AppResult};
pub use gamification::cascade::{complete_lesson, recheck_all_challenges, ChallengeRecheck, LessonCompletion};
pub use gamification::{CascadeSettings, LessonRewardPolicy, SideEffect};
pub use notify::{deliver_all, DeliveryReport, Notification, Notifier, NotifyOutcome};
pub use render::{CertificateRenderer, PdfCertificateRenderer};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
