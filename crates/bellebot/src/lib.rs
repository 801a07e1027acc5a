//! Belle bot - Mini App API, Telegram notifications and maintenance jobs
//!
//! The gamification logic lives in `bellecore`; this crate wires it to the
//! outside world.
//!
//! # Module Structure
//!
//! - `cli`: command line interface
//! - `jobs`: reminder, challenge recheck and announcement jobs
//! - `telegram`: axum Mini App API, initData validation, Bot API notifier

pub mod cli;
pub mod jobs;
pub mod telegram;

pub use telegram::{create_webapp_router, run_webapp_server, AuthSettings, TelegramNotifier, WebAppState};
