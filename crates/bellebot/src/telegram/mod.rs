//! Telegram-facing side of the backend: the Mini App HTTP API, initData
//! validation and the Bot API notifier.

pub mod notifier;
pub mod webapp;
pub mod webapp_auth;

pub use notifier::TelegramNotifier;
pub use webapp::{create_webapp_router, run_webapp_server, AuthSettings, WebAppState};
