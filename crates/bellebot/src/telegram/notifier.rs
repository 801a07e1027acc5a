use async_trait::async_trait;
use bellecore::{Notifier, NotifyOutcome};
use teloxide::prelude::*;
use teloxide::types::ParseMode;

/// Delivers notifications as HTML messages through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot: Bot::new(bot_token),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, telegram_id: i64, text: &str) -> NotifyOutcome {
        match self
            .bot
            .send_message(ChatId(telegram_id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => {
                log::debug!("Notification sent to {}", telegram_id);
                NotifyOutcome::Delivered
            }
            Err(e) => NotifyOutcome::Failed(e.to_string()),
        }
    }
}
