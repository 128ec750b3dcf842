//! Telegram alert delivery.
//!
//! Uses teloxide Bot directly (send-only, no dispatcher). Reports are sent
//! as plain text under a bold subject line, in HTML parse mode.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::warn;

use super::{truncate_chars, AlertSink, SinkError};
use crate::monitor::report::{html_escape, Report};

/// Telegram caps messages at 4096 characters; leave room for markup.
const MAX_BODY_CHARS: usize = 3800;

/// Sends alerts to a fixed set of Telegram chats.
pub struct TelegramSink {
    bot: Bot,
    notify_users: Vec<i64>,
}

impl TelegramSink {
    /// Create a sink for a bot token and recipient chat IDs.
    pub fn new(bot_token: &str, notify_users: Vec<i64>) -> Self {
        Self {
            bot: Bot::new(bot_token),
            notify_users,
        }
    }

    /// Message text for a subject and report.
    pub fn format_message(subject: &str, report: &Report) -> String {
        format!(
            "<b>{subject}</b>\n\n{body}",
            subject = html_escape(subject),
            body = html_escape(&truncate_chars(&report.to_text(), MAX_BODY_CHARS)),
        )
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    async fn send(&self, subject: &str, report: &Report) -> Result<(), SinkError> {
        if self.notify_users.is_empty() {
            return Ok(());
        }
        let text = Self::format_message(subject, report);
        let mut any_sent = false;
        for &user_id in &self.notify_users {
            match self
                .bot
                .send_message(ChatId(user_id), text.as_str())
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(_) => any_sent = true,
                Err(e) => warn!(user_id, error = %e, "failed to send Telegram message"),
            }
        }
        if any_sent {
            Ok(())
        } else {
            Err(SinkError::NoRecipients)
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
