use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{error, info};

/// Outbound side of the messaging platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends an HTML-formatted message.
    async fn send_text(&self, chat_id: i64, html: &str) -> Result<()>;

    /// Creates an invite link to `channel_id` that expires at `expire_at`
    /// and admits at most `member_limit` people.
    async fn create_invite_link(
        &self,
        channel_id: i64,
        expire_at: DateTime<Utc>,
        member_limit: u32,
    ) -> Result<String>;
}

#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, chat_id: i64, html: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), html)
            .parse_mode(ParseMode::Html)
            .await
            .with_context(|| format!("Failed to send message to {}", chat_id))?;
        Ok(())
    }

    async fn create_invite_link(
        &self,
        channel_id: i64,
        expire_at: DateTime<Utc>,
        member_limit: u32,
    ) -> Result<String> {
        let link = self
            .bot
            .create_chat_invite_link(ChatId(channel_id))
            .expire_date(expire_at)
            .member_limit(member_limit)
            .await
            .with_context(|| format!("createChatInviteLink failed for {}", channel_id))?;
        info!("Created invite link for channel {} (expires {})", channel_id, expire_at);
        Ok(link.invite_link)
    }
}

/// Best-effort fan out. Returns how many deliveries succeeded.
pub async fn notify_admins<'a, I>(notifier: &dyn Notifier, admin_ids: I, html: &str) -> usize
where
    I: IntoIterator<Item = &'a i64>,
{
    let mut delivered = 0;
    for admin_id in admin_ids {
        match notifier.send_text(*admin_id, html).await {
            Ok(()) => delivered += 1,
            Err(e) => error!("notify admin {} failed: {:#}", admin_id, e),
        }
    }
    delivered
}
