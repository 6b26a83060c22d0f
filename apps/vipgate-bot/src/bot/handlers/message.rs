use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{error, info};

use super::command::{handle_command, Sender};
use crate::AppState;

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };

    let sender = Sender {
        user_id: from.id.0 as i64,
        display_name: from.username.clone().or_else(|| Some(from.full_name())),
    };
    info!("Message from {}: {:?}", sender.user_id, text);

    if let Some(reply) = handle_command(&state, &sender, text).await {
        if let Err(e) = bot
            .send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::Html)
            .await
        {
            error!("Failed to reply in chat {}: {}", msg.chat.id, e);
        }
    }
    Ok(())
}
