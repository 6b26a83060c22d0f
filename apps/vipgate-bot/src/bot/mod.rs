use teloxide::{dptree, prelude::*, types::Update};
use tokio::sync::broadcast;
use tracing::{error, info};

pub mod commands;
pub mod handlers;
pub mod templates;

/// Why `run_bot` returned.
#[derive(Debug, PartialEq, Eq)]
pub enum BotExit {
    Shutdown,
    Stopped,
}

pub async fn run_bot(
    bot: Bot,
    state: crate::AppState,
    shutdown_signal: &mut broadcast::Receiver<()>,
) -> anyhow::Result<BotExit> {
    info!("Bot identity check...");
    let me = bot.get_me().await.map_err(|e| {
        error!("Bot failed to connect to Telegram: {}", e);
        anyhow::Error::new(e).context("getMe failed")
    })?;
    info!(
        "Bot connected as: @{}",
        me.username.as_deref().unwrap_or("unknown")
    );

    let handler = Update::filter_message().endpoint(handlers::message::message_handler);

    // One queue for every chat: inbound messages are handled strictly one at a time.
    let mut dispatcher = Dispatcher::builder(bot, dptree::entry().branch(handler))
        .dependencies(dptree::deps![state])
        .distribution_function(|_| Some(()))
        .default_handler(|upd: std::sync::Arc<Update>| async move {
            info!("Unhandled update: {:?}", upd.id);
        })
        .build();

    tokio::select! {
        _ = dispatcher.dispatch() => {
            info!("Bot dispatcher exited");
            Ok(BotExit::Stopped)
        }
        _ = shutdown_signal.recv() => {
            info!("Bot received shutdown signal, stopping...");
            Ok(BotExit::Shutdown)
        }
    }
}
