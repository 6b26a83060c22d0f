use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vipgate_db::{MemoryLedger, PgLedger, SubscriptionLedger};

mod bot;
mod config;
mod services;
mod state;

use crate::bot::BotExit;
use crate::config::BotConfig;
use crate::services::expiry_sweeper::ExpirySweeper;
use crate::services::notifier::TelegramNotifier;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "vipgate-bot")]
#[command(about = "Telegram bot for manually reviewed VIP subscriptions", long_about = None)]
struct Cli {
    /// Keep the ledger in memory instead of PostgreSQL (development only)
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot and the expiry sweeper (default)
    Serve,
    /// Run a single expiry sweep and exit
    Sweep,
    /// Print the pending payment review queue
    Pending,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: failed to load .env file: {}", e);
        }
    }

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "vipgate_bot=info,vipgate_db=info,teloxide=warn,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(BotConfig::load().context("Invalid configuration")?);
    info!(
        "Config loaded: channel {}, {} admin(s), {} day window",
        config.vip_channel_id,
        config.admin_ids.len(),
        config.vip_days
    );

    let ledger: Arc<dyn SubscriptionLedger> = if cli.memory {
        warn!("Using in-memory ledger; all data is lost on exit");
        Arc::new(MemoryLedger::new(config.vip_days))
    } else {
        let pool = vipgate_db::connect(&config.database_url, config.db_max_connections).await?;
        Arc::new(PgLedger::new(pool, config.vip_days))
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config, ledger).await,
        Commands::Sweep => {
            let sweeper = ExpirySweeper::new(ledger, config.sweep_interval());
            let report = sweeper.sweep_once(Utc::now()).await?;
            println!(
                "{} expired, {} deactivated, {} skipped, {} failed",
                report.expired, report.deactivated, report.skipped, report.failed
            );
            Ok(())
        }
        Commands::Pending => {
            let pending = ledger.list_pending().await?;
            if pending.is_empty() {
                println!("No pending payment reports.");
            }
            for p in pending {
                println!(
                    "#{}\tuser:{}\ttx:{}\tamt:{}\tnet:{}\tnote:{}\tat:{}",
                    p.id,
                    p.user_id,
                    p.tx_hash,
                    p.amount,
                    p.network,
                    p.note.as_deref().unwrap_or("-"),
                    p.created_at.to_rfc3339()
                );
            }
            Ok(())
        }
    }
}

async fn serve(config: Arc<BotConfig>, ledger: Arc<dyn SubscriptionLedger>) -> Result<()> {
    let bot = Bot::new(config.bot_token.clone());
    let notifier = Arc::new(TelegramNotifier::new(bot.clone()));
    let state = AppState::new(config.clone(), ledger.clone(), notifier);

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(4);

    let sweeper = ExpirySweeper::new(ledger, config.sweep_interval());
    let sweeper_rx = shutdown_tx.subscribe();
    let sweeper_task = tokio::spawn(async move { sweeper.start(sweeper_rx).await });

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            let _ = ctrl_c_tx.send(());
        }
    });

    let delay = config.poll_restart_delay();
    loop {
        match bot::run_bot(bot.clone(), state.clone(), &mut shutdown_rx).await {
            Ok(BotExit::Shutdown) => break,
            Ok(BotExit::Stopped) => warn!("Polling stopped, restarting in {:?}", delay),
            Err(e) => error!("Polling failed: {:#}. Restarting in {:?}", e, delay),
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.recv() => break,
        }
    }

    let _ = shutdown_tx.send(());
    sweeper_task.await.context("Expiry sweeper task panicked")?;
    info!("Bye");
    Ok(())
}
