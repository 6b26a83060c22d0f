use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};
use vipgate_db::LedgerError;
use vipgate_db::models::{Decision, ReportSubmission};

use crate::AppState;
use crate::bot::commands::Command;
use crate::bot::templates::{self, InviteDelivery};
use crate::services::notifier::notify_admins;

/// Who sent an inbound message.
#[derive(Debug, Clone)]
pub struct Sender {
    pub user_id: i64,
    pub display_name: Option<String>,
}

/// Handles one inbound text to completion and returns the reply, if any.
/// `None` means stay silent (unknown text, or a non-admin using an admin command).
pub async fn handle_command(state: &AppState, sender: &Sender, text: &str) -> Option<String> {
    let command = Command::parse(text);

    if let Err(e) = state
        .ledger
        .record_user(sender.user_id, sender.display_name.as_deref())
        .await
    {
        warn!("Failed to record user {}: {}", sender.user_id, e);
    }

    if command.is_admin_only() && !state.config.is_admin(sender.user_id) {
        debug!("Ignoring admin command from {}", sender.user_id);
        return None;
    }

    let reply = match command {
        Command::Start | Command::Help => templates::help(&state.config.bot_name),
        Command::Vip => templates::plan(&state.config.membership, state.config.vip_days),
        Command::Pago => templates::report_format(),
        Command::ReportLine(line) => submit_report(state, sender, &line).await,
        Command::Status => status(state, sender.user_id).await,
        Command::ListPending => list_pending(state).await,
        Command::Approve(report_id) => approve(state, sender.user_id, report_id).await,
        Command::Reject(report_id) => reject(state, sender.user_id, report_id).await,
        Command::Deactivate(user_id) => deactivate(state, user_id).await,
        Command::MalformedAdmin(verb) => templates::malformed_admin(verb),
        Command::Unknown => return None,
    };
    Some(reply)
}

fn storage_failure(action: &str, err: &LedgerError) -> String {
    error!("{} failed: {}", action, err);
    templates::generic_failure()
}

async fn submit_report(state: &AppState, sender: &Sender, line: &str) -> String {
    let report = match ReportSubmission::parse(line) {
        Ok(report) => report,
        Err(LedgerError::Validation(reason)) => return templates::invalid_report(&reason),
        Err(e) => return storage_failure("Parsing payment report", &e),
    };

    let report_id = match state.ledger.submit_report(sender.user_id, &report).await {
        Ok(id) => id,
        Err(LedgerError::Validation(reason)) => return templates::invalid_report(&reason),
        Err(e) => return storage_failure("Submitting payment report", &e),
    };

    let notice = templates::admin_new_report(
        report_id,
        sender.user_id,
        sender.display_name.as_deref(),
        &report,
    );
    notify_admins(
        &*state.notifier,
        state.config.admin_ids.iter(),
        &notice,
    )
    .await;

    templates::report_received(report_id)
}

async fn status(state: &AppState, user_id: i64) -> String {
    match state.ledger.get_user(user_id).await {
        // Only reachable when the upsert at the top of handle_command failed.
        Ok(None) => templates::status_unknown(),
        Ok(Some(user)) => match user.expiry {
            Some(expiry) if user.is_active && !user.is_expired_at(Utc::now()) => {
                templates::status_active(expiry)
            }
            _ => templates::status_inactive(),
        },
        Err(e) => storage_failure("Loading user status", &e),
    }
}

async fn list_pending(state: &AppState) -> String {
    match state.ledger.list_pending().await {
        Ok(reports) if reports.is_empty() => templates::no_pending(),
        Ok(reports) => templates::pending_list(&reports),
        Err(e) => storage_failure("Listing pending reports", &e),
    }
}

async fn approve(state: &AppState, admin_id: i64, report_id: i64) -> String {
    let resolution = match state
        .ledger
        .resolve_report(report_id, Decision::Approved, admin_id)
        .await
    {
        Ok(resolution) => resolution,
        Err(LedgerError::NotFound(_)) => return templates::report_not_found(),
        Err(e) => return storage_failure("Approving payment report", &e),
    };

    let days = state.config.vip_days;
    let expiry = resolution
        .expiry
        .unwrap_or_else(|| Utc::now() + Duration::days(days));

    let invite = match state
        .notifier
        .create_invite_link(state.config.vip_channel_id, expiry, 1)
        .await
    {
        Ok(link) => {
            let message = templates::invite_for_user(&link, days, expiry);
            match state.notifier.send_text(resolution.user_id, &message).await {
                Ok(()) => InviteDelivery::Sent,
                Err(e) => {
                    error!("Failed to send invite to user {}: {:#}", resolution.user_id, e);
                    InviteDelivery::Undelivered(link)
                }
            }
        }
        Err(e) => {
            error!("Invite link for user {} failed: {:#}", resolution.user_id, e);
            InviteDelivery::LinkFailed
        }
    };

    info!(
        "Admin {} approved report #{} for user {}",
        admin_id, report_id, resolution.user_id
    );
    templates::approved(report_id, resolution.user_id, expiry, &invite)
}

async fn reject(state: &AppState, admin_id: i64, report_id: i64) -> String {
    let resolution = match state
        .ledger
        .resolve_report(report_id, Decision::Rejected, admin_id)
        .await
    {
        Ok(resolution) => resolution,
        Err(LedgerError::NotFound(_)) => return templates::report_not_found(),
        Err(e) => return storage_failure("Rejecting payment report", &e),
    };

    if let Err(e) = state
        .notifier
        .send_text(resolution.user_id, &templates::rejected_for_user(report_id))
        .await
    {
        error!("notify user {} failed: {:#}", resolution.user_id, e);
    }

    info!("Admin {} rejected report #{}", admin_id, report_id);
    templates::rejected(report_id)
}

async fn deactivate(state: &AppState, user_id: i64) -> String {
    match state.ledger.deactivate(user_id).await {
        Ok(()) => templates::deactivated(user_id),
        Err(LedgerError::NotFound(_)) => templates::user_not_found(),
        Err(e) => storage_failure("Deactivating user", &e),
    }
}
