use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::info;

use crate::error::{LedgerError, LedgerResult};
use crate::models::{Decision, PaymentReport, ReportSubmission, VipUser};
use crate::repositories::{PaymentRepository, UserRepository};

/// Outcome of resolving a pending report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub report_id: i64,
    pub user_id: i64,
    pub decision: Decision,
    /// New expiry of the owning user; set only for approvals.
    pub expiry: Option<DateTime<Utc>>,
}

/// Persisted users, payment reports and the transitions between them.
#[async_trait]
pub trait SubscriptionLedger: Send + Sync {
    async fn record_user(&self, user_id: i64, display_name: Option<&str>) -> LedgerResult<()>;

    async fn submit_report(&self, user_id: i64, report: &ReportSubmission) -> LedgerResult<i64>;

    /// Resolves a pending report exactly once. Approval activates the
    /// owning user in the same atomic step.
    async fn resolve_report(
        &self,
        report_id: i64,
        decision: Decision,
        admin_id: i64,
    ) -> LedgerResult<Resolution>;

    /// Resets the window to `now + days`. Remaining time is not carried over.
    async fn activate(&self, user_id: i64, days: i64) -> LedgerResult<DateTime<Utc>>;

    async fn deactivate(&self, user_id: i64) -> LedgerResult<()>;

    /// Deactivates the user only if the window is still elapsed at `now`.
    /// Returns false when the user was renewed or already inactive.
    async fn expire_user(&self, user_id: i64, now: DateTime<Utc>) -> LedgerResult<bool>;

    async fn get_user(&self, user_id: i64) -> LedgerResult<Option<VipUser>>;

    async fn list_pending(&self) -> LedgerResult<Vec<PaymentReport>>;

    async fn expired_users(&self, now: DateTime<Utc>) -> LedgerResult<Vec<i64>>;
}

/// Longest activation window accepted by [`window_end`].
pub const MAX_ACTIVATION_DAYS: i64 = 3650;

/// End of a `days` long window starting at `now`.
pub fn window_end(now: DateTime<Utc>, days: i64) -> LedgerResult<DateTime<Utc>> {
    if !(0..=MAX_ACTIVATION_DAYS).contains(&days) {
        return Err(LedgerError::WindowOutOfRange(days));
    }
    Duration::try_days(days)
        .and_then(|window| now.checked_add_signed(window))
        .ok_or(LedgerError::WindowOutOfRange(days))
}

pub(crate) fn report_not_found(report_id: i64) -> LedgerError {
    LedgerError::NotFound(format!("no pending payment report #{}", report_id))
}

pub(crate) fn user_not_found(user_id: i64) -> LedgerError {
    LedgerError::NotFound(format!("no user {}", user_id))
}

#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    users: UserRepository,
    payments: PaymentRepository,
    activation_days: i64,
}

impl PgLedger {
    pub fn new(pool: PgPool, activation_days: i64) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            pool,
            activation_days,
        }
    }
}

#[async_trait]
impl SubscriptionLedger for PgLedger {
    async fn record_user(&self, user_id: i64, display_name: Option<&str>) -> LedgerResult<()> {
        self.users.upsert(user_id, display_name).await
    }

    async fn submit_report(&self, user_id: i64, report: &ReportSubmission) -> LedgerResult<i64> {
        let mut tx = self.pool.begin().await?;
        UserRepository::ensure_exists_with(&mut *tx, user_id).await?;
        let id = PaymentRepository::insert_with(&mut *tx, user_id, report).await?;
        tx.commit().await?;

        info!("Payment report #{} submitted by user {}", id, user_id);
        Ok(id)
    }

    async fn resolve_report(
        &self,
        report_id: i64,
        decision: Decision,
        admin_id: i64,
    ) -> LedgerResult<Resolution> {
        let now = Utc::now();
        let expiry = match decision {
            Decision::Approved => Some(window_end(now, self.activation_days)?),
            Decision::Rejected => None,
        };
        let mut tx = self.pool.begin().await?;

        let Some(user_id) = PaymentRepository::mark_resolved_with(
            &mut *tx,
            report_id,
            decision.status(),
            admin_id,
            now,
        )
        .await?
        else {
            tx.rollback().await?;
            return Err(report_not_found(report_id));
        };

        if let Some(expiry) = expiry {
            UserRepository::activate_with(&mut *tx, user_id, expiry).await?;
        }

        tx.commit().await?;

        info!(
            "Payment report #{} {} by admin {} (user {})",
            report_id,
            decision.status(),
            admin_id,
            user_id
        );
        Ok(Resolution {
            report_id,
            user_id,
            decision,
            expiry,
        })
    }

    async fn activate(&self, user_id: i64, days: i64) -> LedgerResult<DateTime<Utc>> {
        let expiry = window_end(Utc::now(), days)?;
        self.users.activate(user_id, expiry).await?;
        info!("User {} activated until {}", user_id, expiry);
        Ok(expiry)
    }

    async fn deactivate(&self, user_id: i64) -> LedgerResult<()> {
        if !self.users.deactivate(user_id).await? {
            return Err(user_not_found(user_id));
        }
        info!("User {} deactivated", user_id);
        Ok(())
    }

    async fn expire_user(&self, user_id: i64, now: DateTime<Utc>) -> LedgerResult<bool> {
        self.users.expire(user_id, now).await
    }

    async fn get_user(&self, user_id: i64) -> LedgerResult<Option<VipUser>> {
        self.users.get(user_id).await
    }

    async fn list_pending(&self) -> LedgerResult<Vec<PaymentReport>> {
        self.payments.list_pending().await
    }

    async fn expired_users(&self, now: DateTime<Utc>) -> LedgerResult<Vec<i64>> {
        self.users.list_expired(now).await
    }
}
