use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::error::LedgerResult;
use crate::ledger::{Resolution, SubscriptionLedger, report_not_found, user_not_found, window_end};
use crate::models::{Decision, PaymentReport, PaymentStatus, ReportSubmission, VipUser};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, VipUser>,
    reports: BTreeMap<i64, PaymentReport>,
    last_report_id: i64,
}

impl Inner {
    fn user_mut(&mut self, user_id: i64, now: DateTime<Utc>) -> &mut VipUser {
        self.users
            .entry(user_id)
            .or_insert_with(|| VipUser::new(user_id, None, now))
    }
}

/// Process-local ledger. Every operation holds one lock, so
/// resolve+activate is as atomic as the Postgres transaction.
pub struct MemoryLedger {
    inner: Mutex<Inner>,
    activation_days: i64,
}

impl MemoryLedger {
    pub fn new(activation_days: i64) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            activation_days,
        }
    }
}

#[async_trait]
impl SubscriptionLedger for MemoryLedger {
    async fn record_user(&self, user_id: i64, display_name: Option<&str>) -> LedgerResult<()> {
        let mut inner = self.inner.lock().await;
        inner.user_mut(user_id, Utc::now()).username = display_name.map(str::to_string);
        Ok(())
    }

    async fn submit_report(&self, user_id: i64, report: &ReportSubmission) -> LedgerResult<i64> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        inner.user_mut(user_id, now);

        inner.last_report_id += 1;
        let id = inner.last_report_id;
        inner.reports.insert(
            id,
            PaymentReport {
                id,
                user_id,
                tx_hash: report.tx_hash().to_string(),
                amount: report.amount().to_string(),
                network: report.network().to_string(),
                note: report.note().map(str::to_string),
                status: PaymentStatus::Pending,
                created_at: now,
                processed_by: None,
                processed_at: None,
            },
        );
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
        let mut inner = self.inner.lock().await;

        let report = inner
            .reports
            .get_mut(&report_id)
            .filter(|r| r.status == PaymentStatus::Pending)
            .ok_or_else(|| report_not_found(report_id))?;
        report.status = decision.status();
        report.processed_by = Some(admin_id);
        report.processed_at = Some(now);
        let user_id = report.user_id;

        if expiry.is_some() {
            let user = inner.user_mut(user_id, now);
            user.is_active = true;
            user.expiry = expiry;
        }

        Ok(Resolution {
            report_id,
            user_id,
            decision,
            expiry,
        })
    }

    async fn activate(&self, user_id: i64, days: i64) -> LedgerResult<DateTime<Utc>> {
        let now = Utc::now();
        let expiry = window_end(now, days)?;
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(user_id, now);
        user.is_active = true;
        user.expiry = Some(expiry);
        Ok(expiry)
    }

    async fn deactivate(&self, user_id: i64) -> LedgerResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        user.is_active = false;
        user.expiry = None;
        Ok(())
    }

    async fn expire_user(&self, user_id: i64, now: DateTime<Utc>) -> LedgerResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.users.get_mut(&user_id) {
            Some(user) if user.is_expired_at(now) => {
                user.is_active = false;
                user.expiry = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_user(&self, user_id: i64) -> LedgerResult<Option<VipUser>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn list_pending(&self) -> LedgerResult<Vec<PaymentReport>> {
        let inner = self.inner.lock().await;
        let mut pending: Vec<PaymentReport> = inner
            .reports
            .values()
            .filter(|r| r.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        Ok(pending)
    }

    async fn expired_users(&self, now: DateTime<Utc>) -> LedgerResult<Vec<i64>> {
        let inner = self.inner.lock().await;
        let mut expired: Vec<&VipUser> = inner
            .users
            .values()
            .filter(|u| u.is_expired_at(now))
            .collect();
        expired.sort_by_key(|u| u.expiry);
        Ok(expired.into_iter().map(|u| u.user_id).collect())
    }
}
