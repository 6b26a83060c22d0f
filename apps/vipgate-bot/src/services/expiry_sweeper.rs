use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use vipgate_db::{LedgerResult, SubscriptionLedger};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub deactivated: usize,
    /// Renewed between the query and the update.
    pub skipped: usize,
    pub failed: usize,
}

/// Demotes users whose VIP window has elapsed, on a fixed period.
pub struct ExpirySweeper {
    ledger: Arc<dyn SubscriptionLedger>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(ledger: Arc<dyn SubscriptionLedger>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting expiry sweeper (every {:?})...", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once(Utc::now()).await {
                        Ok(report) if report.expired > 0 => info!(
                            "Expiry sweep: {} expired, {} deactivated, {} skipped, {} failed",
                            report.expired, report.deactivated, report.skipped, report.failed
                        ),
                        Ok(_) => debug!("Expiry sweep: nothing to do"),
                        Err(e) => error!("Expiry sweep failed, retrying next tick: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("Expiry sweeper stopping");
                    break;
                }
            }
        }
    }

    /// One pass. Only the initial query can fail the pass; individual
    /// deactivation errors are logged and counted.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> LedgerResult<SweepReport> {
        let expired = self.ledger.expired_users(now).await?;
        let mut report = SweepReport {
            expired: expired.len(),
            ..Default::default()
        };

        for user_id in expired {
            match self.ledger.expire_user(user_id, now).await {
                Ok(true) => {
                    info!("Deactivated expired user {}", user_id);
                    report.deactivated += 1;
                }
                Ok(false) => {
                    debug!("User {} renewed before the sweep reached it", user_id);
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!("Failed to deactivate expired user {}: {}", user_id, e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use vipgate_db::models::{Decision, PaymentReport, ReportSubmission, VipUser};
    use vipgate_db::{LedgerError, MemoryLedger, Resolution};

    #[tokio::test]
    async fn sweep_restores_active_implies_future_expiry() {
        let ledger = Arc::new(MemoryLedger::new(30));
        ledger.activate(1, 1).await.unwrap();
        ledger.activate(2, 3).await.unwrap();
        ledger.activate(3, 30).await.unwrap();
        let sweeper = ExpirySweeper::new(ledger.clone(), Duration::from_secs(3600));

        let now = Utc::now() + ChronoDuration::days(5);
        let report = sweeper.sweep_once(now).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                expired: 2,
                deactivated: 2,
                skipped: 0,
                failed: 0
            }
        );

        for id in [1, 2, 3] {
            let user = ledger.get_user(id).await.unwrap().unwrap();
            assert!(!user.is_active || user.expiry.unwrap() > now);
            if !user.is_active {
                assert_eq!(user.expiry, None);
            }
        }
        assert!(ledger.get_user(3).await.unwrap().unwrap().is_active);

        let again = sweeper.sweep_once(now).await.unwrap();
        assert_eq!(again, SweepReport::default());
    }

    /// Delegates to a memory ledger, failing expiry of one user and
    /// optionally the whole expiry query.
    struct FlakyLedger {
        inner: MemoryLedger,
        broken_user: i64,
        query_down: AtomicBool,
    }

    #[async_trait]
    impl SubscriptionLedger for FlakyLedger {
        async fn record_user(&self, user_id: i64, name: Option<&str>) -> LedgerResult<()> {
            self.inner.record_user(user_id, name).await
        }
        async fn submit_report(&self, user_id: i64, r: &ReportSubmission) -> LedgerResult<i64> {
            self.inner.submit_report(user_id, r).await
        }
        async fn resolve_report(&self, id: i64, d: Decision, admin: i64) -> LedgerResult<Resolution> {
            self.inner.resolve_report(id, d, admin).await
        }
        async fn activate(&self, user_id: i64, days: i64) -> LedgerResult<DateTime<Utc>> {
            self.inner.activate(user_id, days).await
        }
        async fn deactivate(&self, user_id: i64) -> LedgerResult<()> {
            self.inner.deactivate(user_id).await
        }
        async fn expire_user(&self, user_id: i64, now: DateTime<Utc>) -> LedgerResult<bool> {
            if user_id == self.broken_user {
                return Err(LedgerError::Storage(vipgate_db::sqlx::Error::PoolTimedOut));
            }
            self.inner.expire_user(user_id, now).await
        }
        async fn get_user(&self, user_id: i64) -> LedgerResult<Option<VipUser>> {
            self.inner.get_user(user_id).await
        }
        async fn list_pending(&self) -> LedgerResult<Vec<PaymentReport>> {
            self.inner.list_pending().await
        }
        async fn expired_users(&self, now: DateTime<Utc>) -> LedgerResult<Vec<i64>> {
            if self.query_down.load(Ordering::SeqCst) {
                return Err(LedgerError::Storage(vipgate_db::sqlx::Error::PoolClosed));
            }
            self.inner.expired_users(now).await
        }
    }

    #[tokio::test]
    async fn individual_failures_do_not_stop_the_batch() {
        let ledger = Arc::new(FlakyLedger {
            inner: MemoryLedger::new(30),
            broken_user: 2,
            query_down: AtomicBool::new(false),
        });
        for id in [1, 2, 3] {
            ledger.activate(id, 1).await.unwrap();
        }
        let sweeper = ExpirySweeper::new(ledger.clone(), Duration::from_secs(3600));

        let report = sweeper
            .sweep_once(Utc::now() + ChronoDuration::days(2))
            .await
            .unwrap();

        assert_eq!(report.expired, 3);
        assert_eq!(report.deactivated, 2);
        assert_eq!(report.failed, 1);
        assert!(!ledger.get_user(3).await.unwrap().unwrap().is_active);
        assert!(ledger.get_user(2).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn query_failure_fails_the_pass_only() {
        let ledger = Arc::new(FlakyLedger {
            inner: MemoryLedger::new(30),
            broken_user: 0,
            query_down: AtomicBool::new(true),
        });
        ledger.activate(1, 1).await.unwrap();
        let sweeper = ExpirySweeper::new(ledger.clone(), Duration::from_secs(3600));
        let later = Utc::now() + ChronoDuration::days(2);

        assert!(sweeper.sweep_once(later).await.is_err());

        ledger.query_down.store(false, Ordering::SeqCst);
        assert_eq!(sweeper.sweep_once(later).await.unwrap().deactivated, 1);
    }

    /// Approves a pending report for `user_id` right after the expired ids
    /// are read, as an admin racing the sweeper would.
    struct RenewingLedger {
        inner: MemoryLedger,
        renew: i64,
        report_id: i64,
    }

    #[async_trait]
    impl SubscriptionLedger for RenewingLedger {
        async fn record_user(&self, user_id: i64, name: Option<&str>) -> LedgerResult<()> {
            self.inner.record_user(user_id, name).await
        }
        async fn submit_report(&self, user_id: i64, r: &ReportSubmission) -> LedgerResult<i64> {
            self.inner.submit_report(user_id, r).await
        }
        async fn resolve_report(&self, id: i64, d: Decision, admin: i64) -> LedgerResult<Resolution> {
            self.inner.resolve_report(id, d, admin).await
        }
        async fn activate(&self, user_id: i64, days: i64) -> LedgerResult<DateTime<Utc>> {
            self.inner.activate(user_id, days).await
        }
        async fn deactivate(&self, user_id: i64) -> LedgerResult<()> {
            self.inner.deactivate(user_id).await
        }
        async fn expire_user(&self, user_id: i64, now: DateTime<Utc>) -> LedgerResult<bool> {
            self.inner.expire_user(user_id, now).await
        }
        async fn get_user(&self, user_id: i64) -> LedgerResult<Option<VipUser>> {
            self.inner.get_user(user_id).await
        }
        async fn list_pending(&self) -> LedgerResult<Vec<PaymentReport>> {
            self.inner.list_pending().await
        }
        async fn expired_users(&self, now: DateTime<Utc>) -> LedgerResult<Vec<i64>> {
            let ids = self.inner.expired_users(now).await?;
            let resolution = self
                .inner
                .resolve_report(self.report_id, Decision::Approved, 1)
                .await?;
            assert_eq!(resolution.user_id, self.renew);
            Ok(ids)
        }
    }

    #[tokio::test]
    async fn approval_during_sweep_keeps_the_new_window() {
        let inner = MemoryLedger::new(30);
        inner.activate(42, 0).await.unwrap();
        let report_id = inner
            .submit_report(42, &ReportSubmission::parse("0xrenew;10;BSC").unwrap())
            .await
            .unwrap();
        let ledger = Arc::new(RenewingLedger {
            inner,
            renew: 42,
            report_id,
        });
        let sweeper = ExpirySweeper::new(ledger.clone(), Duration::from_secs(3600));

        let now = Utc::now() + ChronoDuration::seconds(1);
        let report = sweeper.sweep_once(now).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                expired: 1,
                deactivated: 0,
                skipped: 1,
                failed: 0
            }
        );

        let user = ledger.get_user(42).await.unwrap().unwrap();
        assert!(user.is_active, "approved report #{} lost its window", report_id);
        assert!(user.expiry.unwrap() > now + ChronoDuration::days(29));
    }

    #[tokio::test]
    async fn start_sweeps_until_shutdown() {
        let ledger = Arc::new(MemoryLedger::new(30));
        ledger.activate(1, 0).await.unwrap();
        let sweeper = ExpirySweeper::new(ledger.clone(), Duration::from_millis(20));
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(async move { sweeper.start(rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("sweeper did not stop")
            .unwrap();
        assert!(!ledger.get_user(1).await.unwrap().unwrap().is_active);
    }
}
