use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::error::LedgerResult;
use crate::models::{PaymentReport, PaymentStatus, ReportSubmission};

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// FIFO review queue.
    pub async fn list_pending(&self) -> LedgerResult<Vec<PaymentReport>> {
        let reports = sqlx::query_as::<_, PaymentReport>(
            "SELECT * FROM payments WHERE status = 'pending' ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    pub(crate) async fn insert_with<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: i64,
        report: &ReportSubmission,
    ) -> LedgerResult<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO payments (user_id, tx_hash, amount, network, note)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(report.tx_hash())
        .bind(report.amount())
        .bind(report.network())
        .bind(report.note())
        .fetch_one(executor)
        .await?;
        Ok(id)
    }

    /// Moves a pending report to `status`. Yields the owning user id, or
    /// `None` when the report is unknown or already resolved.
    pub(crate) async fn mark_resolved_with<'e, E: PgExecutor<'e>>(
        executor: E,
        id: i64,
        status: PaymentStatus,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> LedgerResult<Option<i64>> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE payments
            SET status = $1, processed_by = $2, processed_at = $3
            WHERE id = $4 AND status = 'pending'
            RETURNING user_id
            "#,
        )
        .bind(status.as_str())
        .bind(admin_id)
        .bind(at)
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(user_id)
    }
}
