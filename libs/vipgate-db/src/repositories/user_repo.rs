use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};

use crate::error::LedgerResult;
use crate::models::VipUser;

const USER_COLUMNS: &str = "user_id, username, is_active, expiry, created_at";

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the user or overwrites the stored display name.
    pub async fn upsert(&self, user_id: i64, username: Option<&str>) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, username)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username
            "#,
        )
        .bind(user_id)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, user_id: i64) -> LedgerResult<Option<VipUser>> {
        let user = sqlx::query_as::<_, VipUser>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn activate(&self, user_id: i64, expiry: DateTime<Utc>) -> LedgerResult<()> {
        Self::activate_with(&self.pool, user_id, expiry).await
    }

    /// Returns false when no such user exists.
    pub async fn deactivate(&self, user_id: i64) -> LedgerResult<bool> {
        let result =
            sqlx::query("UPDATE users SET is_active = FALSE, expiry = NULL WHERE user_id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Conditional demotion: a window renewed after `now` is left alone.
    pub async fn expire(&self, user_id: i64, now: DateTime<Utc>) -> LedgerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET is_active = FALSE, expiry = NULL
            WHERE user_id = $1 AND is_active = TRUE AND expiry <= $2
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_expired(&self, now: DateTime<Utc>) -> LedgerResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM users WHERE is_active = TRUE AND expiry <= $1 ORDER BY expiry",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub(crate) async fn ensure_exists_with<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: i64,
    ) -> LedgerResult<()> {
        sqlx::query("INSERT INTO users (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Sets the window to exactly `expiry`, replacing whatever was there.
    pub(crate) async fn activate_with<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: i64,
        expiry: DateTime<Utc>,
    ) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, is_active, expiry)
            VALUES ($1, TRUE, $2)
            ON CONFLICT (user_id) DO UPDATE SET is_active = TRUE, expiry = EXCLUDED.expiry
            "#,
        )
        .bind(user_id)
        .bind(expiry)
        .execute(executor)
        .await?;
        Ok(())
    }
}
