use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A bot user and their VIP window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VipUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub is_active: bool,
    pub expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VipUser {
    pub fn new(user_id: i64, username: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username,
            is_active: false,
            expiry: None,
            created_at: now,
        }
    }

    /// Active but past its expiry; the sweeper demotes these.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expiry.is_some_and(|e| e <= now)
    }
}
