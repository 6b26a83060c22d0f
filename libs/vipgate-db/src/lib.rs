pub mod db;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod models;
pub mod repositories;

pub use sqlx;

pub use db::connect;
pub use error::{LedgerError, LedgerResult};
pub use ledger::{MAX_ACTIVATION_DAYS, PgLedger, Resolution, SubscriptionLedger, window_end};
pub use memory::MemoryLedger;
