use std::sync::Arc;
use vipgate_db::SubscriptionLedger;

use crate::config::BotConfig;
use crate::services::notifier::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BotConfig>,
    pub ledger: Arc<dyn SubscriptionLedger>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub fn new(
        config: Arc<BotConfig>,
        ledger: Arc<dyn SubscriptionLedger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            ledger,
            notifier,
        }
    }
}
