use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use vipgate_db::MAX_ACTIVATION_DAYS;

/// Payment instructions shown by `/vip`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Membership {
    #[serde(default = "default_price")]
    pub price: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_network")]
    pub network: String,
    pub address: String,
}

/// Everything the bot needs, read once at startup and shared as `Arc<BotConfig>`.
#[derive(Clone, Deserialize)]
pub struct BotConfig {
    pub bot_token: String,
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    pub vip_channel_id: i64,
    pub admin_ids: BTreeSet<i64>,
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    pub membership: Membership,
    #[serde(default = "default_vip_days")]
    pub vip_days: i64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_poll_restart_delay_secs")]
    pub poll_restart_delay_secs: u64,
}

fn default_price() -> String {
    "10".to_string()
}
fn default_currency() -> String {
    "USDT".to_string()
}
fn default_network() -> String {
    "BSC BEP20".to_string()
}
fn default_bot_name() -> String {
    "VIP Bot".to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_vip_days() -> i64 {
    30
}
fn default_sweep_interval_secs() -> u64 {
    3600
}
fn default_poll_restart_delay_secs() -> u64 {
    5
}

impl BotConfig {
    pub fn load() -> Result<Self> {
        let mut config_paths = vec!["/etc/vipgate/bot.toml".to_string(), "./vipgate.toml".to_string()];
        if let Ok(explicit) = std::env::var("VIPGATE_CONFIG") {
            config_paths.insert(0, explicit);
        }

        for path in &config_paths {
            if let Ok(contents) = fs::read_to_string(path) {
                tracing::info!("Loading config from {}", path);
                let config: Self = toml::from_str(&contents)
                    .with_context(|| format!("Invalid config file {}", path))?;
                return config.validate();
            }
        }

        tracing::info!("Loading config from environment");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `KEY -> value` pairs, usually the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .with_context(|| format!("{} env var is required", key))
        };
        let optional = |key: &str, default: fn() -> String| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(default)
        };

        let config = Self {
            bot_token: required("BOT_TOKEN")?,
            bot_name: optional("BOT_NAME", default_bot_name),
            vip_channel_id: parse_value("VIP_CHANNEL_ID", &required("VIP_CHANNEL_ID")?)?,
            admin_ids: parse_admin_ids(&required("ADMIN_IDS")?)?,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", &lookup, default_db_max_connections)?,
            membership: Membership {
                price: optional("MEMBERSHIP_PRICE", default_price),
                currency: optional("MEMBERSHIP_CURRENCY", default_currency),
                network: optional("NETWORK", default_network),
                address: required("CRYPTO_ADDRESS")?,
            },
            vip_days: parse_or("DEFAULT_VIP_DAYS", &lookup, default_vip_days)?,
            sweep_interval_secs: parse_or("SWEEP_INTERVAL_SECS", &lookup, default_sweep_interval_secs)?,
            poll_restart_delay_secs: parse_or(
                "POLL_RESTART_DELAY_SECS",
                &lookup,
                default_poll_restart_delay_secs,
            )?,
        };
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.bot_token.trim().is_empty() {
            anyhow::bail!("bot_token must not be empty");
        }
        if self.admin_ids.is_empty() {
            anyhow::bail!("at least one admin id is required");
        }
        if self.membership.address.trim().is_empty() {
            anyhow::bail!("crypto address must not be empty");
        }
        if !(1..=MAX_ACTIVATION_DAYS).contains(&self.vip_days) {
            anyhow::bail!(
                "vip_days must be between 1 and {}, got {}",
                MAX_ACTIVATION_DAYS,
                self.vip_days
            );
        }
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("sweep_interval_secs must be positive");
        }
        Ok(self)
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn poll_restart_delay(&self) -> Duration {
        Duration::from_secs(self.poll_restart_delay_secs)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has invalid value '{}'", key, raw))
}

fn parse_or<T, F>(key: &str, lookup: &F, default: fn() -> T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default()),
    }
}

/// Comma separated, blanks ignored: `"123, 456,"`.
fn parse_admin_ids(raw: &str) -> Result<BTreeSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_value("ADMIN_IDS", s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 5] = [
        ("BOT_TOKEN", "123:abc"),
        ("VIP_CHANNEL_ID", "-1001234567890"),
        ("ADMIN_IDS", "111, 222,"),
        ("DATABASE_URL", "postgres://localhost/vip"),
        ("CRYPTO_ADDRESS", "0xdeadbeef"),
    ];

    #[test]
    fn loads_required_values_with_defaults() {
        let config = BotConfig::from_lookup(env(&REQUIRED)).unwrap();

        assert_eq!(config.vip_channel_id, -1001234567890);
        assert!(config.is_admin(111));
        assert!(config.is_admin(222));
        assert!(!config.is_admin(333));
        assert_eq!(config.membership.price, "10");
        assert_eq!(config.membership.currency, "USDT");
        assert_eq!(config.membership.network, "BSC BEP20");
        assert_eq!(config.vip_days, 30);
        assert_eq!(config.sweep_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn missing_required_value_names_the_variable() {
        for (missing, _) in REQUIRED {
            let pairs: Vec<(&str, &str)> =
                REQUIRED.iter().copied().filter(|(k, _)| *k != missing).collect();
            let err = BotConfig::from_lookup(env(&pairs)).err().unwrap();
            assert!(
                err.to_string().contains(missing),
                "error for {} was: {}",
                missing,
                err
            );
        }
    }

    #[test]
    fn rejects_malformed_numbers() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEFAULT_VIP_DAYS", "thirty"));
        assert!(BotConfig::from_lookup(env(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("ADMIN_IDS", "111,abc");
        assert!(BotConfig::from_lookup(env(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs[2] = ("ADMIN_IDS", " , ");
        assert!(BotConfig::from_lookup(env(&pairs)).is_err());
    }

    #[test]
    fn vip_days_must_fit_the_activation_bounds() {
        for days in ["0", "-5", "3651", "200000000"] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push(("DEFAULT_VIP_DAYS", days));
            let err = BotConfig::from_lookup(env(&pairs)).err().unwrap();
            assert!(err.to_string().contains("vip_days"), "{}: {}", days, err);
        }

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEFAULT_VIP_DAYS", "3650"));
        assert_eq!(BotConfig::from_lookup(env(&pairs)).unwrap().vip_days, 3650);
    }

    #[test]
    fn parses_toml_file_layout() {
        let config: BotConfig = toml::from_str(
            r#"
            bot_token = "123:abc"
            vip_channel_id = -10042
            admin_ids = [7, 8]
            database_url = "postgres://localhost/vip"
            vip_days = 7

            [membership]
            address = "0xfeed"
            network = "TRC20"
            "#,
        )
        .unwrap();
        let config = config.validate().unwrap();

        assert_eq!(config.vip_days, 7);
        assert_eq!(config.membership.network, "TRC20");
        assert_eq!(config.membership.price, "10");
        assert!(config.is_admin(8));
    }
}
