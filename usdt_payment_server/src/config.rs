use std::{env, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use upg_common::{
    helpers::{parse_boolean_flag, parse_comma_list},
    Secret,
};
use usdt_payment_engine::{IssuerConfig, ReconcileConfig, TronGridConfig};

use crate::membership::{utc_offset, DEFAULT_UTC_OFFSET_HOURS};

const DEFAULT_UPG_HOST: &str = "127.0.0.1";
const DEFAULT_UPG_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/payment.db";
const DEFAULT_MEMBERSHIP_DATABASE_URL: &str = "sqlite://data/bot_data.db";
const DEFAULT_USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
const DEFAULT_TRONGRID_URL: &str = "https://api.trongrid.io";
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_ORDER_TIMEOUT_MINUTES: i64 = 10;
const DEFAULT_MIN_CONFIRMATIONS: u64 = 20;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
const DEFAULT_TX_MAX_AGE_MINUTES: i64 = 15;
const DEFAULT_BATCH_SIZE: usize = 50;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// The database holding the membership table that grants are written to.
    pub membership_database_url: String,
    /// Whole hours east of UTC of the bot's local time, in which membership expiries are stored.
    pub membership_utc_offset_hours: i32,
    /// The wallet that receives payments. The server refuses to start without one.
    pub wallet_address: String,
    pub usdt_contract: String,
    pub trongrid_url: String,
    pub trongrid_api_keys: Vec<Secret<String>>,
    pub telegram: TelegramConfig,
    /// How long a customer has to pay an order.
    pub order_timeout: Duration,
    pub min_confirmations: u64,
    /// Time between reconciliation ticks.
    pub poll_interval: StdDuration,
    /// Transfers older than this when first seen are never matched.
    pub tx_max_age: Duration,
    pub batch_size: usize,
    /// Re-attempt the grant for orders left `Paid` by a failed grant.
    pub retry_unfulfilled: bool,
    /// If set, requests to the order API must carry this bearer token.
    pub api_token: Option<Secret<String>>,
}

#[derive(Clone, Debug, Default)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: Secret<String>,
    /// Chat that receives a notice for every completed payment.
    pub notify_chat_id: Option<i64>,
    pub celebration_sticker: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_UPG_HOST.to_string(),
            port: DEFAULT_UPG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            membership_database_url: DEFAULT_MEMBERSHIP_DATABASE_URL.to_string(),
            membership_utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            wallet_address: String::default(),
            usdt_contract: DEFAULT_USDT_CONTRACT.to_string(),
            trongrid_url: DEFAULT_TRONGRID_URL.to_string(),
            trongrid_api_keys: vec![],
            telegram: TelegramConfig { api_url: DEFAULT_TELEGRAM_API_URL.to_string(), ..Default::default() },
            order_timeout: Duration::minutes(DEFAULT_ORDER_TIMEOUT_MINUTES),
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
            poll_interval: StdDuration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            tx_max_age: Duration::minutes(DEFAULT_TX_MAX_AGE_MINUTES),
            batch_size: DEFAULT_BATCH_SIZE,
            retry_unfulfilled: false,
            api_token: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("UPG_HOST").ok().unwrap_or_else(|| DEFAULT_UPG_HOST.into());
        let port = parse_env("UPG_PORT", DEFAULT_UPG_PORT);
        let database_url = env::var("UPG_DATABASE_URL").ok().unwrap_or_else(|| {
            info!("🪛️ UPG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.into()
        });
        let membership_database_url =
            env::var("UPG_MEMBERSHIP_DATABASE_URL").ok().unwrap_or_else(|| DEFAULT_MEMBERSHIP_DATABASE_URL.into());
        let mut membership_utc_offset_hours = parse_env("UPG_MEMBERSHIP_UTC_OFFSET", DEFAULT_UTC_OFFSET_HOURS);
        if utc_offset(membership_utc_offset_hours).is_none() {
            warn!(
                "🪛️ {membership_utc_offset_hours} is not a valid UTC offset for UPG_MEMBERSHIP_UTC_OFFSET. Using \
                 {DEFAULT_UTC_OFFSET_HOURS} instead."
            );
            membership_utc_offset_hours = DEFAULT_UTC_OFFSET_HOURS;
        }
        let wallet_address = env::var("UPG_WALLET_ADDRESS").ok().unwrap_or_else(|| {
            error!("🪛️ UPG_WALLET_ADDRESS is not set. Please set it to the TRON address that receives payments.");
            String::default()
        });
        let usdt_contract = env::var("UPG_USDT_CONTRACT").ok().unwrap_or_else(|| DEFAULT_USDT_CONTRACT.into());
        let trongrid_url = env::var("UPG_TRONGRID_URL").ok().unwrap_or_else(|| DEFAULT_TRONGRID_URL.into());
        let trongrid_api_keys = env::var("UPG_TRONGRID_API_KEYS")
            .map(|s| parse_comma_list(&s).into_iter().map(Secret::new).collect::<Vec<_>>())
            .unwrap_or_default();
        if trongrid_api_keys.is_empty() {
            warn!("🪛️ No TronGrid API keys are configured. Requests will be sent anonymously and rate limited hard.");
        }
        let telegram = TelegramConfig::from_env_or_default();
        let order_timeout = Duration::minutes(parse_env("UPG_ORDER_TIMEOUT", DEFAULT_ORDER_TIMEOUT_MINUTES));
        let min_confirmations = parse_env("UPG_MIN_CONFIRMATIONS", DEFAULT_MIN_CONFIRMATIONS);
        let poll_interval = StdDuration::from_secs(parse_env("UPG_POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS).max(1));
        let tx_max_age = Duration::minutes(parse_env("UPG_TX_MAX_AGE", DEFAULT_TX_MAX_AGE_MINUTES));
        let batch_size = parse_env("UPG_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        let retry_unfulfilled = parse_boolean_flag(env::var("UPG_RETRY_UNFULFILLED").ok(), false);
        let api_token = env::var("UPG_API_TOKEN").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if api_token.is_none() {
            info!("🪛️ UPG_API_TOKEN is not set. The order API will accept unauthenticated requests.");
        }
        Self {
            host,
            port,
            database_url,
            membership_database_url,
            membership_utc_offset_hours,
            wallet_address,
            usdt_contract,
            trongrid_url,
            trongrid_api_keys,
            telegram,
            order_timeout,
            min_confirmations,
            poll_interval,
            tx_max_age,
            batch_size,
            retry_unfulfilled,
            api_token,
        }
    }

    pub fn issuer_config(&self) -> IssuerConfig {
        IssuerConfig { order_timeout: self.order_timeout, ..IssuerConfig::default() }
    }

    pub fn trongrid_config(&self) -> TronGridConfig {
        TronGridConfig {
            base_url: self.trongrid_url.clone(),
            wallet_address: self.wallet_address.clone(),
            contract_address: self.usdt_contract.clone(),
            api_keys: self.trongrid_api_keys.clone(),
            ..TronGridConfig::default()
        }
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            min_confirmations: self.min_confirmations,
            max_transaction_age: self.tx_max_age,
            batch_size: self.batch_size,
            contract_address: self.usdt_contract.clone(),
            operator_chat_id: self.telegram.notify_chat_id,
            celebration_asset: self.telegram.celebration_sticker.clone(),
            retry_unfulfilled: self.retry_unfulfilled,
            ..ReconcileConfig::default()
        }
    }
}

impl TelegramConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("UPG_TELEGRAM_API_URL").ok().unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.into());
        let bot_token = env::var("UPG_TELEGRAM_BOT_TOKEN").ok().unwrap_or_else(|| {
            error!("🪛️ UPG_TELEGRAM_BOT_TOKEN is not set. Customers will not be notified of payments.");
            String::default()
        });
        let notify_chat_id = env::var("UPG_TELEGRAM_NOTIFY_CHAT_ID").ok().and_then(|s| {
            s.trim()
                .parse::<i64>()
                .map_err(|e| warn!("🪛️ Ignoring invalid UPG_TELEGRAM_NOTIFY_CHAT_ID ({s}). {e}"))
                .ok()
        });
        let celebration_sticker = env::var("UPG_CELEBRATION_STICKER").ok().filter(|s| !s.trim().is_empty());
        Self { api_url, bot_token: Secret::new(bot_token), notify_chat_id, celebration_sticker }
    }
}

/// Reads and parses `name`, warning and falling back to `default` when the value is invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
