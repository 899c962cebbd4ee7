use std::{env, str::FromStr, time::Duration};

use deposit_engine::payments::SessionConfig;
use kis_tools::KisConfig;
use log::*;

const DEFAULT_KIOSK_HOST: &str = "127.0.0.1";
const DEFAULT_KIOSK_PORT: u16 = 8080;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_MAX_ATTEMPTS: u32 = 180;
const DEFAULT_SUBSCRIBER_QUEUE_DEPTH: usize = 10;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time between two balance polls of the same payment session
    pub poll_interval: Duration,
    /// Polls per payment before the session gives up
    pub max_attempts: u32,
    /// Events that may queue up for one order-stream viewer before it is disconnected
    pub subscriber_queue_depth: usize,
    /// How long an order stream may stay silent before a keepalive comment is sent
    pub heartbeat_interval: Duration,
    /// Capacity of the channel between event producers and the dispatcher
    pub event_buffer_size: usize,
    /// Brokerage credentials. `None` if they were not configured; the server refuses to start in that case.
    pub kis: Option<KisConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_KIOSK_HOST.to_string(),
            port: DEFAULT_KIOSK_PORT,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            subscriber_queue_depth: DEFAULT_SUBSCRIBER_QUEUE_DEPTH,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            kis: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("KIOSK_HOST").ok().unwrap_or_else(|| DEFAULT_KIOSK_HOST.into());
        let port = parse_env("KIOSK_PORT", DEFAULT_KIOSK_PORT);
        let poll_interval = Duration::from_millis(parse_env("KIOSK_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS));
        let max_attempts = parse_env("KIOSK_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS);
        let subscriber_queue_depth = parse_env("KIOSK_SUBSCRIBER_QUEUE_DEPTH", DEFAULT_SUBSCRIBER_QUEUE_DEPTH);
        let heartbeat_interval =
            Duration::from_secs(parse_env("KIOSK_HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL_SECS));
        let event_buffer_size = parse_env("KIOSK_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let kis = KisConfig::try_from_env()
            .map_err(|e| {
                error!(
                    "🪛️ The brokerage account is not configured. {e}. Set KIS_APP_KEY, KIS_APP_SECRET and \
                     KIS_ACCOUNT_NO to the credentials of the account that receives kiosk payments."
                );
            })
            .ok();
        Self {
            host,
            port,
            poll_interval,
            max_attempts,
            subscriber_queue_depth,
            heartbeat_interval,
            event_buffer_size,
            kis,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.poll_interval, self.max_attempts)
    }
}

/// Reads `name` from the environment. Values that are missing, zero or cannot be parsed fall back to `default`.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Default + PartialEq + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    let Ok(s) = env::var(name) else {
        return default;
    };
    match s.trim().parse::<T>() {
        Ok(v) if v == T::default() => {
            warn!("🪛️ {name} cannot be zero. Using the default, {default}, instead.");
            default
        },
        Ok(v) => v,
        Err(e) => {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        },
    }
}
