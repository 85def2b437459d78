use crate::session::ExpiryLimits;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_URL: &str = "sqlite://tandem.db?mode=rwc";
const DEFAULT_ROOM_IDLE_SECS: u64 = 30 * 60;
const DEFAULT_QUEUE_WAIT_SECS: u64 = 5 * 60;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Directory served for unmatched routes (client assets).
    pub static_dir: Option<PathBuf>,
    /// Rooms untouched this long are closed. `None` keeps them forever.
    pub room_idle_timeout: Option<Duration>,
    /// Quick-play waiters are dropped after this long. `None` waits forever.
    pub queue_wait_timeout: Option<Duration>,
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            static_dir: None,
            room_idle_timeout: Some(Duration::from_secs(DEFAULT_ROOM_IDLE_SECS)),
            queue_wait_timeout: Some(Duration::from_secs(DEFAULT_QUEUE_WAIT_SECS)),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            port: parse_var("PORT").unwrap_or(DEFAULT_PORT),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            static_dir: env::var("STATIC_DIR").ok().map(PathBuf::from),
            room_idle_timeout: timeout_var("ROOM_IDLE_SECS", DEFAULT_ROOM_IDLE_SECS),
            queue_wait_timeout: timeout_var("QUEUE_WAIT_SECS", DEFAULT_QUEUE_WAIT_SECS),
            sweep_interval: Duration::from_secs(
                parse_var::<u64>("SWEEP_INTERVAL_SECS")
                    .filter(|secs| *secs > 0)
                    .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),
            ),
        }
    }

    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn expiry_limits(&self) -> ExpiryLimits {
        ExpiryLimits {
            room_idle: self.room_idle_timeout,
            queue_wait: self.queue_wait_timeout,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", key, raw);
            None
        }
    }
}

/// Seconds from the environment; 0 disables the timeout.
fn timeout_var(key: &str, default_secs: u64) -> Option<Duration> {
    match parse_var::<u64>(key).unwrap_or(default_secs) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    }
}
