use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use anyhow::{Result, anyhow};
use tracing::{info, warn};

pub const DEFAULT_PORT: &str = "1111";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BASE_URL: &str = "https://localhost:3000";
pub const DEFAULT_MAIL_FROM: &str = "Wikimasters <noreply@updates.example.com>";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub base_url: String,
    pub mail_from: String,
    pub resend_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("RUST_PORT", DEFAULT_PORT)?,
            redis_url: try_load("REDIS_URL", DEFAULT_REDIS_URL)?,
            base_url: try_load("BASE_URL", DEFAULT_BASE_URL)?,
            mail_from: try_load("MAIL_FROM", DEFAULT_MAIL_FROM)?,
            resend_key: read_secret("RESEND_API_KEY"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            resend_key: None,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    parse_or_default(key, var(key), default)
}

fn parse_or_default<T: FromStr>(key: &str, value: Option<String>, default: &str) -> Result<T>
where
    T::Err: Display,
{
    value
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value: {e}"))
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
        .or_else(|| var(secret_name))
        .filter(|s| !s.is_empty())
}
