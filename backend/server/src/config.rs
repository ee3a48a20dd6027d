use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use tracing::{info, warn};

use crate::error::AppError;

pub struct Config {
    pub port: u16,
    pub store_url: String,
    pub store_secret: Option<String>,
    pub completion_url: String,
    pub completion_key: Option<String>,
    pub completion_model: String,
    pub completion_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok(), read_secret_file)
    }

    /// Builds the config from injected lookups, `var` for plain settings and `secret` for credentials.
    pub fn from_lookup<V, S>(var: V, secret: S) -> Result<Self, AppError>
    where
        V: Fn(&str) -> Option<String>,
        S: Fn(&str) -> Option<String>,
    {
        let read_secret = |name: &str| {
            secret(name).or_else(|| var(name)).or_else(|| {
                warn!("Secret {name} not found in /run/secrets or environment");
                None
            })
        };

        Ok(Self {
            port: try_load(&var, "RUST_PORT", "5000")?,
            store_url: try_load(&var, "STORE_URL", "memory://")?,
            store_secret: read_secret("STORE_SECRET"),
            completion_url: try_load(&var, "COMPLETION_URL", "https://api.openai.com/v1")?,
            completion_key: read_secret("OPENAI_API_KEY"),
            completion_model: try_load(&var, "COMPLETION_MODEL", "gpt-4o-mini")?,
            completion_timeout: Duration::from_secs(try_load(&var, "COMPLETION_TIMEOUT_SECS", "60")?),
        })
    }
}

fn try_load<T, V>(var: &V, key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            AppError::Config(format!("invalid {key}: {e}"))
        })
}

fn read_secret_file(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}
