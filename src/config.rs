use crate::error::{EngineError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PROCESSOR_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CURRENCY: &str = "NGN";

/// Runtime settings for `serve`, read from the environment.
///
/// A `.env` file in the working directory is loaded first if present.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub processor_base_url: Option<String>,
    /// Also the key the processor signs webhooks with.
    pub processor_secret_key: Option<String>,
    pub processor_timeout: Duration,
    pub currency: String,
    pub callback_url: Option<String>,
    pub db_path: Option<PathBuf>,
    pub seed_path: Option<PathBuf>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("processor_base_url", &self.processor_base_url)
            .field(
                "processor_secret_key",
                &self.processor_secret_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("processor_timeout", &self.processor_timeout)
            .field("currency", &self.currency)
            .field("callback_url", &self.callback_url)
            .field("db_path", &self.db_path)
            .field("seed_path", &self.seed_path)
            .finish()
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| EngineError::ConfigError(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            host: var("ORDERFLOW_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse("ORDERFLOW_PORT", 8080)?,
            processor_base_url: var("PROCESSOR_BASE_URL"),
            processor_secret_key: var("PROCESSOR_SECRET_KEY"),
            processor_timeout: Duration::from_secs(parse(
                "PROCESSOR_TIMEOUT_SECS",
                DEFAULT_PROCESSOR_TIMEOUT_SECS,
            )?),
            currency: var("PAYMENT_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            callback_url: var("PAYMENT_CALLBACK_URL"),
            db_path: var("ORDERFLOW_DB_PATH").map(PathBuf::from),
            seed_path: var("ORDERFLOW_SEED").map(PathBuf::from),
        };
        tracing::debug!(?config, "Configuration loaded");
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The webhook key; a live processor cannot be used without one.
    pub fn require_secret(&self) -> Result<&str> {
        self.processor_secret_key
            .as_deref()
            .ok_or_else(|| EngineError::ConfigError("PROCESSOR_SECRET_KEY is not set".to_string()))
    }
}
