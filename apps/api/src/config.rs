use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::analysis_client::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub analysis_service_url: String,
    pub analysis_timeout: Duration,
    pub analysis_connect_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Upper bound on one whole analysis run, retries included.
    pub assessment_deadline: Duration,
    /// A PROCESSING claim older than this is treated as abandoned.
    pub assessment_stale_after: Duration,
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
    pub auto_generate_paths: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RetryPolicy::default();

        let config = Config {
            database_url: require(&lookup, "DATABASE_URL")?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            analysis_service_url: require(&lookup, "ANALYSIS_SERVICE_URL")?,
            analysis_timeout: Duration::from_secs(parse_or(&lookup, "ANALYSIS_TIMEOUT_SECS", 30)?),
            analysis_connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                "ANALYSIS_CONNECT_TIMEOUT_SECS",
                5,
            )?),
            retry_policy: RetryPolicy {
                max_attempts: parse_or(&lookup, "ANALYSIS_MAX_ATTEMPTS", defaults.max_attempts)?,
                base_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "ANALYSIS_BACKOFF_BASE_MS",
                    2_000,
                )?),
                max_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "ANALYSIS_BACKOFF_CAP_MS",
                    10_000,
                )?),
            },
            assessment_deadline: Duration::from_secs(parse_or(
                &lookup,
                "ASSESSMENT_DEADLINE_SECS",
                120,
            )?),
            assessment_stale_after: Duration::from_secs(parse_or(
                &lookup,
                "ASSESSMENT_STALE_AFTER_SECS",
                600,
            )?),
            worker_concurrency: parse_or(&lookup, "WORKER_CONCURRENCY", 4)?,
            queue_capacity: parse_or(&lookup, "QUEUE_CAPACITY", 256)?,
            auto_generate_paths: parse_or(&lookup, "AUTO_GENERATE_PATHS", true)?,
            port: parse_or(&lookup, "PORT", 8080)
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        // A live run must never look abandoned to another worker.
        if config.assessment_stale_after <= config.assessment_deadline {
            anyhow::bail!(
                "ASSESSMENT_STALE_AFTER_SECS ({}s) must exceed ASSESSMENT_DEADLINE_SECS ({}s)",
                config.assessment_stale_after.as_secs(),
                config.assessment_deadline.as_secs()
            );
        }
        Ok(config)
    }
}

fn require<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}
