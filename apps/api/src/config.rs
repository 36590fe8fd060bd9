use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if a numeric variable does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the recruiting REST backend. `None` runs the in-memory backend.
    pub backend_url: Option<String>,
    pub backend_token: Option<String>,
    pub backend_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
    pub settle_delay: Duration,
    pub recommendation_limit: usize,
    pub invitation_ttl_days: i64,
    /// JSON seed file for the in-memory backend. Ignored when `backend_url` is set.
    pub seed_path: Option<String>,
    /// Open stacks not touched for this long are reaped.
    pub session_idle_ttl: Duration,
    /// Origins allowed by CORS. Empty allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_token: None,
            backend_timeout: Duration::from_secs(30),
            port: 8080,
            rust_log: "info".to_string(),
            settle_delay: Duration::from_millis(300),
            recommendation_limit: 10,
            invitation_ttl_days: 30,
            seed_path: None,
            session_idle_ttl: Duration::from_secs(30 * 60),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = Config::default();
        Ok(Config {
            backend_url: optional_env("BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            backend_token: optional_env("BACKEND_TOKEN"),
            backend_timeout: Duration::from_secs(parse_env(
                "BACKEND_TIMEOUT_SECS",
                defaults.backend_timeout.as_secs(),
            )?),
            port: parse_env("PORT", defaults.port)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or(defaults.rust_log),
            settle_delay: Duration::from_millis(parse_env(
                "SETTLE_DELAY_MS",
                defaults.settle_delay.as_millis() as u64,
            )?),
            recommendation_limit: parse_env("RECOMMENDATION_LIMIT", defaults.recommendation_limit)?,
            invitation_ttl_days: parse_env("INVITATION_TTL_DAYS", defaults.invitation_ttl_days)?,
            seed_path: optional_env("SEED_PATH"),
            session_idle_ttl: Duration::from_secs(parse_env(
                "SESSION_IDLE_TTL_SECS",
                defaults.session_idle_ttl.as_secs(),
            )?),
            cors_allowed_origins: optional_env("CORS_ALLOWED_ORIGINS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_end_matches('/'))
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}
