use anyhow::{Context, Result};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Root of the LMS instance, e.g. `https://school.instructure.com`.
    pub base_url: String,
    pub api_token: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub canvas: CanvasConfig,
    /// Only the commands touching local data need it.
    pub database_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            canvas: CanvasConfig::from_env()?,
            database_url: std::env::var("DATABASE_URL").ok(),
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("Cannot load DATABASE_URL env variable")
    }
}

impl CanvasConfig {
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match std::env::var("CANVAS_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse()
                .context("CANVAS_TIMEOUT_SECS must be a number of seconds")?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url: std::env::var("CANVAS_BASE_URL")
                .context("Cannot load CANVAS_BASE_URL env variable")?
                .trim_end_matches('/')
                .to_string(),
            api_token: std::env::var("CANVAS_API_TOKEN")
                .context("Cannot load CANVAS_API_TOKEN env variable")?,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
