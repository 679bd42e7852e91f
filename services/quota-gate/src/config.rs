use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::gate::{FailureMode, QuotaPolicy};
use crate::limits::LimitValues;

#[derive(Debug, Clone)]
pub struct QuotaGateConfig {
    pub server_host: String,
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub policy: QuotaPolicy,
    pub failure_mode: FailureMode,
    pub store_busy_timeout_ms: u64,
    pub limits_url: Option<String>,
    pub limits_token: Option<String>,
    pub limits_fetch_timeout_secs: u64,
    pub refresh_minutes: u64,
    pub default_limits: LimitValues,
    pub log_level: String,
}

impl Default for QuotaGateConfig {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            data_dir: PathBuf::from("data/quota"),
            policy: QuotaPolicy::default(),
            failure_mode: FailureMode::Closed,
            store_busy_timeout_ms: 5_000,
            limits_url: None,
            limits_token: None,
            limits_fetch_timeout_secs: 5,
            refresh_minutes: 10,
            default_limits: LimitValues::default(),
            log_level: "info".to_string(),
        }
    }
}

impl QuotaGateConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("QUOTA_HOST") {
            if !host.trim().is_empty() {
                cfg.server_host = host;
            }
        }
        if let Ok(port) = env::var("QUOTA_PORT").or_else(|_| env::var("PORT")) {
            cfg.server_port = port.parse().context("QUOTA_PORT must be a valid u16")?;
        }
        if let Ok(dir) = env::var("QUOTA_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Ok(policy) = env::var("QUOTA_POLICY") {
            cfg.policy = policy
                .parse()
                .with_context(|| format!("QUOTA_POLICY is invalid: {policy}"))?;
        }
        if let Ok(flag) = env::var("SUBSCRIBER_BYPASS") {
            let enabled = parse_bool(&flag)
                .with_context(|| format!("SUBSCRIBER_BYPASS is invalid: {flag}"))?;
            cfg.policy = cfg.policy.with_subscriber_bypass(enabled);
        }
        if let Ok(mode) = env::var("STORE_FAILURE_MODE") {
            cfg.failure_mode = mode
                .parse()
                .with_context(|| format!("STORE_FAILURE_MODE is invalid: {mode}"))?;
        }
        if let Ok(timeout) = env::var("STORE_BUSY_TIMEOUT_MS") {
            cfg.store_busy_timeout_ms = timeout
                .parse()
                .context("STORE_BUSY_TIMEOUT_MS must be a positive integer")?;
        }
        if let Ok(url) = env::var("LIMITS_URL") {
            cfg.limits_url = non_empty(url);
        }
        if let Ok(token) = env::var("LIMITS_TOKEN") {
            cfg.limits_token = non_empty(token);
        }
        if let Ok(timeout) = env::var("LIMITS_FETCH_TIMEOUT_SECS") {
            cfg.limits_fetch_timeout_secs = timeout
                .parse()
                .context("LIMITS_FETCH_TIMEOUT_SECS must be a positive integer")?;
        }
        if let Ok(minutes) = env::var("REFRESH_MINUTES") {
            cfg.refresh_minutes = minutes
                .parse()
                .context("REFRESH_MINUTES must be a positive integer")?;
        }
        if let Ok(limit) = env::var("DEFAULT_DAILY_FREE_CHARS") {
            cfg.default_limits.daily_free_chars = limit
                .parse()
                .context("DEFAULT_DAILY_FREE_CHARS must be a non-negative integer")?;
        }
        if let Ok(limit) = env::var("DEFAULT_WEEKLY_FREE_CHARS") {
            cfg.default_limits.weekly_free_chars = limit
                .parse()
                .context("DEFAULT_WEEKLY_FREE_CHARS must be a non-negative integer")?;
        }
        if let Ok(limit) = env::var("DEFAULT_MONTHLY_FREE_CHARS") {
            cfg.default_limits.monthly_free_chars = limit
                .parse()
                .context("DEFAULT_MONTHLY_FREE_CHARS must be a non-negative integer")?;
        }
        if let Ok(limit) = env::var("DEFAULT_MONTHLY_PLUS_CHARS") {
            cfg.default_limits.monthly_plus_chars = limit
                .parse()
                .context("DEFAULT_MONTHLY_PLUS_CHARS must be a non-negative integer")?;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            if !level.trim().is_empty() {
                cfg.log_level = level;
            }
        }

        cfg.validate()?;
        ensure_directory(&cfg.data_dir)?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_minutes == 0 {
            anyhow::bail!("REFRESH_MINUTES must be greater than zero");
        }
        if self.limits_fetch_timeout_secs == 0 {
            anyhow::bail!("LIMITS_FETCH_TIMEOUT_SECS must be greater than zero");
        }
        if self.store_busy_timeout_ms == 0 {
            anyhow::bail!("STORE_BUSY_TIMEOUT_MS must be greater than zero");
        }
        if self.limits_token.is_some() && self.limits_url.is_none() {
            anyhow::bail!("LIMITS_TOKEN is set but LIMITS_URL is not");
        }
        if let Some(url) = &self.limits_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("LIMITS_URL must be an http(s) URL: {url}");
            }
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes * 60)
    }

    pub fn limits_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.limits_fetch_timeout_secs)
    }

    pub fn store_busy_timeout(&self) -> Duration {
        Duration::from_millis(self.store_busy_timeout_ms)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("{} exists but is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("unable to create data directory {}", path.display()))?;
    }
    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => anyhow::bail!("invalid boolean value {value}"),
    }
}
