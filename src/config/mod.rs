// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use ::config::{Config as Layered, File};
use std::path::Path;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 4003;
pub const DEFAULT_SERVER_NAME: &str = "Health-Checker";
pub const DEFAULT_PRIMARY_URL: &str = "http://localhost:4001";
pub const DEFAULT_BACKUP_URL: &str = "http://localhost:4002";
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Load configuration from defaults, an optional file (YAML, JSON or TOML)
/// and the process environment, in that order of precedence.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] but reads environment variables through `env`.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Layered::builder()
        .set_default("server.port", DEFAULT_PORT as i64)?
        .set_default("server.name", DEFAULT_SERVER_NAME)?
        .set_default("targets.primary", DEFAULT_PRIMARY_URL)?
        .set_default("targets.backup", DEFAULT_BACKUP_URL)?
        .set_default("health_check.interval_ms", DEFAULT_CHECK_INTERVAL_MS as i64)?
        .set_default("health_check.timeout_ms", DEFAULT_PROBE_TIMEOUT_MS as i64)?
        .set_default("health_check.path", "/health")?
        .set_default("metrics.enabled", false)?
        .set_default("metrics.port", DEFAULT_METRICS_PORT as i64)?
        .set_default("metrics.path", "/metrics")?;

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder
        .set_override_option("server.port", parse_env::<u16, _>(&env, "PORT").map(i64::from))?
        .set_override_option("server.name", env("SERVER_NAME").filter(|s| !s.is_empty()))?
        .set_override_option("targets.primary", env("PRIMARY_BACKEND_URL"))?
        .set_override_option("targets.backup", env("BACKUP_BACKEND_URL"))?
        .set_override_option(
            "health_check.interval_ms",
            parse_positive_ms(&env, "CHECK_INTERVAL"),
        )?
        .set_override_option(
            "health_check.timeout_ms",
            parse_positive_ms(&env, "PROBE_TIMEOUT_MS"),
        )?
        .set_override_option(
            "metrics.enabled",
            env("METRICS_ENABLED").map(|v| matches!(v.trim(), "1" | "true" | "yes")),
        )?
        .set_override_option(
            "metrics.port",
            parse_env::<u16, _>(&env, "METRICS_PORT").map(i64::from),
        )?;

    let config: Config = builder
        .build()
        .context("Failed to assemble configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}

fn parse_env<T, F>(env: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = env(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

// Zero or garbage falls back to whatever the lower layers provide.
fn parse_positive_ms<F>(env: &F, key: &str) -> Option<i64>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_env::<u64, _>(env, key)? {
        0 => {
            warn!("Ignoring {}=0: interval must be positive", key);
            None
        }
        ms => i64::try_from(ms).ok(),
    }
}
