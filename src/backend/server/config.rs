//! Server Configuration
//!
//! All configuration comes from the environment (optionally seeded from a
//! `.env` file by `main`). `DATABASE_URL` is the only required variable:
//! the event log is the system of record, so unlike purely in-memory
//! deployments there is no degraded no-database mode. Everything else has
//! production defaults.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

use crate::backend::limiter::RateLimitConfig;

/// How long pool acquisition may wait before a request-scoped database call
/// fails as retriable.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Postgres connection string. Required.
    pub database_url: String,
    /// TCP port for HTTP + WS. Default 8080.
    pub port: u16,
    /// Shared secret for bearer-token verification. When unset, all tokens
    /// are treated as unverified and every caller is anonymous.
    pub auth_secret_key: Option<String>,
    /// Event multiple at which snapshot compaction triggers. Default 5000.
    pub compaction_threshold: i64,
    /// Cursor batch tick interval in milliseconds. Default 50.
    pub cursor_batch_ms: u64,
    /// Token bucket tuning for the draw and cursor classes.
    pub rate_limits: RateLimitConfig,
    /// Directory to serve static files from, when configured.
    pub static_dir: Option<String>,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let defaults = RateLimitConfig::default();
        Ok(Self {
            database_url,
            port: parse_var("PORT", 8080)?,
            auth_secret_key: optional_var("AUTH_SECRET_KEY"),
            compaction_threshold: parse_var("COMPACTION_THRESHOLD", 5000)?,
            cursor_batch_ms: parse_var("CURSOR_BATCH_MS", 50)?,
            rate_limits: RateLimitConfig {
                draw_capacity: parse_var("DRAW_BUCKET_SIZE", defaults.draw_capacity)?,
                draw_refill_per_sec: parse_var("DRAW_REFILL_RATE", defaults.draw_refill_per_sec)?,
                cursor_capacity: parse_var("CURSOR_BUCKET_SIZE", defaults.cursor_capacity)?,
                cursor_refill_per_sec: parse_var(
                    "CURSOR_REFILL_RATE",
                    defaults.cursor_refill_per_sec,
                )?,
            },
            static_dir: optional_var("STATIC_DIR"),
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

/// Connect the process-global pool and run migrations.
///
/// Unlike optional services, a failure here aborts startup: a whiteboard
/// server without its log has nothing to serve.
pub async fn connect_database(config: &ServerConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("[Config] connecting to database");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await?;

    tracing::info!("[Config] running database migrations");
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment-variable tests mutate process state, so they only touch
    // names no other test reads.

    #[test]
    fn missing_database_url_is_an_error() {
        std::env::remove_var("DATABASE_URL");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn parse_var_falls_back_to_default() {
        std::env::remove_var("INKBOARD_TEST_UNSET");
        let value: i64 = parse_var("INKBOARD_TEST_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        std::env::set_var("INKBOARD_TEST_GARBAGE", "not-a-number");
        let result: Result<u16, _> = parse_var("INKBOARD_TEST_GARBAGE", 1);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
        std::env::remove_var("INKBOARD_TEST_GARBAGE");
    }
}
