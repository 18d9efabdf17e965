use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it from a plain
/// `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let api_token_salt = require("STOCKSYNC_API_TOKEN_SALT")?;

    let env = parse_environment(&or_default("STOCKSYNC_ENV", "development"))?;

    let bind_addr = parse_addr("STOCKSYNC_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("STOCKSYNC_LOG_LEVEL", "info");

    let db_max_connections = parse_u32("STOCKSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("STOCKSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("STOCKSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let supplier_request_timeout_secs = parse_u64("STOCKSYNC_SUPPLIER_REQUEST_TIMEOUT_SECS", "10")?;
    if supplier_request_timeout_secs == 0 {
        return Err(invalid(
            "STOCKSYNC_SUPPLIER_REQUEST_TIMEOUT_SECS",
            "must be at least 1".to_string(),
        ));
    }
    let supplier_user_agent = or_default("STOCKSYNC_SUPPLIER_USER_AGENT", "stocksync/0.1 (stock-sync)");
    let supplier_max_retries = parse_u32("STOCKSYNC_SUPPLIER_MAX_RETRIES", "0")?;
    let supplier_retry_backoff_base_ms =
        parse_u64("STOCKSYNC_SUPPLIER_RETRY_BACKOFF_BASE_MS", "1000")?;

    let sync_max_concurrent_suppliers =
        parse_usize("STOCKSYNC_SYNC_MAX_CONCURRENT_SUPPLIERS", "1")?.max(1);
    let sync_max_concurrent_fetches =
        parse_usize("STOCKSYNC_SYNC_MAX_CONCURRENT_FETCHES", "4")?.max(1);

    let scheduler_enabled = parse_bool("STOCKSYNC_SCHEDULER_ENABLED", "true")?;
    let scheduler_cron = or_default("STOCKSYNC_SCHEDULER_CRON", "0 * * * * *");

    let cors_allowed_origins = or_default("STOCKSYNC_CORS_ALLOWED_ORIGINS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    let rate_limit_max_requests = parse_usize("STOCKSYNC_RATE_LIMIT_MAX_REQUESTS", "120")?;
    let rate_limit_window_secs = parse_u64("STOCKSYNC_RATE_LIMIT_WINDOW_SECS", "60")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        api_token_salt,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        supplier_request_timeout_secs,
        supplier_user_agent,
        supplier_max_retries,
        supplier_retry_backoff_base_ms,
        sync_max_concurrent_suppliers,
        sync_max_concurrent_fetches,
        scheduler_enabled,
        scheduler_cron,
        cors_allowed_origins,
        rate_limit_max_requests,
        rate_limit_window_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "STOCKSYNC_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
