use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Upper bound for `ECOM_SESSION_TTL_HOURS` (one year).
const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;

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
/// Decoupled from the real environment so tests can feed a `HashMap`.
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

    let parse_as = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        if raw.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(raw)
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("ECOM_ENV", "development"))?;

    let bind_addr = parse_as("ECOM_BIND_ADDR", "0.0.0.0:3001")?
        .parse::<SocketAddr>()
        .map_err(|e| invalid("ECOM_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("ECOM_LOG_LEVEL", "info");
    let public_url = parse_as("ECOM_PUBLIC_URL", "http://localhost:3000")?
        .trim_end_matches('/')
        .to_string();
    let cors_origins = parse_origins(&or_default("ECOM_CORS_ORIGINS", "http://localhost:3000"));

    let db_max_connections = parse_as("ECOM_DB_MAX_CONNECTIONS", "10")?
        .parse::<u32>()
        .map_err(|e| invalid("ECOM_DB_MAX_CONNECTIONS", e.to_string()))?;
    let db_min_connections = parse_as("ECOM_DB_MIN_CONNECTIONS", "1")?
        .parse::<u32>()
        .map_err(|e| invalid("ECOM_DB_MIN_CONNECTIONS", e.to_string()))?;
    let db_acquire_timeout_secs = parse_as("ECOM_DB_ACQUIRE_TIMEOUT_SECS", "10")?
        .parse::<u64>()
        .map_err(|e| invalid("ECOM_DB_ACQUIRE_TIMEOUT_SECS", e.to_string()))?;

    let session_ttl_hours = parse_as("ECOM_SESSION_TTL_HOURS", "168")?
        .parse::<i64>()
        .map_err(|e| invalid("ECOM_SESSION_TTL_HOURS", e.to_string()))?;
    if session_ttl_hours <= 0 {
        return Err(invalid(
            "ECOM_SESSION_TTL_HOURS",
            format!("must be positive, got {session_ttl_hours}"),
        ));
    }
    if session_ttl_hours > MAX_SESSION_TTL_HOURS {
        return Err(invalid(
            "ECOM_SESSION_TTL_HOURS",
            format!("must be at most {MAX_SESSION_TTL_HOURS}, got {session_ttl_hours}"),
        ));
    }

    let rate_limit_per_minute = parse_as("ECOM_RATE_LIMIT_PER_MINUTE", "120")?
        .parse::<usize>()
        .map_err(|e| invalid("ECOM_RATE_LIMIT_PER_MINUTE", e.to_string()))?;

    let stripe_secret_key = lookup("STRIPE_SECRET_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let stripe_api_base = or_default("ECOM_STRIPE_API_BASE", "https://api.stripe.com/");
    let payment_timeout_secs = parse_as("ECOM_PAYMENT_TIMEOUT_SECS", "30")?
        .parse::<u64>()
        .map_err(|e| invalid("ECOM_PAYMENT_TIMEOUT_SECS", e.to_string()))?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        public_url,
        cors_origins,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        session_ttl_hours,
        rate_limit_per_minute,
        stripe_secret_key,
        stripe_api_base,
        payment_timeout_secs,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "ECOM_ENV".to_string(),
            reason: format!("expected development, test, or production; got '{other}'"),
        }),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
