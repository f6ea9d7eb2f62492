use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;

use crate::utils::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_scan_per_min: u32,
    pub rate_protected_per_min: u32,

    /// Clinic local time = UTC + this many minutes
    pub clinic_utc_offset_minutes: i32,
    pub require_location: bool,

    pub store_retry_attempts: u32,
    pub store_retry_base_ms: u64,
    pub qr_cache_ttl_secs: u64,

    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            rate_scan_per_min: parse_or("RATE_SCAN_PER_MIN", 120)?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,

            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", 0)?,
            require_location: parse_or("REQUIRE_LOCATION", false)?,

            store_retry_attempts: parse_or("STORE_RETRY_ATTEMPTS", 3)?,
            store_retry_base_ms: parse_or("STORE_RETRY_BASE_MS", 100)?,
            qr_cache_ttl_secs: parse_or("QR_CACHE_TTL_SECS", 60)?,

            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10)?,
            run_migrations: parse_or("RUN_MIGRATIONS", true)?,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.store_retry_attempts,
            Duration::from_millis(self.store_retry_base_ms),
        )
    }

    pub fn qr_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.qr_cache_ttl_secs)
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            api_prefix: "/api".to_string(),
            rate_scan_per_min: 120,
            rate_protected_per_min: 1000,
            clinic_utc_offset_minutes: 0,
            require_location: false,
            store_retry_attempts: 3,
            store_retry_base_ms: 1,
            qr_cache_ttl_secs: 60,
            db_max_connections: 1,
            run_migrations: false,
        }
    }
}

/// Unset falls back to `default`; a value that does not parse is an error.
fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
