use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    /// Seconds.
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,
    pub role_cache_ttl: Duration,
    pub username_filter_capacity: usize,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: T) -> Result<T>
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

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", 1800)?, // 30 min

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parsed_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            role_cache_ttl: Duration::from_secs(parsed_or("ROLE_CACHE_TTL", 3600)?),
            username_filter_capacity: parsed_or("USERNAME_FILTER_CAPACITY", 100_000)?,
        })
    }

    /// Settings for tests and local tooling that never touch the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 1800,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_protected_per_min: 10_000,
            api_prefix: "/api/v1".to_string(),
            log_dir: "logs".to_string(),
            role_cache_ttl: Duration::from_secs(60),
            username_filter_capacity: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_or_falls_back_and_reports_bad_values() {
        // unlikely to exist in any environment
        assert_eq!(parsed_or("TIMECARD_TEST_UNSET_VALUE", 42u32).unwrap(), 42);

        // SAFETY: test-only variable name, not read concurrently elsewhere
        unsafe { env::set_var("TIMECARD_TEST_BAD_VALUE", "forty-two") };
        let err = parsed_or("TIMECARD_TEST_BAD_VALUE", 0u32).unwrap_err();
        assert!(err.to_string().contains("TIMECARD_TEST_BAD_VALUE"));
        unsafe { env::remove_var("TIMECARD_TEST_BAD_VALUE") };
    }
}
