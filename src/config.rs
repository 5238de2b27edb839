//! Configuration module
//!
//! Loads configuration from environment variables.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::Currency;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Currency every wallet and plan is held in
    pub platform_currency: Currency,

    /// Per-transaction ceiling for basic KYC, in major units
    pub kyc_basic_limit: Decimal,

    /// Per-transaction ceiling for full KYC, in major units
    pub kyc_full_limit: Decimal,

    /// Amount at which an advisory tax warning is attached
    pub tax_threshold: Decimal,

    /// Rate limit: requests per minute per caller
    pub rate_limit_per_minute: u32,

    /// Contribution attempts per plan within the attempt window
    pub contribution_attempt_limit: u32,
    pub contribution_attempt_window: Duration,

    pub auto_save_interval: Duration,
    pub reconciliation_interval: Duration,

    /// Age after which a pending transaction is reconciled
    pub reconciliation_timeout: Duration,

    /// Persist audit entries in the hash-chained `audit_logs` table instead
    /// of the log stream
    pub audit_hash_chain: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let platform_currency = Currency::new(&string_or("PLATFORM_CURRENCY", "NGN"))
            .map_err(|_| ConfigError::InvalidValue("PLATFORM_CURRENCY"))?;

        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            host: string_or("HOST", "127.0.0.1"),
            port: parse_or("PORT", 3000)?,
            environment: string_or("ENVIRONMENT", "development"),
            platform_currency,
            kyc_basic_limit: parse_or("KYC_BASIC_LIMIT", Decimal::from(50_000))?,
            kyc_full_limit: parse_or("KYC_FULL_LIMIT", Decimal::from(500_000))?,
            tax_threshold: parse_or("TAX_THRESHOLD", Decimal::from(1_000_000))?,
            rate_limit_per_minute: parse_or("RATE_LIMIT_PER_MINUTE", 100)?,
            contribution_attempt_limit: parse_or("CONTRIBUTION_ATTEMPT_LIMIT", 5)?,
            contribution_attempt_window: secs_or("CONTRIBUTION_ATTEMPT_WINDOW_SECS", 60)?,
            auto_save_interval: secs_or("AUTO_SAVE_INTERVAL_SECS", 60)?,
            reconciliation_interval: secs_or("RECONCILIATION_INTERVAL_SECS", 60)?,
            reconciliation_timeout: secs_or("RECONCILIATION_TIMEOUT_SECS", 900)?,
            audit_hash_chain: parse_or("AUDIT_HASH_CHAIN", false)?,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn string_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(name)),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_or(name, default)?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(name));
    }
    Ok(Duration::from_secs(secs))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_when_unset() {
        let value: u32 = parse_or("DAILY_SAVINGS_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_invalid_value_names_variable() {
        env::set_var("DAILY_SAVINGS_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16, _> = parse_or("DAILY_SAVINGS_TEST_BAD_PORT", 3000);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue("DAILY_SAVINGS_TEST_BAD_PORT"))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        env::set_var("DAILY_SAVINGS_TEST_ZERO_SECS", "0");
        assert!(secs_or("DAILY_SAVINGS_TEST_ZERO_SECS", 60).is_err());
    }
}
