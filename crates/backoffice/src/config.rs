//! Back-office configuration and the runtime business settings seeded from it.

use serde::{Deserialize, Serialize};

use tailor_core::{DomainError, DomainResult, Money};
use tailor_observability::LogFormat;
use tailor_sales::DEFAULT_RETURN_WINDOW_DAYS;
use tailor_stock::DEFAULT_MIN_QUANTITY;

pub const ENV_RETURN_WINDOW_DAYS: &str = "TAILOR_RETURN_WINDOW_DAYS";
pub const ENV_DEFAULT_MIN_QUANTITY: &str = "TAILOR_DEFAULT_MIN_QUANTITY";
pub const ENV_LOYALTY_SPEND_PER_POINT: &str = "TAILOR_LOYALTY_SPEND_PER_POINT";
pub const ENV_CURRENCY: &str = "TAILOR_CURRENCY";
pub const ENV_LOG_FORMAT: &str = "TAILOR_LOG_FORMAT";
pub const ENV_ALERT_ADDRESS: &str = "TAILOR_ALERT_ADDRESS";

/// One point per 100.00 of spend.
pub const DEFAULT_SPEND_PER_POINT: Money = Money::from_minor(10_000);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Startup configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackofficeConfig {
    pub return_window_days: i64,
    pub default_min_quantity: i64,
    /// Minor currency units of spend per loyalty point.
    pub loyalty_spend_per_point: Money,
    pub currency: String,
    pub log_format: LogFormat,
    /// Where stock alerts are dispatched.
    pub alert_address: String,
}

impl Default for BackofficeConfig {
    fn default() -> Self {
        Self {
            return_window_days: DEFAULT_RETURN_WINDOW_DAYS,
            default_min_quantity: DEFAULT_MIN_QUANTITY,
            loyalty_spend_per_point: DEFAULT_SPEND_PER_POINT,
            currency: "EGP".to_string(),
            log_format: LogFormat::Json,
            alert_address: "stock-alerts".to_string(),
        }
    }
}

impl BackofficeConfig {
    /// Defaults overridden by `TAILOR_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_RETURN_WINDOW_DAYS) {
            config.return_window_days = parse_int(ENV_RETURN_WINDOW_DAYS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEFAULT_MIN_QUANTITY) {
            config.default_min_quantity = parse_int(ENV_DEFAULT_MIN_QUANTITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOYALTY_SPEND_PER_POINT) {
            config.loyalty_spend_per_point =
                Money::from_minor(parse_int(ENV_LOYALTY_SPEND_PER_POINT, &raw)?);
        }
        if let Some(raw) = lookup(ENV_CURRENCY) {
            let currency = raw.trim().to_ascii_uppercase();
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(ConfigError::InvalidValue {
                    key: ENV_CURRENCY,
                    value: raw,
                    reason: "expected a three-letter currency code".to_string(),
                });
            }
            config.currency = currency;
        }
        if let Some(raw) = lookup(ENV_LOG_FORMAT) {
            config.log_format = raw.parse().map_err(|e: tailor_observability::UnknownLogFormat| {
                ConfigError::InvalidValue {
                    key: ENV_LOG_FORMAT,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(raw) = lookup(ENV_ALERT_ADDRESS) {
            if !raw.trim().is_empty() {
                config.alert_address = raw.trim().to_string();
            }
        }

        config.settings().validate().map_err(|e| ConfigError::InvalidValue {
            key: "settings",
            value: format!("{config:?}"),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            return_window_days: self.return_window_days,
            default_min_quantity: self.default_min_quantity,
            loyalty_spend_per_point: self.loyalty_spend_per_point,
            currency: self.currency.clone(),
        }
    }
}

fn parse_int(key: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// Business settings singleton, editable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub return_window_days: i64,
    pub default_min_quantity: i64,
    pub loyalty_spend_per_point: Money,
    pub currency: String,
}

impl Settings {
    pub fn validate(&self) -> DomainResult<()> {
        if self.return_window_days < 0 {
            return Err(DomainError::validation("return window cannot be negative"));
        }
        if self.default_min_quantity < 0 {
            return Err(DomainError::validation(
                "default minimum quantity cannot be negative",
            ));
        }
        if !self.loyalty_spend_per_point.is_positive() {
            return Err(DomainError::validation(
                "loyalty spend per point must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        BackofficeConfig::default().settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_shop_defaults() {
        let config = BackofficeConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.return_window_days, 7);
        assert_eq!(config.default_min_quantity, 10);
        assert_eq!(config.loyalty_spend_per_point, Money::from_minor(10_000));
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = BackofficeConfig::from_lookup(lookup(&[
            (ENV_RETURN_WINDOW_DAYS, "14"),
            (ENV_LOYALTY_SPEND_PER_POINT, "5000"),
            (ENV_CURRENCY, "usd"),
            (ENV_LOG_FORMAT, "pretty"),
        ]))
        .unwrap();
        assert_eq!(config.return_window_days, 14);
        assert_eq!(config.loyalty_spend_per_point, Money::from_minor(5_000));
        assert_eq!(config.currency, "USD");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn malformed_numbers_are_typed_errors() {
        let err = BackofficeConfig::from_lookup(lookup(&[(ENV_DEFAULT_MIN_QUANTITY, "ten")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, ENV_DEFAULT_MIN_QUANTITY),
        }
    }

    #[test]
    fn zero_spend_per_point_is_rejected() {
        let err = BackofficeConfig::from_lookup(lookup(&[(ENV_LOYALTY_SPEND_PER_POINT, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "settings", .. }));
    }
}
