//! Configuration loading from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use fieldops_core::CountryId;
use fieldops_inventory::SourcingPolicyTable;

use crate::attachments::{AttachmentStore, DirectoryAttachmentStore, InMemoryAttachmentStore};
use crate::retry::RetryPolicy;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Deployment environment. Production hides internal error detail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Knobs of the fulfillment pipeline itself.
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentConfig {
    /// Oldest-unpaid-order age (days) above which new orders are held back.
    pub balance_age_threshold_days: i64,
    /// Hard bound on one commit attempt.
    pub transaction_timeout: Duration,
    /// Postgres `lock_timeout` inside the commit transaction.
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
    /// Countries whose users may only source from their own country.
    pub country_only_sourcing: Vec<CountryId>,
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            balance_age_threshold_days: 30,
            transaction_timeout: Duration::from_millis(15_000),
            lock_timeout: Duration::from_millis(5_000),
            retry: RetryPolicy::default(),
            country_only_sourcing: Vec::new(),
        }
    }
}

impl FulfillmentConfig {
    pub fn sourcing_policies(&self) -> SourcingPolicyTable {
        SourcingPolicyTable::country_only_for(self.country_only_sourcing.iter().copied())
    }
}

/// Process-level settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub db_max_connections: u32,
    /// Apply the bundled schema on start.
    pub migrate: bool,
    /// Directory inline attachments are written to.
    pub attachment_dir: Option<PathBuf>,
    /// Public URL prefix the attachment directory is served under.
    pub attachment_base_url: String,
    pub fulfillment: FulfillmentConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = FulfillmentConfig::default();
        let retry_defaults = defaults.retry.clone();

        let retry = RetryPolicy {
            max_attempts: parse_or(&var, "FIELDOPS_RETRY_MAX_ATTEMPTS", retry_defaults.max_attempts)?,
            base_delay: millis_or(&var, "FIELDOPS_RETRY_BASE_DELAY_MS", retry_defaults.base_delay)?,
            max_delay: millis_or(&var, "FIELDOPS_RETRY_MAX_DELAY_MS", retry_defaults.max_delay)?,
            ..retry_defaults
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "FIELDOPS_RETRY_MAX_ATTEMPTS",
                value: "0".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        let country_only_sourcing = match var("FIELDOPS_COUNTRY_ONLY_SOURCING") {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    CountryId::from_str(s).map_err(|e| ConfigError::Invalid {
                        key: "FIELDOPS_COUNTRY_ONLY_SOURCING",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        let balance_age_threshold_days = parse_or(
            &var,
            "FIELDOPS_BALANCE_AGE_THRESHOLD_DAYS",
            defaults.balance_age_threshold_days,
        )?;
        if balance_age_threshold_days < 0 {
            return Err(ConfigError::Invalid {
                key: "FIELDOPS_BALANCE_AGE_THRESHOLD_DAYS",
                value: balance_age_threshold_days.to_string(),
                reason: "must not be negative".to_string(),
            });
        }

        let fulfillment = FulfillmentConfig {
            balance_age_threshold_days,
            transaction_timeout: millis_or(&var, "FIELDOPS_TX_TIMEOUT_MS", defaults.transaction_timeout)?,
            lock_timeout: millis_or(&var, "FIELDOPS_LOCK_TIMEOUT_MS", defaults.lock_timeout)?,
            retry,
            country_only_sourcing,
        };

        let environment = match var("FIELDOPS_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            _ => Environment::Development,
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            bind_addr: parse_or(&var, "FIELDOPS_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            environment,
            db_max_connections: parse_or(&var, "FIELDOPS_DB_MAX_CONNECTIONS", 10)?,
            migrate: parse_or(&var, "FIELDOPS_MIGRATE", false)?,
            attachment_dir: var("FIELDOPS_ATTACHMENT_DIR").map(PathBuf::from),
            attachment_base_url: var("FIELDOPS_ATTACHMENT_BASE_URL").unwrap_or_else(|| "/attachments".to_string()),
            fulfillment,
        })
    }

    /// Where inline attachments go.
    ///
    /// A configured directory always wins. Without one, the all-in-memory
    /// setup keeps uploads in memory; a Postgres-backed deployment gets no
    /// store, so inline attachments are rejected instead of producing URLs
    /// that die with the process.
    pub fn attachment_store(&self) -> Option<Arc<dyn AttachmentStore>> {
        let store: Arc<dyn AttachmentStore> = match (&self.attachment_dir, &self.database_url) {
            (Some(dir), _) => Arc::new(DirectoryAttachmentStore::new(dir.clone(), self.attachment_base_url.clone())),
            (None, None) => Arc::new(InMemoryAttachmentStore::default()),
            (None, Some(_)) => return None,
        };
        Some(store)
    }
}

fn parse_or<T, V>(var: &V, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn millis_or<V>(var: &V, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    let ms = parse_or(var, key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use fieldops_inventory::SourcingPolicy;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let s = settings(&[]).unwrap();

        assert_eq!(s.database_url, None);
        assert_eq!(s.bind_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(s.environment, Environment::Development);
        assert_eq!(s.db_max_connections, 10);
        assert!(!s.migrate);
        assert_eq!(s.attachment_dir, None);
        assert_eq!(s.fulfillment, FulfillmentConfig::default());
    }

    #[test]
    fn durable_deployments_need_an_attachment_dir_for_inline_uploads() {
        assert!(settings(&[]).unwrap().attachment_store().is_some());
        assert!(
            settings(&[("DATABASE_URL", "postgres://localhost/fieldops")])
                .unwrap()
                .attachment_store()
                .is_none()
        );

        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/fieldops"),
            ("FIELDOPS_ATTACHMENT_DIR", "/var/lib/fieldops/attachments"),
            ("FIELDOPS_ATTACHMENT_BASE_URL", "https://files.example/orders"),
        ])
        .unwrap();
        assert_eq!(s.attachment_dir, Some(PathBuf::from("/var/lib/fieldops/attachments")));
        assert_eq!(s.attachment_base_url, "https://files.example/orders");
        assert!(s.attachment_store().is_some());
    }

    #[test]
    fn overrides_are_parsed() {
        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/fieldops"),
            ("FIELDOPS_ENV", "production"),
            ("FIELDOPS_BALANCE_AGE_THRESHOLD_DAYS", "3"),
            ("FIELDOPS_TX_TIMEOUT_MS", "2500"),
            ("FIELDOPS_RETRY_MAX_ATTEMPTS", "5"),
            ("FIELDOPS_COUNTRY_ONLY_SOURCING", "2, 7"),
            ("FIELDOPS_MIGRATE", "true"),
        ])
        .unwrap();

        assert_eq!(s.database_url.as_deref(), Some("postgres://localhost/fieldops"));
        assert!(s.environment.is_production());
        assert!(s.migrate);
        assert_eq!(s.fulfillment.balance_age_threshold_days, 3);
        assert_eq!(s.fulfillment.transaction_timeout, Duration::from_millis(2500));
        assert_eq!(s.fulfillment.retry.max_attempts, 5);

        let table = s.fulfillment.sourcing_policies();
        assert_eq!(table.policy_for(CountryId::new(7).unwrap()), SourcingPolicy::CountryOnly);
        assert_eq!(table.policy_for(CountryId::new(1).unwrap()), SourcingPolicy::RegionThenCountry);
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = settings(&[("FIELDOPS_TX_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("FIELDOPS_TX_TIMEOUT_MS"));

        let err = settings(&[("FIELDOPS_COUNTRY_ONLY_SOURCING", "2,abc")]).unwrap_err();
        assert!(err.to_string().contains("FIELDOPS_COUNTRY_ONLY_SOURCING"));

        assert!(settings(&[("FIELDOPS_RETRY_MAX_ATTEMPTS", "0")]).is_err());
    }
}
