//! Relay settings read from the environment.

use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use tessera_outbox::OutboxRelayConfig;

use crate::error::AppError;

/// Settings of the relay process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// `PostgreSQL` connection string (`DATABASE_URL`).
    pub database_url: String,
    /// Pool size (`DATABASE_MAX_CONNECTIONS`, default 10).
    pub max_connections: u32,
    /// Rows per cycle (`OUTBOX_BATCH_SIZE`, default 10).
    pub batch_size: u64,
    /// Pause between cycles (`OUTBOX_POLL_INTERVAL_MS`, default 1000).
    pub poll_interval: Duration,
    /// Cap on a single publish (`OUTBOX_PUBLISH_TIMEOUT_MS`, default 5000).
    pub publish_timeout: Duration,
    /// How long dispatched rows are kept (`OUTBOX_RETENTION_DAYS`, default 7).
    pub retention: TimeDelta,
    /// Pause between cleanups (`OUTBOX_CLEANUP_INTERVAL_SECS`, default 3600).
    pub cleanup_interval: Duration,
}

impl RelaySettings {
    /// Reads the settings from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing, a numeric
    /// variable does not parse or is zero, or the retention does not fit a
    /// duration.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::Config("DATABASE_URL must be set".to_owned()))?;

        Ok(Self {
            database_url,
            max_connections: positive(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            batch_size: positive(&lookup, "OUTBOX_BATCH_SIZE", 10)?,
            poll_interval: Duration::from_millis(positive(&lookup, "OUTBOX_POLL_INTERVAL_MS", 1000)?),
            publish_timeout: Duration::from_millis(positive(
                &lookup,
                "OUTBOX_PUBLISH_TIMEOUT_MS",
                5000,
            )?),
            retention: retention_days(&lookup)?,
            cleanup_interval: Duration::from_secs(positive(
                &lookup,
                "OUTBOX_CLEANUP_INTERVAL_SECS",
                3600,
            )?),
        })
    }

    /// The relay tuning these settings describe.
    #[must_use]
    pub fn relay_config(&self) -> OutboxRelayConfig {
        OutboxRelayConfig {
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
            publish_timeout: self.publish_timeout,
            retention: self.retention,
        }
    }
}

fn retention_days<F>(lookup: &F) -> Result<TimeDelta, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let days: i64 = positive(lookup, "OUTBOX_RETENTION_DAYS", 7)?;
    TimeDelta::try_days(days).ok_or_else(|| {
        AppError::Config(format!("OUTBOX_RETENTION_DAYS is out of range, got {days}"))
    })
}

fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(AppError::Config(format!(
            "{key} must be a positive integer, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_only_database_url_is_set() {
        // Arrange
        let env = lookup(&[("DATABASE_URL", "postgres://localhost/tessera")]);

        // Act
        let settings = RelaySettings::from_lookup(env).unwrap();

        // Assert
        assert_eq!(settings.database_url, "postgres://localhost/tessera");
        assert_eq!(settings.max_connections, 10);
        assert_eq!(settings.relay_config(), OutboxRelayConfig::default());
        assert_eq!(settings.cleanup_interval, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let env = lookup(&[
            ("DATABASE_URL", "postgres://db/tessera"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("OUTBOX_BATCH_SIZE", "50"),
            ("OUTBOX_POLL_INTERVAL_MS", "250"),
            ("OUTBOX_PUBLISH_TIMEOUT_MS", "1500"),
            ("OUTBOX_RETENTION_DAYS", "30"),
            ("OUTBOX_CLEANUP_INTERVAL_SECS", "60"),
        ]);

        let settings = RelaySettings::from_lookup(env).unwrap();

        assert_eq!(settings.max_connections, 12);
        let config = settings.relay_config();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.publish_timeout, Duration::from_millis(1500));
        assert_eq!(config.retention, TimeDelta::days(30));
        assert_eq!(settings.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = RelaySettings::from_lookup(lookup(&[]));

        assert!(matches!(result, Err(AppError::Config(ref m)) if m.contains("DATABASE_URL")));
    }

    #[rstest]
    #[case("OUTBOX_BATCH_SIZE", "ten")]
    #[case("OUTBOX_BATCH_SIZE", "0")]
    #[case("OUTBOX_POLL_INTERVAL_MS", "-5")]
    #[case("OUTBOX_RETENTION_DAYS", "")]
    #[case("OUTBOX_RETENTION_DAYS", "999999999999")]
    #[case("OUTBOX_RETENTION_DAYS", "99999999999999999999")]
    fn test_invalid_numbers_are_config_errors(#[case] key: &str, #[case] value: &str) {
        let env = lookup(&[("DATABASE_URL", "postgres://db/tessera"), (key, value)]);

        let result = RelaySettings::from_lookup(env);

        assert!(matches!(result, Err(AppError::Config(ref m)) if m.contains(key)));
    }
}
