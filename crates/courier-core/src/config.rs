//! Messaging configuration.
//!
//! Precedence, highest first:
//! 1. `COURIER_*` environment variables
//! 2. TOML file
//! 3. defaults
//!
//! `validate` runs last and fails fast on values no consumer can work with.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::FailurePolicy;
use crate::app::backoff::INITIAL_POLL_INTERVAL;
use crate::error::ConfigError;

pub const ENV_QUEUE_NAME: &str = "COURIER_QUEUE_NAME";
pub const ENV_CONNECTION_TARGET: &str = "COURIER_CONNECTION_TARGET";
pub const ENV_MAX_BATCH_SIZE: &str = "COURIER_MAX_BATCH_SIZE";
pub const ENV_MAX_POLLING_INTERVAL_MS: &str = "COURIER_MAX_POLLING_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingOptions {
    /// Opaque to the engine; handed to whatever builds the queue client.
    pub connection_target: String,
    pub queue_name: String,
    /// Messages per receive. 1 keeps the poll consumer close to push
    /// semantics.
    pub max_batch_size: usize,
    /// Backoff ceiling for an idle poll consumer.
    pub max_polling_interval_ms: u64,
    /// Pause between messages of one batch.
    pub inter_message_delay_ms: u64,
    /// Used by the in-memory transport.
    pub visibility_timeout_ms: u64,
    /// Push transport only.
    pub max_concurrent_calls: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for MessagingOptions {
    fn default() -> Self {
        Self {
            connection_target: String::new(),
            queue_name: String::new(),
            max_batch_size: 1,
            max_polling_interval_ms: 51_200,
            inter_message_delay_ms: 0,
            visibility_timeout_ms: 30_000,
            max_concurrent_calls: 1,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl MessagingOptions {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading messaging config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Override from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override from any key lookup. Unparseable numbers are errors, not
    /// silently ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup(ENV_QUEUE_NAME) {
            self.queue_name = name;
        }
        if let Some(target) = lookup(ENV_CONNECTION_TARGET) {
            self.connection_target = target;
        }
        if let Some(raw) = lookup(ENV_MAX_BATCH_SIZE) {
            self.max_batch_size = parse_number("max_batch_size", &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_POLLING_INTERVAL_MS) {
            self.max_polling_interval_ms = parse_number("max_polling_interval_ms", &raw)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "queue_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        let floor = INITIAL_POLL_INTERVAL.as_millis() as u64;
        if self.max_polling_interval_ms < floor {
            return Err(ConfigError::Invalid {
                field: "max_polling_interval_ms",
                reason: format!("must be at least {floor}ms, got {}ms", self.max_polling_interval_ms),
            });
        }
        if self.max_concurrent_calls == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_calls",
                reason: "must be at least 1".to_string(),
            });
        }
        if let FailurePolicy::DeadLetterAfter { max_deliveries: 0 } = self.failure_policy {
            return Err(ConfigError::Invalid {
                field: "failure_policy.max_deliveries",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn max_polling_interval(&self) -> Duration {
        Duration::from_millis(self.max_polling_interval_ms)
    }

    pub fn inter_message_delay(&self) -> Duration {
        Duration::from_millis(self.inter_message_delay_ms)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_millis(self.visibility_timeout_ms)
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("'{raw}' is not a valid number: {e}"),
    })
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
    fn test_defaults_match_documented_values() {
        let options = MessagingOptions::default();
        assert_eq!(options.max_batch_size, 1);
        assert_eq!(options.max_polling_interval(), Duration::from_millis(51_200));
        assert_eq!(options.inter_message_delay(), Duration::ZERO);
        assert_eq!(options.visibility_timeout(), Duration::from_secs(30));
        assert_eq!(options.max_concurrent_calls, 1);
        assert_eq!(options.failure_policy, FailurePolicy::DeleteAlways);
    }

    #[test]
    fn test_toml_fills_missing_fields_with_defaults() {
        let options = MessagingOptions::from_toml_str(
            r#"
            queue_name = "orders"
            max_batch_size = 8

            [failure_policy]
            kind = "dead_letter_after"
            max_deliveries = 5
            "#,
        )
        .unwrap();

        assert_eq!(options.queue_name, "orders");
        assert_eq!(options.max_batch_size, 8);
        assert_eq!(options.max_polling_interval_ms, 51_200);
        assert_eq!(
            options.failure_policy,
            FailurePolicy::DeadLetterAfter { max_deliveries: 5 }
        );
        options.validate().unwrap();
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let err = MessagingOptions::from_toml_str("max_batch_size = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let err = MessagingOptions::from_file("/nonexistent/courier.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { ref path, .. } if path.ends_with("courier.toml")));
    }

    #[test]
    fn test_overrides_take_precedence_over_file_values() {
        let mut options = MessagingOptions::from_toml_str("queue_name = \"from-file\"").unwrap();
        options
            .apply_overrides(lookup(&[
                (ENV_QUEUE_NAME, "from-env"),
                (ENV_CONNECTION_TARGET, "memory://local"),
                (ENV_MAX_BATCH_SIZE, "4"),
                (ENV_MAX_POLLING_INTERVAL_MS, "1600"),
            ]))
            .unwrap();

        assert_eq!(options.queue_name, "from-env");
        assert_eq!(options.connection_target, "memory://local");
        assert_eq!(options.max_batch_size, 4);
        assert_eq!(options.max_polling_interval_ms, 1_600);
    }

    #[test]
    fn test_unparseable_override_is_rejected() {
        let mut options = MessagingOptions::default();
        let err = options
            .apply_overrides(lookup(&[(ENV_MAX_BATCH_SIZE, "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_batch_size", .. }));
    }

    #[test]
    fn test_validate_fails_fast_on_unusable_values() {
        let base = MessagingOptions {
            queue_name: "orders".into(),
            ..MessagingOptions::default()
        };
        base.validate().unwrap();

        let cases = [
            (
                MessagingOptions {
                    queue_name: "  ".into(),
                    ..base.clone()
                },
                "queue_name",
            ),
            (
                MessagingOptions {
                    max_batch_size: 0,
                    ..base.clone()
                },
                "max_batch_size",
            ),
            (
                MessagingOptions {
                    max_polling_interval_ms: 50,
                    ..base.clone()
                },
                "max_polling_interval_ms",
            ),
            (
                MessagingOptions {
                    failure_policy: FailurePolicy::DeadLetterAfter { max_deliveries: 0 },
                    ..base.clone()
                },
                "failure_policy.max_deliveries",
            ),
        ];

        for (options, expected) in cases {
            match options.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected {expected} to be rejected, got {other:?}"),
            }
        }
    }
}
