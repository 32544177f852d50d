//! Store configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `PLANNER_READ_MAX_RETRIES` | 2 |
//! | `PLANNER_READ_RETRY_INITIAL_DELAY_MS` | 100 |
//! | `PLANNER_READ_RETRY_MAX_DELAY_MS` | 2000 |
//! | `PLANNER_NOTICE_CAPACITY` | 64 |
//! | `PLANNER_VENDOR_FALLBACK` | true |
//! | `PLANNER_CONSULTANCY_FEE` | 5000 |

use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Configuration shared by every store of a session.
///
/// # Example
///
/// ```
/// use event_planner_runtime::config::StoreConfig;
///
/// let config = StoreConfig::default()
///     .with_read_max_retries(0)
///     .with_vendor_fallback(false);
///
/// assert_eq!(config.retry_policy().max_retries, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Retries for idempotent reads after the first attempt
    pub read_max_retries: usize,
    /// Delay before the first read retry, in milliseconds
    pub read_retry_initial_delay_ms: u64,
    /// Cap on the delay between read retries, in milliseconds
    pub read_retry_max_delay_ms: u64,
    /// Buffer size of the notice broadcast channel
    pub notice_capacity: usize,
    /// Substitute the built-in vendor catalog when the remote one is empty
    /// or unreachable
    pub vendor_fallback: bool,
    /// Consultancy fee shown with an event's payment status
    pub consultancy_fee: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            read_max_retries: 2,
            read_retry_initial_delay_ms: 100,
            read_retry_max_delay_ms: 2000,
            notice_capacity: 64,
            vendor_fallback: true,
            consultancy_fee: 5000.0,
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl StoreConfig {
    /// Load configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup. Missing or unparseable values
    /// fall back to the defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            read_max_retries: parsed(&lookup, "PLANNER_READ_MAX_RETRIES", defaults.read_max_retries),
            read_retry_initial_delay_ms: parsed(
                &lookup,
                "PLANNER_READ_RETRY_INITIAL_DELAY_MS",
                defaults.read_retry_initial_delay_ms,
            ),
            read_retry_max_delay_ms: parsed(
                &lookup,
                "PLANNER_READ_RETRY_MAX_DELAY_MS",
                defaults.read_retry_max_delay_ms,
            ),
            notice_capacity: parsed(&lookup, "PLANNER_NOTICE_CAPACITY", defaults.notice_capacity),
            vendor_fallback: parsed(&lookup, "PLANNER_VENDOR_FALLBACK", defaults.vendor_fallback),
            consultancy_fee: parsed(&lookup, "PLANNER_CONSULTANCY_FEE", defaults.consultancy_fee),
        }
    }

    /// Set the number of read retries
    #[must_use]
    pub const fn with_read_max_retries(mut self, retries: usize) -> Self {
        self.read_max_retries = retries;
        self
    }

    /// Set the read retry delays
    #[must_use]
    pub const fn with_read_retry_delays(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.read_retry_initial_delay_ms = initial_ms;
        self.read_retry_max_delay_ms = max_ms;
        self
    }

    /// Set the notice buffer size
    #[must_use]
    pub const fn with_notice_capacity(mut self, capacity: usize) -> Self {
        self.notice_capacity = capacity;
        self
    }

    /// Enable or disable the built-in vendor catalog
    #[must_use]
    pub const fn with_vendor_fallback(mut self, enabled: bool) -> Self {
        self.vendor_fallback = enabled;
        self
    }

    /// Set the consultancy fee
    #[must_use]
    pub const fn with_consultancy_fee(mut self, fee: f64) -> Self {
        self.consultancy_fee = fee;
        self
    }

    /// Retry policy for idempotent reads
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.read_max_retries)
            .initial_delay(Duration::from_millis(self.read_retry_initial_delay_ms))
            .max_delay(Duration::from_millis(self.read_retry_max_delay_ms))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_keys_use_defaults() {
        assert_eq!(StoreConfig::from_lookup(|_| None), StoreConfig::default());
    }

    #[test]
    fn values_are_read_and_garbage_is_ignored() {
        let vars: HashMap<&str, &str> = [
            ("PLANNER_READ_MAX_RETRIES", "5"),
            ("PLANNER_VENDOR_FALLBACK", "false"),
            ("PLANNER_CONSULTANCY_FEE", "7500.5"),
            ("PLANNER_NOTICE_CAPACITY", "lots"),
        ]
        .into_iter()
        .collect();
        let config = StoreConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_owned()));

        assert_eq!(config.read_max_retries, 5);
        assert!(!config.vendor_fallback);
        assert!((config.consultancy_fee - 7500.5).abs() < f64::EPSILON);
        assert_eq!(config.notice_capacity, 64);
    }

    #[test]
    fn retry_policy_follows_config() {
        let policy = StoreConfig::default()
            .with_read_max_retries(4)
            .with_read_retry_delays(10, 50)
            .retry_policy();
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.initial_delay, Duration::from_millis(10));
        assert_eq!(policy.max_delay, Duration::from_millis(50));
    }
}
