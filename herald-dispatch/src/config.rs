//! Dispatch pacing configuration and the adaptive sizing tiers.
//!
//! Larger audiences get larger batches but longer pauses, trading delivery
//! speed for a traffic shape the channel provider tolerates. Hosts may
//! override any field; everything else comes from the tier table.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, retry::RetryPolicy};

/// Sizing tiers keyed by audience size: `(max recipients, batch size,
/// inter-batch delay ms, inter-message delay ms)`. Audiences above the last
/// threshold fall through to [`default_batch_size`] and friends.
const SIZING_TIERS: [(usize, usize, u64, u64); 3] =
    [(10, 3, 1000, 300), (50, 5, 2000, 500), (100, 8, 3000, 700)];

/// Pacing and retry configuration for one dispatch.
///
/// All durations are plain millisecond counts so the struct round-trips
/// through serde without custom logic; use the accessor methods when a
/// [`Duration`] is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Jobs sent concurrently per batch.
    ///
    /// Default: 10
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between one batch finishing and the next starting.
    ///
    /// Default: 5000 ms
    #[serde(default = "default_delay_between_batches_ms")]
    pub delay_between_batches_ms: u64,

    /// Stagger between job starts inside a batch.
    ///
    /// Job `k` of a batch starts `k * delay` after the batch opens, so
    /// concurrent sends ramp up instead of firing at once.
    ///
    /// Default: 1000 ms
    #[serde(default = "default_delay_between_messages_ms")]
    pub delay_between_messages_ms: u64,

    /// Retries permitted per job beyond the initial attempt.
    ///
    /// Default: 3
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for retry backoff (in milliseconds).
    ///
    /// Default: 1000 ms
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Cap on retry backoff (in milliseconds).
    ///
    /// Default: 30000 ms
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Jitter factor applied to retry backoff, within `[0, 1)`.
    ///
    /// Default: 0.0
    #[serde(default)]
    pub retry_jitter: f64,

    /// Whether cancellation interrupts in-flight sends and backoff waits.
    ///
    /// When `false` (the default) cancellation is observed at batch and job
    /// boundaries only, and jobs already talking to the transport run to
    /// completion.
    #[serde(default)]
    pub hard_cancel: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_between_batches_ms: default_delay_between_batches_ms(),
            delay_between_messages_ms: default_delay_between_messages_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            retry_jitter: 0.0,
            hard_cancel: false,
        }
    }
}

impl DispatchConfig {
    /// Suggest pacing for an audience of `recipient_count`.
    ///
    /// Pure: the same count always yields the same configuration. Fields
    /// outside the tier table keep their defaults. A count of zero falls in
    /// the smallest tier; rejecting empty dispatches is the caller's job.
    #[must_use]
    pub fn suggest(recipient_count: usize) -> Self {
        for (threshold, batch_size, batch_delay_ms, message_delay_ms) in SIZING_TIERS {
            if recipient_count <= threshold {
                return Self {
                    batch_size,
                    delay_between_batches_ms: batch_delay_ms,
                    delay_between_messages_ms: message_delay_ms,
                    ..Self::default()
                };
            }
        }

        Self::default()
    }

    /// Suggest pacing for `recipient_count`, then layer `overrides` on top
    /// and validate the result.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] if the overridden
    /// configuration is unusable.
    pub fn resolve(
        recipient_count: usize,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ValidationError> {
        let config = overrides.apply(Self::suggest(recipient_count));
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidConfig`] if `batch_size` is zero or
    /// `retry_jitter` falls outside `[0, 1)`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.retry_jitter) {
            return Err(ValidationError::InvalidConfig(format!(
                "retry_jitter must be within [0, 1), got {}",
                self.retry_jitter
            )));
        }

        Ok(())
    }

    /// Pause between batches as a [`Duration`].
    #[must_use]
    pub const fn delay_between_batches(&self) -> Duration {
        Duration::from_millis(self.delay_between_batches_ms)
    }

    /// Stagger between job starts as a [`Duration`].
    #[must_use]
    pub const fn delay_between_messages(&self) -> Duration {
        Duration::from_millis(self.delay_between_messages_ms)
    }

    /// The retry policy this configuration describes.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            jitter_factor: self.retry_jitter,
        }
    }
}

/// Host-supplied overrides layered over a suggested configuration.
///
/// Unset fields keep the suggested value. Two layers exist in practice:
/// engine-wide overrides given at construction, and per-dispatch overrides
/// given to `start`, with the per-dispatch layer winning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub delay_between_batches_ms: Option<u64>,
    pub delay_between_messages_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub max_retry_delay_ms: Option<u64>,
    pub retry_jitter: Option<f64>,
    pub hard_cancel: Option<bool>,
}

impl ConfigOverrides {
    /// Apply these overrides to `config`, replacing only the set fields.
    #[must_use]
    pub fn apply(&self, mut config: DispatchConfig) -> DispatchConfig {
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(delay) = self.delay_between_batches_ms {
            config.delay_between_batches_ms = delay;
        }
        if let Some(delay) = self.delay_between_messages_ms {
            config.delay_between_messages_ms = delay;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(delay) = self.retry_base_delay_ms {
            config.retry_base_delay_ms = delay;
        }
        if let Some(delay) = self.max_retry_delay_ms {
            config.max_retry_delay_ms = delay;
        }
        if let Some(jitter) = self.retry_jitter {
            config.retry_jitter = jitter;
        }
        if let Some(hard_cancel) = self.hard_cancel {
            config.hard_cancel = hard_cancel;
        }
        config
    }

    /// Combine two override layers; fields set in `over` win.
    #[must_use]
    pub fn merged(&self, over: &Self) -> Self {
        Self {
            batch_size: over.batch_size.or(self.batch_size),
            delay_between_batches_ms: over
                .delay_between_batches_ms
                .or(self.delay_between_batches_ms),
            delay_between_messages_ms: over
                .delay_between_messages_ms
                .or(self.delay_between_messages_ms),
            max_retries: over.max_retries.or(self.max_retries),
            retry_base_delay_ms: over.retry_base_delay_ms.or(self.retry_base_delay_ms),
            max_retry_delay_ms: over.max_retry_delay_ms.or(self.max_retry_delay_ms),
            retry_jitter: over.retry_jitter.or(self.retry_jitter),
            hard_cancel: over.hard_cancel.or(self.hard_cancel),
        }
    }
}

const fn default_batch_size() -> usize {
    10
}

const fn default_delay_between_batches_ms() -> u64 {
    5000
}

const fn default_delay_between_messages_ms() -> u64 {
    1000
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay_ms() -> u64 {
    1000
}

const fn default_max_retry_delay_ms() -> u64 {
    30000
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_tier_small_audience() {
        for count in [1, 5, 10] {
            let config = DispatchConfig::suggest(count);
            assert_eq!(config.batch_size, 3, "count {count}");
            assert_eq!(config.delay_between_batches_ms, 1000);
            assert_eq!(config.delay_between_messages_ms, 300);
        }
    }

    #[test]
    fn test_tier_medium_audience() {
        for count in [11, 30, 50] {
            let config = DispatchConfig::suggest(count);
            assert_eq!(config.batch_size, 5, "count {count}");
            assert_eq!(config.delay_between_batches_ms, 2000);
            assert_eq!(config.delay_between_messages_ms, 500);
        }
    }

    #[test]
    fn test_tier_large_audience() {
        for count in [51, 99, 100] {
            let config = DispatchConfig::suggest(count);
            assert_eq!(config.batch_size, 8, "count {count}");
            assert_eq!(config.delay_between_batches_ms, 3000);
            assert_eq!(config.delay_between_messages_ms, 700);
        }
    }

    #[test]
    fn test_tier_above_all_thresholds() {
        for count in [101, 500, 10000] {
            let config = DispatchConfig::suggest(count);
            assert_eq!(config.batch_size, 10, "count {count}");
            assert_eq!(config.delay_between_batches_ms, 5000);
            assert_eq!(config.delay_between_messages_ms, 1000);
        }
    }

    #[test]
    fn test_suggest_is_pure() {
        assert_eq!(DispatchConfig::suggest(42), DispatchConfig::suggest(42));
        assert_eq!(DispatchConfig::suggest(250), DispatchConfig::suggest(250));
    }

    #[test]
    fn test_suggest_keeps_retry_defaults() {
        let config = DispatchConfig::suggest(7);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base_delay_ms, 1000);
        assert_eq!(config.max_retry_delay_ms, 30000);
        assert!(!config.hard_cancel);
    }

    #[test]
    fn test_overrides_apply_only_set_fields() {
        let overrides = ConfigOverrides {
            batch_size: Some(2),
            max_retries: Some(0),
            ..ConfigOverrides::default()
        };

        let config = overrides.apply(DispatchConfig::suggest(25));
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.max_retries, 0);
        // Untouched fields keep the tier values
        assert_eq!(config.delay_between_batches_ms, 2000);
        assert_eq!(config.delay_between_messages_ms, 500);
    }

    #[test]
    fn test_merged_later_layer_wins() {
        let engine = ConfigOverrides {
            batch_size: Some(4),
            max_retries: Some(1),
            ..ConfigOverrides::default()
        };
        let per_dispatch = ConfigOverrides {
            batch_size: Some(6),
            retry_base_delay_ms: Some(50),
            ..ConfigOverrides::default()
        };

        let merged = engine.merged(&per_dispatch);
        assert_eq!(merged.batch_size, Some(6));
        assert_eq!(merged.max_retries, Some(1));
        assert_eq!(merged.retry_base_delay_ms, Some(50));
    }

    #[test]
    fn test_resolve_validates() {
        let overrides = ConfigOverrides {
            batch_size: Some(0),
            ..ConfigOverrides::default()
        };
        let err = DispatchConfig::resolve(10, &overrides).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidConfig("batch_size must be at least 1".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_jitter() {
        let jitter = |retry_jitter| DispatchConfig {
            retry_jitter,
            ..DispatchConfig::default()
        };

        assert!(jitter(1.0).validate().is_err());
        assert!(jitter(-0.1).validate().is_err());
        assert!(jitter(0.25).validate().is_ok());
    }

    #[test]
    fn test_retry_policy_bridge() {
        let config = DispatchConfig {
            max_retries: 2,
            retry_base_delay_ms: 100,
            max_retry_delay_ms: 400,
            ..DispatchConfig::default()
        };

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: DispatchConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DispatchConfig::default());

        let config: DispatchConfig =
            serde_json::from_str(r#"{"batch_size": 3, "hard_cancel": true}"#).unwrap();
        assert_eq!(config.batch_size, 3);
        assert!(config.hard_cancel);
        assert_eq!(config.delay_between_batches_ms, 5000);
    }
}
