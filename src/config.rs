//! # Pool controller configuration.
//!
//! Provides [`PoolConfig`], the settings for the admission loop, the watchdog
//! and the per-cycle queue.
//!
//! Config is used in two ways:
//! 1. **Controller creation**: `PoolController::builder(cfg, ...)` validates it once.
//! 2. **File loading**: [`PoolConfig::load`] / [`PoolConfig::from_toml_str`].
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → unbounded queue (no backpressure)
//! - `consumer_workers = 0` → treated as 1
//!
//! ## File format
//! ```toml
//! lower_limit = 10
//! upper_limit = 100
//! upper_limit_ratio = 0.9
//! check_cycle_time = 30        # seconds, fractions allowed
//! check_interval_time = 300
//! watchdog_max_interval = 200
//! queue_capacity = 0
//! consumer_workers = 4
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Settings for the pool controller.
///
/// ## Field semantics
/// - `lower_limit`: a cycle starts when the counter is strictly below this
/// - `upper_limit`: nominal hard ceiling of the pool
/// - `upper_limit_ratio`: fraction of `upper_limit` at which the watchdog stops the producer
/// - `check_cycle_time`: delay between idle counter checks
/// - `check_interval_time`: delay between the end of a cycle and the next idle check
/// - `watchdog_max_interval`: upper bound (exclusive) of the randomized watchdog poll interval
/// - `queue_capacity`: per-cycle queue bound (`0` = unbounded)
/// - `consumer_workers`: concurrent validation loops sharing the queue
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug, PartialEq)]
pub struct PoolConfig {
    /// Counter threshold below which a new cycle starts.
    pub lower_limit: u64,
    /// Nominal hard ceiling for pool size.
    pub upper_limit: u64,
    /// Fraction (`<= 1.0`) of `upper_limit` at which the watchdog stops the producer.
    pub upper_limit_ratio: f64,
    /// Delay between idle counter checks.
    pub check_cycle_time: Duration,
    /// Delay between the end of one cycle and the next idle check.
    pub check_interval_time: Duration,
    /// Upper bound of the randomized watchdog poll interval.
    pub watchdog_max_interval: Duration,
    /// Queue bound; `0` disables backpressure.
    pub queue_capacity: usize,
    /// Number of validation loops per cycle.
    pub consumer_workers: usize,
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl PoolConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// The result is **not** validated; the builder does that.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use poolvisor::PoolConfig;
    ///
    /// let cfg = PoolConfig::from_toml_str("lower_limit = 10\ncheck_cycle_time = 0.5").unwrap();
    /// assert_eq!(cfg.lower_limit, 10);
    /// assert_eq!(cfg.check_cycle_time, Duration::from_millis(500));
    /// ```
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(raw)?;
        Ok(file.into_config())
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lower_limit > self.upper_limit {
            return Err(ConfigError::LimitsInverted {
                lower: self.lower_limit,
                upper: self.upper_limit,
            });
        }
        if !(self.upper_limit_ratio > 0.0 && self.upper_limit_ratio <= 1.0) {
            return Err(ConfigError::RatioOutOfRange {
                ratio: self.upper_limit_ratio,
            });
        }
        let threshold = self.overshoot_threshold();
        if threshold < self.lower_limit {
            return Err(ConfigError::ThresholdBelowLower {
                threshold,
                lower: self.lower_limit,
            });
        }
        if self.check_cycle_time.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "check_cycle_time",
            });
        }
        if self.watchdog_max_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "watchdog_max_interval",
            });
        }
        Ok(())
    }

    /// Counter value the watchdog must exceed before stopping the producer.
    ///
    /// `floor(upper_limit * upper_limit_ratio)`; for integer counts
    /// `count > floor(x)` is the same test as `count > x`.
    #[inline]
    pub fn overshoot_threshold(&self) -> u64 {
        (self.upper_limit as f64 * self.upper_limit_ratio).floor() as u64
    }

    /// Returns the queue bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn queue_bound(&self) -> Option<usize> {
        match self.queue_capacity {
            0 => None,
            n => Some(n),
        }
    }

    /// Number of validation loops, at least 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.consumer_workers.max(1)
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - band `20..100`, watchdog at 80% of the ceiling
    /// - idle checks every 30s, 5 minutes of rest after each cycle
    /// - watchdog polls at most every 200s
    /// - unbounded queue, one validation loop
    fn default() -> Self {
        Self {
            lower_limit: 20,
            upper_limit: 100,
            upper_limit_ratio: 0.8,
            check_cycle_time: Duration::from_secs(30),
            check_interval_time: Duration::from_secs(300),
            watchdog_max_interval: Duration::from_secs(200),
            queue_capacity: 0,
            consumer_workers: 1,
            bus_capacity: 1024,
        }
    }
}

/// On-disk shape: durations as fractional seconds, every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    lower_limit: Option<u64>,
    upper_limit: Option<u64>,
    upper_limit_ratio: Option<f64>,
    check_cycle_time: Option<f64>,
    check_interval_time: Option<f64>,
    watchdog_max_interval: Option<f64>,
    queue_capacity: Option<usize>,
    consumer_workers: Option<usize>,
    bus_capacity: Option<usize>,
}

impl ConfigFile {
    fn into_config(self) -> PoolConfig {
        let d = PoolConfig::default();
        PoolConfig {
            lower_limit: self.lower_limit.unwrap_or(d.lower_limit),
            upper_limit: self.upper_limit.unwrap_or(d.upper_limit),
            upper_limit_ratio: self.upper_limit_ratio.unwrap_or(d.upper_limit_ratio),
            check_cycle_time: secs_or(self.check_cycle_time, d.check_cycle_time),
            check_interval_time: secs_or(self.check_interval_time, d.check_interval_time),
            watchdog_max_interval: secs_or(self.watchdog_max_interval, d.watchdog_max_interval),
            queue_capacity: self.queue_capacity.unwrap_or(d.queue_capacity),
            consumer_workers: self.consumer_workers.unwrap_or(d.consumer_workers),
            bus_capacity: self.bus_capacity.unwrap_or(d.bus_capacity),
        }
    }
}

/// Negative or non-finite seconds collapse to zero so `validate` reports them.
fn secs_or(secs: Option<f64>, default: Duration) -> Duration {
    match secs {
        Some(s) => Duration::try_from_secs_f64(s).unwrap_or(Duration::ZERO),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PoolConfig::default().validate().is_ok());
    }

    #[test]
    fn threshold_floors_the_product() {
        let cfg = PoolConfig {
            upper_limit: 100,
            upper_limit_ratio: 0.9,
            ..PoolConfig::default()
        };
        assert_eq!(cfg.overshoot_threshold(), 90);

        let cfg = PoolConfig {
            upper_limit: 101,
            upper_limit_ratio: 0.9,
            ..PoolConfig::default()
        };
        assert_eq!(cfg.overshoot_threshold(), 90);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let cfg = PoolConfig {
            lower_limit: 200,
            upper_limit: 100,
            ..PoolConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "config_limits_inverted");
    }

    #[test]
    fn ratio_must_be_in_unit_interval() {
        for ratio in [0.0, -0.5, 1.5, f64::NAN] {
            let cfg = PoolConfig {
                upper_limit_ratio: ratio,
                ..PoolConfig::default()
            };
            assert!(
                matches!(cfg.validate(), Err(ConfigError::RatioOutOfRange { .. })),
                "ratio {ratio} accepted"
            );
        }
        let cfg = PoolConfig {
            upper_limit_ratio: 1.0,
            ..PoolConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn threshold_below_lower_limit_is_rejected() {
        let cfg = PoolConfig {
            lower_limit: 50,
            upper_limit: 100,
            upper_limit_ratio: 0.4,
            ..PoolConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ThresholdBelowLower {
                threshold: 40,
                lower: 50
            })
        ));
    }

    #[test]
    fn zero_poll_intervals_are_rejected() {
        let cfg = PoolConfig {
            watchdog_max_interval: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ZeroInterval {
                field: "watchdog_max_interval"
            })
        ));

        let cfg = PoolConfig {
            check_cycle_time: Duration::ZERO,
            ..PoolConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ZeroInterval {
                field: "check_cycle_time"
            })
        ));
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let cfg = PoolConfig::from_toml_str(
            r#"
            lower_limit = 10
            upper_limit_ratio = 0.9
            watchdog_max_interval = 1.5
            queue_capacity = 64
            "#,
        )
        .unwrap();

        assert_eq!(cfg.lower_limit, 10);
        assert_eq!(cfg.upper_limit, 100);
        assert_eq!(cfg.upper_limit_ratio, 0.9);
        assert_eq!(cfg.watchdog_max_interval, Duration::from_millis(1500));
        assert_eq!(cfg.queue_bound(), Some(64));
        assert_eq!(cfg.check_interval_time, Duration::from_secs(300));
    }

    #[test]
    fn negative_duration_fails_validation() {
        let cfg = PoolConfig::from_toml_str("check_cycle_time = -3").unwrap();
        assert_eq!(cfg.check_cycle_time, Duration::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let err = PoolConfig::from_toml_str("lowr_limit = 3").unwrap_err();
        assert_eq!(err.as_label(), "config_parse");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PoolConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
