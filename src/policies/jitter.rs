//! # Jitter policy for poll intervals.
//!
//! [`JitterPolicy`] randomizes the watchdog's sleep between counter polls so
//! that redundant controllers sharing one counter do not poll in lockstep.
//!
//! - [`JitterPolicy::None`]: sleep exactly the configured interval
//! - [`JitterPolicy::Full`]: uniform in `[0, interval)`
//! - [`JitterPolicy::Equal`]: `interval/2` plus uniform `[0, interval/2)`

use rand::Rng;
use std::time::Duration;

/// Randomization applied to a poll interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact interval. Predictable, useful in tests.
    None,

    /// Uniform in `[0, interval)`. Default for the watchdog.
    #[default]
    Full,

    /// `interval/2 + uniform[0, interval/2)`. Keeps a floor on the poll period.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given interval.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use poolvisor::JitterPolicy;
    ///
    /// let max = Duration::from_secs(200);
    /// assert!(JitterPolicy::Full.apply(max) < max);
    /// assert_eq!(JitterPolicy::None.apply(max), max);
    /// ```
    pub fn apply(&self, interval: Duration) -> Duration {
        match self {
            JitterPolicy::None => interval,
            JitterPolicy::Full => scale(interval, unit()),
            JitterPolicy::Equal => {
                let half = interval / 2;
                half + scale(interval - half, unit())
            }
        }
    }
}

/// Uniform sample in `[0, 1)`.
fn unit() -> f64 {
    rand::rng().random::<f64>()
}

/// `interval * fraction`, rounded down to whole nanoseconds so the result stays
/// strictly below `interval` for any `fraction < 1`.
fn scale(interval: Duration, fraction: f64) -> Duration {
    let nanos = interval.as_nanos() as f64 * fraction;
    let nanos = (nanos.floor() as u128).min(interval.as_nanos().saturating_sub(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_jitter_stays_in_half_open_range() {
        let max = Duration::from_millis(50);
        for _ in 0..1_000 {
            let d = JitterPolicy::Full.apply(max);
            assert!(d < max, "{d:?} not below {max:?}");
        }
    }

    #[test]
    fn equal_jitter_keeps_a_floor() {
        let max = Duration::from_secs(10);
        for _ in 0..1_000 {
            let d = JitterPolicy::Equal.apply(max);
            assert!(d >= Duration::from_secs(5) && d < max, "{d:?}");
        }
    }

    #[test]
    fn zero_interval_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn scale_never_reaches_the_bound() {
        let max = Duration::from_nanos(10);
        assert_eq!(scale(max, 0.999_999_999), Duration::from_nanos(9));
        assert_eq!(scale(max, 0.0), Duration::ZERO);
    }
}
