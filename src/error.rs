//! Error types used by the pool controller and its collaborators.
//!
//! - [`ConfigError`]: invalid settings, detected once at startup and fatal.
//! - [`StageError`]: failures reported by the external crawler, validator or counter.
//! - [`CycleError`]: why a single crawl/validate cycle ended abnormally.
//! - [`QueueError`]: misuse or shutdown of a [`CompletionQueue`](crate::CompletionQueue).
//!
//! Every enum exposes `as_label` (stable snake_case label for logs/metrics).

use std::path::PathBuf;

use thiserror::Error;

/// # Configuration errors.
///
/// No safe default cycle behavior exists for an inconsistent configuration,
/// so these are raised by [`PoolConfig::validate`](crate::PoolConfig::validate)
/// and abort startup.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `lower_limit` is above `upper_limit`.
    #[error("lower_limit {lower} exceeds upper_limit {upper}")]
    LimitsInverted {
        /// Configured lower limit.
        lower: u64,
        /// Configured upper limit.
        upper: u64,
    },

    /// `upper_limit_ratio` is outside `(0, 1]` or not a number.
    #[error("upper_limit_ratio {ratio} must be in (0, 1]")]
    RatioOutOfRange {
        /// Configured ratio.
        ratio: f64,
    },

    /// The watchdog would stop the producer before the pool even reaches `lower_limit`.
    #[error("overshoot threshold {threshold} is below lower_limit {lower}")]
    ThresholdBelowLower {
        /// `floor(upper_limit * upper_limit_ratio)`.
        threshold: u64,
        /// Configured lower limit.
        lower: u64,
    },

    /// A polling interval is zero.
    #[error("{field} must be greater than zero")]
    ZeroInterval {
        /// Name of the offending option.
        field: &'static str,
    },

    /// Config file could not be read.
    #[error("failed to read config {path:?}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Config document is not valid TOML for [`PoolConfig`](crate::PoolConfig).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::LimitsInverted { .. } => "config_limits_inverted",
            ConfigError::RatioOutOfRange { .. } => "config_ratio_out_of_range",
            ConfigError::ThresholdBelowLower { .. } => "config_threshold_below_lower",
            ConfigError::ZeroInterval { .. } => "config_zero_interval",
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse(_) => "config_parse",
        }
    }
}

/// # Errors reported by external collaborators.
///
/// Crawlers, validators and counters return this type. `Fail` is transient,
/// `Fatal` ends the stage, and `Canceled` is a cooperative exit.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Transient failure; the caller may carry on.
    #[error("stage failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure; the stage must stop.
    #[error("fatal stage error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Stage exited because a stop or cancellation was requested.
    #[error("stage cancelled")]
    Canceled,
}

impl StageError {
    /// Shorthand for [`StageError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        StageError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`StageError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        StageError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use poolvisor::StageError;
    ///
    /// assert_eq!(StageError::fail("timeout").as_label(), "stage_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StageError::Fail { .. } => "stage_failed",
            StageError::Fatal { .. } => "stage_fatal",
            StageError::Canceled => "stage_canceled",
        }
    }

    /// Only [`StageError::Fail`] is retryable.
    ///
    /// # Example
    /// ```
    /// use poolvisor::StageError;
    ///
    /// assert!(StageError::fail("refused").is_retryable());
    /// assert!(!StageError::fatal("store gone").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Fail { .. })
    }
}

impl From<QueueError> for StageError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed | QueueError::Stopped => StageError::Canceled,
            QueueError::Full => StageError::fail(err.to_string()),
            QueueError::NotPending => StageError::fatal(err.to_string()),
        }
    }
}

/// # Why a cycle ended abnormally.
///
/// The controller logs these and moves on; none of them stops the refill loop.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    /// The crawler failed.
    #[error("producer failed: {0}")]
    Producer(#[source] StageError),

    /// The validator failed fatally.
    #[error("consumer failed: {0}")]
    Consumer(#[source] StageError),

    /// The counter failed fatally while the watchdog was polling it.
    #[error("watchdog failed: {0}")]
    Watchdog(#[source] StageError),

    /// The consumer returned while items were still outstanding.
    #[error("consumer exited before the queue drained")]
    ConsumerExited,

    /// A stage panicked.
    #[error("{stage} panicked: {message}")]
    Panicked {
        /// Stage name (`producer`, `consumer` or `watchdog`).
        stage: &'static str,
        /// Panic payload rendered as text.
        message: String,
    },

    /// A stage task was aborted by the runtime.
    #[error("{stage} task aborted")]
    Aborted {
        /// Stage name.
        stage: &'static str,
    },
}

impl CycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CycleError::Producer(_) => "cycle_producer_failed",
            CycleError::Consumer(_) => "cycle_consumer_failed",
            CycleError::Watchdog(_) => "cycle_watchdog_failed",
            CycleError::ConsumerExited => "cycle_consumer_exited",
            CycleError::Panicked { .. } => "cycle_stage_panicked",
            CycleError::Aborted { .. } => "cycle_stage_aborted",
        }
    }
}

/// # Completion queue errors.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue was closed at cycle teardown.
    #[error("queue closed")]
    Closed,

    /// Queue is at capacity (non-blocking put only).
    #[error("queue full")]
    Full,

    /// Producer was asked to stop while waiting for capacity.
    #[error("producer stop requested")]
    Stopped,

    /// `mark_done` was called more times than items were put.
    #[error("mark_done called with no unfinished items")]
    NotPending,
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::Closed => "queue_closed",
            QueueError::Full => "queue_full",
            QueueError::Stopped => "queue_stopped",
            QueueError::NotPending => "queue_not_pending",
        }
    }
}
