//! # Tracing subscriber setup.
//!
//! Installs a `tracing-subscriber` stack writing to stderr. The filter comes from,
//! in order:
//!
//! 1. `POOLVISOR_LOG` (e.g. `poolvisor=debug,warn`)
//! 2. `RUST_LOG`
//! 3. the [`Verbosity`] passed in

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Env var checked before `RUST_LOG`.
pub const LOG_ENV: &str = "POOLVISOR_LOG";

/// Default verbosity when no env filter is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Cycle boundaries, trips and failures.
    #[default]
    Normal,
    /// Every poll, check and rejected item.
    Verbose,
}

impl Verbosity {
    /// Maps `-v` / `-q` style flags; verbose wins when both are set.
    #[must_use]
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    /// Level used when neither env var is set.
    #[must_use]
    pub const fn default_level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `Err` if one is already installed; the existing one stays in place.
pub fn init_tracing(verbosity: Verbosity) -> Result<(), tracing_subscriber::util::TryInitError> {
    let stderr_is_tty = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(stderr_is_tty)
        .with_target(verbosity == Verbosity::Verbose);

    tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(layer)
        .try_init()
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    // Unparseable directives fall through to the next source.
    if let Some(filter) = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(verbosity.default_level().as_str())
}
