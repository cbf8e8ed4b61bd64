//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset and no level is configured
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the log filter
///
/// `verbose` forces `debug`; otherwise `RUST_LOG` wins over `level`.
#[must_use]
pub fn log_filter(level: &str, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
    })
}

/// Install the global fmt subscriber; later calls are ignored
pub fn init_logging(level: &str, verbose: bool) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(log_filter(level, verbose))
        .with_target(false)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("logging initialized");
    }
}
