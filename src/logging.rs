//! Logging setup for Snapvault
//!
//! Diagnostics go through `tracing`, but no subscriber is ever installed
//! globally. The CLI builds one [`Dispatch`] and hands it to the snapshot
//! store and the transfer invoker, which emit their events under it.
//!
//! # Configuration
//!
//! - `RUST_LOG`: Log level filter, takes precedence when set
//!   - Examples: `debug`, `snapvault=trace`
//! - `log_level` setting / `--log-level` flag: used when `RUST_LOG` is unset
//!   (default: `info`)
//!
//! Output goes to stderr with UTC timestamps, so stdout stays clean for
//! command results.

use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

/// Level used when neither `RUST_LOG` nor a setting names one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the dispatch the store and invoker log through
pub fn build_dispatch(level: &str) -> Dispatch {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .finish();

    Dispatch::new(subscriber)
}
