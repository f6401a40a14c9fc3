//! Snapvault - rotating rsync snapshots
//!
//! This library keeps a rotating set of timestamped directory snapshots. Each
//! new snapshot is produced by an external transfer tool (rsync by default)
//! linked against the most recent successful snapshot, so unchanged files are
//! hard links rather than copies. Transfers are retried up to a ceiling, a
//! snapshot that never succeeds is renamed aside with a `-FAILED` suffix, and
//! snapshots older than the retention period are pruned.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `snapshot`: Naming, transfer invocation, the snapshot store and pruning
//! - `lock`: Advisory lock serializing cycles on one store
//! - `logging`: Diagnostic output setup
//! - `cli`: Command handlers for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use snapvault::config::{paths::SnapvaultPaths, settings::Settings};
//!
//! let paths = SnapvaultPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod snapshot;

pub use error::SnapvaultError;
