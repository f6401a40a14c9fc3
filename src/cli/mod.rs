//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the snapshot store.

pub mod snapshot;

pub use snapshot::{handle_snapshot_command, SnapshotCommands, StoreArgs};
