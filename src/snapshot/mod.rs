//! Snapshot lifecycle for Snapvault
//!
//! Maintains a rotating set of point-in-time directory snapshots. Data is
//! copied by an external transfer tool (rsync by default); this module only
//! decides names, links each new snapshot against the previous one, handles
//! failures and prunes old snapshots.
//!
//! # Architecture
//!
//! - `SnapshotStore`: Discovers, creates and prunes snapshots under a root
//! - `TransferInvoker`: Runs the transfer tool with a bounded retry loop
//! - `TransferRunner`: The seam between the invoker and the actual process
//! - `TimestampFormat`: Renders and parses snapshot names
//! - `RetentionPolicy`: Decides which snapshots pruning removes
//!
//! # Failed Snapshots
//!
//! A transfer that exhausts its retries leaves `<name>-FAILED` and its log in
//! the root. These remnants are never linked against and never removed
//! automatically; use [`SnapshotStore::remove_failed`] to reclaim them.
//!
//! # Example
//!
//! ```rust,ignore
//! use snapvault::snapshot::{ProcessRunner, RetentionPolicy, SnapshotStore, TimestampFormat,
//!     TransferInvoker, TransferTool};
//! use tracing::Dispatch;
//!
//! let mut store = SnapshotStore::open("/backups", TimestampFormat::default(), Dispatch::none())?;
//! let invoker = TransferInvoker::new(10, Dispatch::none());
//!
//! store.create_snapshot("/home".as_ref(), &TransferTool::default(), &invoker, &mut ProcessRunner)?;
//! let report = store.prune(RetentionPolicy::from_days(30));
//! ```

mod command;
mod log;
mod naming;
mod retention;
mod store;
mod transfer;

pub use command::{
    TransferCommand, TransferTool, DEFAULT_LINK_DEST_OPTION, DEFAULT_TRANSFER_OPTIONS,
    DEFAULT_TRANSFER_PROGRAM,
};
pub use log::TransferLog;
pub use naming::{TimestampFormat, DEFAULT_TIMESTAMP_FORMAT, FAILED_SUFFIX};
pub use retention::RetentionPolicy;
pub use store::{FailedSnapshot, PruneReport, Snapshot, SnapshotStore};
pub use transfer::{
    InvokerState, ProcessRunner, TransferInvoker, TransferOutcome, TransferRunner,
    DEFAULT_RETRY_CEILING,
};
