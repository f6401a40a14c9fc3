//! Snapshot store
//!
//! Owns a root directory of timestamp-named snapshot directories. The set of
//! snapshots is rebuilt from a directory scan when the store is opened; the
//! scan is the only source of truth and never assumes the directory is
//! consistent. Entries that are not snapshots are left alone.
//!
//! Layout under the root:
//!
//! ```text
//! 2024-01-01-03:00:00/          snapshot
//! 2024-01-01-03:00:00.log       its transfer log
//! 2024-01-02-03:00:00-FAILED/   remnant of a failed transfer
//! 2024-01-02-03:00:00.log       log of the failed transfer
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn, Dispatch};

use crate::error::{SnapvaultError, SnapvaultResult};

use super::command::TransferTool;
use super::log::TransferLog;
use super::naming::TimestampFormat;
use super::retention::RetentionPolicy;
use super::transfer::{TransferInvoker, TransferRunner};

/// A completed snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    /// Directory name, the rendered creation time
    pub name: String,
    /// Creation time parsed back from the name
    pub created_at: DateTime<Utc>,
    /// Absolute path of the snapshot directory
    pub path: PathBuf,
}

/// A directory left behind by a transfer that never succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSnapshot {
    /// Name the snapshot would have had
    pub name: String,
    /// Absolute path of the `-FAILED` directory
    pub path: PathBuf,
    /// Transfer log, if still present
    pub log_path: Option<PathBuf>,
}

/// What a pruning pass did
#[derive(Debug, Default)]
pub struct PruneReport {
    /// Snapshots whose directories are gone and whose entries were dropped
    pub removed: Vec<String>,
    /// Per-snapshot problems; none of them stopped the pass
    pub errors: Vec<SnapvaultError>,
}

impl PruneReport {
    /// Whether every selected snapshot was removed completely
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Manages the set of snapshots under one root directory
pub struct SnapshotStore {
    /// Absolute root directory
    root: PathBuf,
    /// Naming scheme for snapshot directories
    format: TimestampFormat,
    /// Snapshot name -> creation time
    snapshots: BTreeMap<String, DateTime<Utc>>,
    /// Remnant left by the most recent failed creation, if it was renamed aside
    last_failed: Option<FailedSnapshot>,
    dispatch: Dispatch,
}

impl SnapshotStore {
    /// Open the store at `root`, creating the directory if needed
    pub fn open(root: impl AsRef<Path>, format: TimestampFormat, dispatch: Dispatch) -> SnapvaultResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| {
            SnapvaultError::Io(format!("Failed to create snapshot root {}: {}", root.display(), e))
        })?;
        let root = fs::canonicalize(root).map_err(|e| {
            SnapvaultError::Io(format!("Failed to resolve snapshot root {}: {}", root.display(), e))
        })?;

        let mut store = Self {
            root,
            format,
            snapshots: BTreeMap::new(),
            last_failed: None,
            dispatch,
        };
        store.rescan()?;
        Ok(store)
    }

    /// Rebuild the snapshot set from the directory contents
    pub fn rescan(&mut self) -> SnapvaultResult<()> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || -> SnapvaultResult<()> {
            let mut snapshots = BTreeMap::new();

            for name in self.child_directories()? {
                match self.format.parse(&name) {
                    Some(created_at) => {
                        snapshots.insert(name, created_at);
                    }
                    None => debug!("skipping non-snapshot entry {}", name),
                }
            }

            debug!(count = snapshots.len(), root = %self.root.display(), "scanned snapshot root");
            self.snapshots = snapshots;
            Ok(())
        })
    }

    /// Names of the immediate child directories of the root
    fn child_directories(&self) -> SnapvaultResult<Vec<String>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            SnapvaultError::Io(format!("Failed to read snapshot root {}: {}", self.root.display(), e))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            // Entries can vanish mid-scan; skip anything unreadable
            let Ok(entry) = entry else { continue };
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Absolute root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Naming scheme in use
    pub fn format(&self) -> &TimestampFormat {
        &self.format
    }

    /// Number of snapshots
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the store holds no snapshots
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Whether a snapshot with this name is known
    pub fn contains(&self, name: &str) -> bool {
        self.snapshots.contains_key(name)
    }

    /// Path of the snapshot directory for `name`
    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of the transfer log for `name`
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.log", name))
    }

    fn snapshot(&self, name: &str, created_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            name: name.to_string(),
            created_at,
            path: self.snapshot_path(name),
        }
    }

    /// All snapshots, newest first
    pub fn snapshots(&self) -> Vec<Snapshot> {
        let mut all: Vec<Snapshot> = self
            .snapshots
            .iter()
            .map(|(name, created_at)| self.snapshot(name, *created_at))
            .collect();
        all.sort_by(|a, b| (b.created_at, &b.name).cmp(&(a.created_at, &a.name)));
        all
    }

    /// The snapshot with the latest creation time
    ///
    /// Equal times are broken by the lexicographically greatest name.
    pub fn most_recent(&self) -> Option<Snapshot> {
        self.snapshots
            .iter()
            .max_by(|(a_name, a_time), (b_name, b_time)| (a_time, a_name).cmp(&(b_time, b_name)))
            .map(|(name, created_at)| self.snapshot(name, *created_at))
    }

    /// Create a new snapshot of `source`, named after the current time
    pub fn create_snapshot(
        &mut self,
        source: &Path,
        tool: &TransferTool,
        invoker: &TransferInvoker,
        runner: &mut dyn TransferRunner,
    ) -> SnapvaultResult<Snapshot> {
        self.create_snapshot_at(Utc::now(), source, tool, invoker, runner)
    }

    /// Create a new snapshot of `source`, named after `now`
    ///
    /// The transfer is linked against the most recent snapshot when there is
    /// one. The snapshot only enters the store once the transfer succeeded;
    /// a transfer that runs out of attempts leaves a `<name>-FAILED`
    /// directory and its log behind.
    pub fn create_snapshot_at(
        &mut self,
        now: DateTime<Utc>,
        source: &Path,
        tool: &TransferTool,
        invoker: &TransferInvoker,
        runner: &mut dyn TransferRunner,
    ) -> SnapvaultResult<Snapshot> {
        let dispatch = self.dispatch.clone();
        self.last_failed = None;
        tracing::dispatcher::with_default(&dispatch, || -> SnapvaultResult<Snapshot> {
            let source = std::path::absolute(source).map_err(|e| {
                SnapvaultError::Io(format!("Failed to resolve source {}: {}", source.display(), e))
            })?;
            let name = self.format.render(&now);
            let destination = self.snapshot_path(&name);

            if destination.is_dir() {
                return Err(SnapvaultError::NamingCollision { name });
            }

            fs::create_dir(&destination).map_err(|e| SnapvaultError::DestinationCreate {
                path: destination.clone(),
                reason: e.to_string(),
            })?;

            let previous = self.most_recent();
            match &previous {
                Some(prev) => info!("linking against previous snapshot {}", prev.name),
                None => info!("no previous snapshot, creating a full copy"),
            }

            let command = tool.command(
                previous.as_ref().map(|p| p.path.as_path()),
                &source,
                &destination,
            );

            let mut log = match TransferLog::create(self.log_path(&name)) {
                Ok(log) => log,
                Err(e) => {
                    // Nothing was transferred, so the empty directory can go
                    if let Err(cleanup) = fs::remove_dir(&destination) {
                        warn!("failed to remove {}: {}", destination.display(), cleanup);
                    }
                    return Err(e);
                }
            };

            match invoker.invoke(runner, &command, &mut log) {
                Ok(outcome) => {
                    let created_at = self.format.parse(&name).unwrap_or(now);
                    self.snapshots.insert(name.clone(), created_at);
                    info!(attempts = outcome.attempts, "created snapshot {}", name);
                    Ok(self.snapshot(&name, created_at))
                }
                Err(err) => Err(self.mark_failed(&name, &destination, err)),
            }
        })
    }

    /// Rename a snapshot whose transfer failed out of the way
    fn mark_failed(&mut self, name: &str, destination: &Path, err: SnapvaultError) -> SnapvaultError {
        let failed = self.root.join(TimestampFormat::failed_name(name));
        error!("snapshot {} failed: {}", name, err);

        match fs::rename(destination, &failed) {
            Ok(()) => {
                warn!("left failed snapshot at {}", failed.display());
                let log = self.log_path(name);
                self.last_failed = Some(FailedSnapshot {
                    name: name.to_string(),
                    path: failed,
                    log_path: log.is_file().then_some(log),
                });
                err
            }
            Err(e) => SnapvaultError::RenameToFailed {
                source: Box::new(err),
                from: destination.to_path_buf(),
                to: failed,
                reason: e.to_string(),
            },
        }
    }

    /// Remove snapshots the retention policy no longer keeps
    pub fn prune(&mut self, policy: RetentionPolicy) -> PruneReport {
        self.prune_at(policy, Utc::now())
    }

    /// Snapshots the retention policy no longer keeps as of `now`, newest first
    pub fn expired(&self, policy: RetentionPolicy, now: DateTime<Utc>) -> Vec<Snapshot> {
        if policy == RetentionPolicy::KeepAll {
            return Vec::new();
        }

        let latest = self.most_recent().map(|s| s.name);
        self.snapshots()
            .into_iter()
            .filter(|s| policy.expires(&s.created_at, &now, latest.as_deref() == Some(s.name.as_str())))
            .collect()
    }

    /// Remove snapshots the retention policy no longer keeps as of `now`
    ///
    /// Each selected snapshot loses its directory, its log and its entry.
    /// Problems are collected per snapshot and do not stop the pass.
    pub fn prune_at(&mut self, policy: RetentionPolicy, now: DateTime<Utc>) -> PruneReport {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || {
            let mut report = PruneReport::default();

            if policy == RetentionPolicy::KeepAll {
                debug!("retention disabled, nothing to prune");
                return report;
            }

            // Selected up front so removals cannot disturb the iteration
            for snapshot in self.expired(policy, now) {
                self.remove_snapshot(&snapshot.name, &mut report);
            }

            info!(removed = report.removed.len(), errors = report.errors.len(), "pruned snapshots ({})", policy);
            report
        })
    }

    /// Delete one snapshot's directory and log and drop its entry
    fn remove_snapshot(&mut self, name: &str, report: &mut PruneReport) {
        let directory = self.snapshot_path(name);
        match fs::remove_dir_all(&directory) {
            Ok(()) => info!("removed snapshot {}", name),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("snapshot directory {} was already gone", directory.display());
            }
            Err(e) => {
                // The directory is still there, so the snapshot stays known
                error!("failed to remove snapshot {}: {}", name, e);
                report.errors.push(SnapvaultError::PruneDelete {
                    name: name.to_string(),
                    path: directory,
                    reason: e.to_string(),
                });
                return;
            }
        }

        self.snapshots.remove(name);
        report.removed.push(name.to_string());

        let log = self.log_path(name);
        if let Err(e) = fs::remove_file(&log) {
            warn!("failed to remove log {}: {}", log.display(), e);
            report.errors.push(SnapvaultError::PruneDelete {
                name: name.to_string(),
                path: log,
                reason: e.to_string(),
            });
        }
    }

    /// Remnants of failed transfers, newest first
    pub fn failed_remnants(&self) -> SnapvaultResult<Vec<FailedSnapshot>> {
        let mut remnants: Vec<FailedSnapshot> = self
            .child_directories()?
            .iter()
            .filter_map(|entry| {
                let name = self.format.strip_failed(entry)?;
                let log = self.log_path(name);
                Some(FailedSnapshot {
                    name: name.to_string(),
                    path: self.root.join(entry),
                    log_path: log.is_file().then_some(log),
                })
            })
            .collect();
        remnants.sort_by_cached_key(|r| std::cmp::Reverse((self.format.parse(&r.name), r.name.clone())));
        Ok(remnants)
    }

    /// The remnant the last call to [`create_snapshot_at`](Self::create_snapshot_at)
    /// left behind
    ///
    /// `None` when that call succeeded, failed before the transfer, or could
    /// not rename its directory aside.
    pub fn last_failed(&self) -> Option<&FailedSnapshot> {
        self.last_failed.as_ref()
    }

    /// Delete a failed remnant and its log
    ///
    /// Failed remnants are never removed by creation or pruning; this is the
    /// explicit way to reclaim them.
    pub fn remove_failed(&self, remnant: &FailedSnapshot) -> SnapvaultResult<()> {
        let dispatch = self.dispatch.clone();
        tracing::dispatcher::with_default(&dispatch, || -> SnapvaultResult<()> {
            fs::remove_dir_all(&remnant.path).map_err(|e| SnapvaultError::PruneDelete {
                name: remnant.name.clone(),
                path: remnant.path.clone(),
                reason: e.to_string(),
            })?;

            if let Some(log) = &remnant.log_path {
                match fs::remove_file(log) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(SnapvaultError::PruneDelete {
                            name: remnant.name.clone(),
                            path: log.clone(),
                            reason: e.to_string(),
                        })
                    }
                }
            }

            info!("removed failed snapshot {}", remnant.name);
            Ok(())
        })
    }
}
