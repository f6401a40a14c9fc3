//! Snapshot CLI commands
//!
//! Implements the backup cycle and the snapshot maintenance commands.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::Dispatch;

use crate::config::settings::Settings;
use crate::error::{SnapvaultError, SnapvaultResult};
use crate::lock::StoreLock;
use crate::logging::build_dispatch;
use crate::snapshot::{
    FailedSnapshot, PruneReport, ProcessRunner, Snapshot, SnapshotStore, TransferInvoker,
};

/// Settings that can be overridden per invocation
#[derive(Args, Debug, Default, Clone)]
pub struct StoreArgs {
    /// Directory to back up
    #[arg(short, long, env = "SNAPVAULT_SOURCE")]
    pub source: Option<PathBuf>,

    /// Root directory holding the snapshots
    #[arg(short, long, env = "SNAPVAULT_DEST")]
    pub dest: Option<PathBuf>,

    /// Days to keep snapshots (0 = latest only, negative = forever)
    #[arg(short, long, allow_negative_numbers = true)]
    pub keep_days: Option<i64>,

    /// Maximum transfer attempts per snapshot
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Transfer program to run instead of rsync
    #[arg(long)]
    pub program: Option<String>,
}

impl StoreArgs {
    /// Apply the overrides on top of loaded settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(source) = &self.source {
            settings.source = Some(source.clone());
        }
        if let Some(dest) = &self.dest {
            settings.destination = Some(dest.clone());
        }
        if let Some(days) = self.keep_days {
            settings.retention_days = days;
        }
        if let Some(retries) = self.retries {
            settings.retry_ceiling = retries;
        }
        if let Some(program) = &self.program {
            settings.transfer_program = program.clone();
        }
    }
}

/// Snapshot subcommands
#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Create a new snapshot, then prune old ones
    Run {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Create a new snapshot without pruning
    Create {
        #[command(flatten)]
        store: StoreArgs,
    },

    /// Delete snapshots older than the retention period
    Prune {
        #[command(flatten)]
        store: StoreArgs,

        /// Actually delete (otherwise only show what would go)
        #[arg(short, long)]
        force: bool,
    },

    /// List snapshots and failed remnants
    List {
        #[command(flatten)]
        store: StoreArgs,

        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Delete the remnants of failed snapshots
    PurgeFailed {
        #[command(flatten)]
        store: StoreArgs,

        /// Actually delete (otherwise only show what would go)
        #[arg(short, long)]
        force: bool,
    },
}

/// An opened store plus everything a cycle needs around it
struct Session {
    store: SnapshotStore,
    settings: Settings,
    dispatch: Dispatch,
    _lock: Option<StoreLock>,
}

impl Session {
    fn open(settings: &Settings, store_args: &StoreArgs, lock: bool) -> SnapvaultResult<Self> {
        let mut settings = settings.clone();
        store_args.apply(&mut settings);
        settings.validate()?;

        let dispatch = build_dispatch(&settings.log_level);
        let destination = settings.require_destination()?.clone();
        let mut store = SnapshotStore::open(&destination, settings.timestamp_format()?, dispatch.clone())?;

        let lock = if lock && settings.use_lock {
            let guard = StoreLock::try_acquire(store.root())?;
            // Someone may have finished a cycle between the scan and the lock
            store.rescan()?;
            Some(guard)
        } else {
            None
        };

        Ok(Self {
            store,
            settings,
            dispatch,
            _lock: lock,
        })
    }

    fn invoker(&self) -> TransferInvoker {
        TransferInvoker::new(self.settings.retry_ceiling, self.dispatch.clone())
            .with_retry_delay(Duration::from_secs(self.settings.retry_delay_secs))
    }

    fn create(&mut self) -> SnapvaultResult<Snapshot> {
        let source = self.settings.require_source()?.clone();
        let tool = self.settings.transfer_tool();
        let invoker = self.invoker();

        println!("Creating snapshot of {}...", source.display());
        let snapshot = self
            .store
            .create_snapshot(&source, &tool, &invoker, &mut ProcessRunner)?;
        println!("Snapshot created: {}", snapshot.name);
        println!("Location: {}", snapshot.path.display());
        println!("Log: {}", self.store.log_path(&snapshot.name).display());
        Ok(snapshot)
    }

    fn prune(&mut self, now: DateTime<Utc>) -> SnapvaultResult<()> {
        let policy = self.settings.retention();
        let report = self.store.prune_at(policy, now);
        print_prune_report(&report);
        prune_result(&report)
    }
}

/// Handle a snapshot command
pub fn handle_snapshot_command(settings: &Settings, cmd: SnapshotCommands) -> SnapvaultResult<()> {
    match cmd {
        SnapshotCommands::Run { store } => {
            let mut session = Session::open(settings, &store, true)?;

            match session.create() {
                Ok(_) => session.prune(Utc::now())?,
                Err(err) => {
                    report_create_failure(&session, &err);
                    if session.settings.prune_after_failure {
                        // Pruning problems are printed; the creation failure decides the exit
                        let _ = session.prune(Utc::now());
                    }
                    return Err(err);
                }
            }
        }

        SnapshotCommands::Create { store } => {
            let mut session = Session::open(settings, &store, true)?;
            if let Err(err) = session.create() {
                report_create_failure(&session, &err);
                return Err(err);
            }
        }

        SnapshotCommands::Prune { store, force } => {
            let mut session = Session::open(settings, &store, force)?;
            let policy = session.settings.retention();
            // One instant for both the listing and the removal
            let now = Utc::now();
            let expired = session.store.expired(policy, now);

            if expired.is_empty() {
                println!("No snapshots to prune.");
                println!("Retention policy: {}", policy);
                println!("You have {} snapshot(s).", session.store.len());
                return Ok(());
            }

            println!("Prune Summary");
            println!("=============");
            println!("Retention policy: {}", policy);
            println!("Current snapshots: {}", session.store.len());
            println!("To be deleted: {}", expired.len());
            for snapshot in &expired {
                println!("  {}", snapshot.name);
            }
            println!();

            if !force {
                println!("To delete these snapshots, run again with --force flag:");
                println!("  snapvault prune --force");
                return Ok(());
            }

            session.prune(now)?;
        }

        SnapshotCommands::List {
            store,
            verbose,
            json,
        } => {
            let session = Session::open(settings, &store, false)?;
            let snapshots = session.store.snapshots();
            let failed = session.store.failed_remnants()?;

            if json {
                let listing = Listing {
                    root: session.store.root().to_path_buf(),
                    snapshots: &snapshots,
                    failed: &failed,
                };
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }

            print_listing(&session.store, &snapshots, &failed, verbose);
        }

        SnapshotCommands::PurgeFailed { store, force } => {
            let session = Session::open(settings, &store, force)?;
            let failed = session.store.failed_remnants()?;

            if failed.is_empty() {
                println!("No failed snapshots found.");
                return Ok(());
            }

            println!("Failed snapshots:");
            for remnant in &failed {
                println!("  {}", remnant.path.display());
            }
            println!();

            if !force {
                println!("To delete these directories, run again with --force flag:");
                println!("  snapvault purge-failed --force");
                return Ok(());
            }

            let mut failures = 0;
            for remnant in &failed {
                match session.store.remove_failed(remnant) {
                    Ok(()) => println!("Deleted {}", remnant.path.display()),
                    Err(err) => {
                        eprintln!("{}", err);
                        failures += 1;
                    }
                }
            }
            if failures > 0 {
                return Err(SnapvaultError::PruneIncomplete { failures });
            }
        }
    }

    Ok(())
}

fn report_create_failure(session: &Session, err: &SnapvaultError) {
    eprintln!("Snapshot failed: {}", err);
    if let Some(remnant) = session.store.last_failed() {
        eprintln!("Partial data left at: {}", remnant.path.display());
        if let Some(log) = &remnant.log_path {
            eprintln!("Transfer log: {}", log.display());
        }
    }
}

fn print_prune_report(report: &PruneReport) {
    if report.removed.is_empty() && report.errors.is_empty() {
        println!("No snapshots pruned.");
        return;
    }
    for name in &report.removed {
        println!("Deleted snapshot {}", name);
    }
    for err in &report.errors {
        eprintln!("{}", err);
    }
    println!("Deleted {} snapshot(s).", report.removed.len());
}

fn prune_result(report: &PruneReport) -> SnapvaultResult<()> {
    if report.is_clean() {
        Ok(())
    } else {
        Err(SnapvaultError::PruneIncomplete {
            failures: report.errors.len(),
        })
    }
}

#[derive(Serialize)]
struct Listing<'a> {
    root: PathBuf,
    snapshots: &'a [Snapshot],
    failed: &'a [FailedSnapshot],
}

fn print_listing(store: &SnapshotStore, snapshots: &[Snapshot], failed: &[FailedSnapshot], verbose: bool) {
    if snapshots.is_empty() && failed.is_empty() {
        println!("No snapshots found in {}.", store.root().display());
        println!("Create one with: snapvault run");
        return;
    }

    println!("Snapshots in {}", store.root().display());
    println!("=================");
    println!();

    let now = Utc::now();
    for (i, snapshot) in snapshots.iter().enumerate() {
        let age = format_duration(now.signed_duration_since(snapshot.created_at));
        let latest = if i == 0 { " [latest]" } else { "" };

        if verbose {
            let log = store.log_path(&snapshot.name);
            println!(
                "{}. {}{}\n   Created: {}\n   Age: {}\n   Path: {}\n   Log: {}\n",
                i + 1,
                snapshot.name,
                latest,
                snapshot.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                age,
                snapshot.path.display(),
                if log.exists() {
                    log.display().to_string()
                } else {
                    "(missing)".to_string()
                },
            );
        } else {
            println!("  {}. {} ({} ago){}", i + 1, snapshot.name, age, latest);
        }
    }

    if !failed.is_empty() {
        println!();
        println!("Failed snapshots (not used for linking, never pruned):");
        for remnant in failed {
            println!("  {}", remnant.path.display());
        }
        println!("Reclaim them with: snapvault purge-failed --force");
    }

    println!();
    println!("Total: {} snapshot(s), {} failed", snapshots.len(), failed.len());
}

/// Format a duration in human-readable form
fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds();

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    format!("{}d", days)
}
