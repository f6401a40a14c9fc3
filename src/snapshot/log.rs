//! Per-snapshot transfer log
//!
//! Every attempted snapshot gets one log file holding everything the
//! transfer tool wrote to stdout and stderr. Attempts are separated by marker
//! lines so operators can tell retries apart within a single file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{SnapvaultError, SnapvaultResult, TransferExit};

use super::command::TransferCommand;

/// Handles writing transfer output to a snapshot's log file
pub struct TransferLog {
    /// Path to the log file
    path: PathBuf,
    /// Open handle, shared with the child process
    file: File,
}

impl TransferLog {
    /// Create the log file, truncating any previous file at the same path
    pub fn create(path: impl Into<PathBuf>) -> SnapvaultResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| {
                SnapvaultError::Io(format!("Failed to open transfer log {}: {}", path.display(), e))
            })?;

        Ok(Self { path, file })
    }

    /// Path to the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A handle the transfer process can write its output into
    pub fn sink(&self) -> SnapvaultResult<File> {
        self.file.try_clone().map_err(|e| {
            SnapvaultError::Io(format!("Failed to share transfer log {}: {}", self.path.display(), e))
        })
    }

    /// Write the marker that opens an attempt
    pub fn begin_attempt(&mut self, attempt: u32, ceiling: u32, command: &TransferCommand) -> SnapvaultResult<()> {
        let line = format!(
            "==> attempt {} of {} at {} <==\n$ {}\n",
            attempt,
            ceiling,
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            command
        );
        self.write_line(&line)
    }

    /// Write the marker that closes an attempt
    pub fn end_attempt(&mut self, attempt: u32, exit: TransferExit) -> SnapvaultResult<()> {
        let line = format!("==> attempt {} finished: {} <==\n", attempt, exit);
        self.write_line(&line)
    }

    fn write_line(&mut self, line: &str) -> SnapvaultResult<()> {
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| {
                SnapvaultError::Io(format!("Failed to write transfer log {}: {}", self.path.display(), e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn command() -> TransferCommand {
        TransferCommand::build(
            "rsync",
            &["-a"],
            "--link-dest",
            None,
            Path::new("/src"),
            Path::new("/dst"),
        )
    }

    #[test]
    fn test_create_truncates_existing_log() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snap.log");
        fs::write(&path, "stale output from an earlier run\n").unwrap();

        let log = TransferLog::create(&path).unwrap();
        assert_eq!(log.path(), path);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_attempt_markers() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snap.log");

        let mut log = TransferLog::create(&path).unwrap();
        log.begin_attempt(1, 3, &command()).unwrap();
        log.end_attempt(1, TransferExit::Code(23)).unwrap();
        log.begin_attempt(2, 3, &command()).unwrap();
        log.end_attempt(2, TransferExit::Code(0)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("==> attempt 1 of 3 at "));
        assert!(contents.contains("$ rsync -a /src /dst"));
        assert!(contents.contains("==> attempt 1 finished: exit status 23 <=="));
        assert!(contents.contains("==> attempt 2 finished: exit status 0 <=="));
    }

    #[test]
    fn test_sink_writes_land_in_same_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("snap.log");

        let mut log = TransferLog::create(&path).unwrap();
        log.begin_attempt(1, 1, &command()).unwrap();
        let mut sink = log.sink().unwrap();
        sink.write_all(b"sending incremental file list\n").unwrap();
        log.end_attempt(1, TransferExit::Code(0)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let marker = contents.find("attempt 1 of 1").unwrap();
        let output = contents.find("sending incremental file list").unwrap();
        let finished = contents.find("attempt 1 finished").unwrap();
        assert!(marker < output && output < finished);
    }
}
