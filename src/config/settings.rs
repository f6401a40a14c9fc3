//! User settings for Snapvault
//!
//! Holds what to back up, where to, how the transfer tool is run and how
//! long snapshots are kept.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::SnapvaultPaths;
use crate::error::SnapvaultError;
use crate::logging::DEFAULT_LOG_LEVEL;
use crate::snapshot::{
    RetentionPolicy, TimestampFormat, TransferTool, DEFAULT_LINK_DEST_OPTION, DEFAULT_RETRY_CEILING,
    DEFAULT_TIMESTAMP_FORMAT, DEFAULT_TRANSFER_OPTIONS, DEFAULT_TRANSFER_PROGRAM,
};

/// User settings for Snapvault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Directory to back up
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Root directory holding the snapshots
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Transfer program
    #[serde(default = "default_transfer_program")]
    pub transfer_program: String,

    /// Options always passed to the transfer program
    #[serde(default = "default_transfer_options")]
    pub transfer_options: Vec<String>,

    /// Option naming the previous snapshot to link against
    #[serde(default = "default_link_dest_option")]
    pub link_dest_option: String,

    /// Maximum transfer attempts per snapshot
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    /// Pause between failed attempts, in seconds
    #[serde(default)]
    pub retry_delay_secs: u64,

    /// Days to keep snapshots (0 = latest only, negative = forever)
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Snapshot name format (strftime)
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Whether a cycle takes the store lock
    #[serde(default = "default_true")]
    pub use_lock: bool,

    /// Whether `run` still prunes after the new snapshot failed
    #[serde(default)]
    pub prune_after_failure: bool,

    /// Diagnostic log level when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_schema_version() -> u32 {
    1
}

fn default_transfer_program() -> String {
    DEFAULT_TRANSFER_PROGRAM.to_string()
}

fn default_transfer_options() -> Vec<String> {
    DEFAULT_TRANSFER_OPTIONS.iter().map(|o| o.to_string()).collect()
}

fn default_link_dest_option() -> String {
    DEFAULT_LINK_DEST_OPTION.to_string()
}

fn default_retry_ceiling() -> u32 {
    DEFAULT_RETRY_CEILING
}

fn default_retention_days() -> i64 {
    30
}

fn default_timestamp_format() -> String {
    DEFAULT_TIMESTAMP_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            source: None,
            destination: None,
            transfer_program: default_transfer_program(),
            transfer_options: default_transfer_options(),
            link_dest_option: default_link_dest_option(),
            retry_ceiling: default_retry_ceiling(),
            retry_delay_secs: 0,
            retention_days: default_retention_days(),
            timestamp_format: default_timestamp_format(),
            use_lock: true,
            prune_after_failure: false,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &SnapvaultPaths) -> Result<Self, SnapvaultError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                SnapvaultError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                SnapvaultError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &SnapvaultPaths) -> Result<(), SnapvaultError> {
        paths.ensure_directories()?;

        let settings_path = paths.settings_file();
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            SnapvaultError::Config(format!("Failed to serialize settings: {}", e))
        })?;

        std::fs::write(&settings_path, contents).map_err(|e| {
            SnapvaultError::Io(format!("Failed to write settings file: {}", e))
        })?;

        Ok(())
    }

    /// Check values that cannot be expressed by the types alone
    pub fn validate(&self) -> Result<(), SnapvaultError> {
        if self.retry_ceiling == 0 {
            return Err(SnapvaultError::Config(
                "retry_ceiling must be at least 1".into(),
            ));
        }
        if self.transfer_program.trim().is_empty() {
            return Err(SnapvaultError::Config(
                "transfer_program must not be empty".into(),
            ));
        }
        self.timestamp_format()?;
        Ok(())
    }

    /// The validated snapshot name format
    pub fn timestamp_format(&self) -> Result<TimestampFormat, SnapvaultError> {
        TimestampFormat::new(self.timestamp_format.clone())
    }

    /// The retention policy the configured period stands for
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::from_days(self.retention_days)
    }

    /// The transfer tool as configured
    pub fn transfer_tool(&self) -> TransferTool {
        TransferTool {
            program: self.transfer_program.clone(),
            options: self.transfer_options.clone(),
            link_dest_option: self.link_dest_option.clone(),
        }
    }

    /// Source directory, or an error naming how to set it
    pub fn require_source(&self) -> Result<&PathBuf, SnapvaultError> {
        self.source.as_ref().ok_or_else(|| {
            SnapvaultError::Config("No source configured (use --source or set \"source\")".into())
        })
    }

    /// Snapshot root, or an error naming how to set it
    pub fn require_destination(&self) -> Result<&PathBuf, SnapvaultError> {
        self.destination.as_ref().ok_or_else(|| {
            SnapvaultError::Config(
                "No destination configured (use --dest or set \"destination\")".into(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.transfer_program, "rsync");
        assert_eq!(settings.transfer_options.len(), 8);
        assert_eq!(settings.transfer_options[0], "--archive");
        assert_eq!(settings.retry_ceiling, 10);
        assert_eq!(settings.retention_days, 30);
        assert_eq!(settings.timestamp_format, "%Y-%m-%d-%H:%M:%S");
        assert_eq!(settings.retention(), RetentionPolicy::Days(30));
        assert!(settings.use_lock);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapvaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        let mut settings = Settings::default();
        settings.source = Some(PathBuf::from("/home/user"));
        settings.retention_days = -1;

        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.source, Some(PathBuf::from("/home/user")));
        assert_eq!(loaded.retention(), RetentionPolicy::KeepAll);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapvaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"retention_days": 0}"#).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.retention(), RetentionPolicy::KeepLatest);
        assert_eq!(loaded.retry_ceiling, 10);
        assert_eq!(loaded.transfer_tool(), TransferTool::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapvaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), "{ not json").unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, SnapvaultError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.retry_ceiling = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.timestamp_format = "%Y".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_require_paths() {
        let settings = Settings::default();
        assert!(settings.require_source().is_err());
        assert!(settings.require_destination().is_err());
    }
}
