//! Path management for Snapvault
//!
//! Resolves where the settings file lives.
//!
//! ## Path Resolution Order
//!
//! 1. `SNAPVAULT_CONFIG_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/snapvault` or `~/.config/snapvault`
//! 3. Windows: `%APPDATA%\snapvault`

use std::path::PathBuf;

use crate::error::SnapvaultError;

/// Manages all paths used by Snapvault
#[derive(Debug, Clone)]
pub struct SnapvaultPaths {
    /// Base directory for Snapvault configuration
    base_dir: PathBuf,
}

impl SnapvaultPaths {
    /// Create a new SnapvaultPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SnapvaultError> {
        let base_dir = if let Ok(custom) = std::env::var("SNAPVAULT_CONFIG_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create SnapvaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/snapvault/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Ensure the configuration directory exists
    pub fn ensure_directories(&self) -> Result<(), SnapvaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SnapvaultError::Io(format!("Failed to create config directory: {}", e)))
    }

    /// Check if a settings file has been written
    pub fn is_initialized(&self) -> bool {
        self.settings_file().exists()
    }
}

/// Resolve the default configuration directory based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, SnapvaultError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg).join("snapvault"));
    }
    let home = std::env::var("HOME")
        .map_err(|_| SnapvaultError::Config("Could not determine HOME directory".into()))?;
    Ok(PathBuf::from(home).join(".config").join("snapvault"))
}

/// Resolve the default configuration directory based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, SnapvaultError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| SnapvaultError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("snapvault"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapvaultPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert!(!paths.is_initialized());
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();
        let custom_path = temp_dir.path().to_str().unwrap();

        env::set_var("SNAPVAULT_CONFIG_DIR", custom_path);

        let paths = SnapvaultPaths::new().unwrap();
        assert_eq!(paths.base_dir(), temp_dir.path());

        env::remove_var("SNAPVAULT_CONFIG_DIR");
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapvaultPaths::with_base_dir(temp_dir.path().join("nested").join("config"));

        paths.ensure_directories().unwrap();

        assert!(paths.base_dir().is_dir());
    }
}
