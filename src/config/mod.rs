//! Configuration module for Snapvault
//!
//! Handles path resolution and user settings.

pub mod paths;
pub mod settings;

pub use paths::SnapvaultPaths;
pub use settings::Settings;
