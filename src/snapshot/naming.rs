//! Snapshot naming
//!
//! A snapshot directory is named by its creation time rendered through a
//! strftime-style format. A directory entry is only a snapshot if its name
//! parses under the format and renders back to the exact same string.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{SnapvaultError, SnapvaultResult};

/// Default snapshot name format: `YYYY-MM-DD-HH:MM:SS`
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Suffix appended to a snapshot directory whose transfer failed
pub const FAILED_SUFFIX: &str = "-FAILED";

/// A validated timestamp format used to name snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFormat {
    pattern: String,
}

impl TimestampFormat {
    /// Create a format from a strftime pattern
    ///
    /// # Errors
    ///
    /// Returns a configuration error if names rendered by the pattern cannot
    /// be parsed back to the same instant, contain a path separator, or end
    /// with the failed-snapshot suffix.
    pub fn new(pattern: impl Into<String>) -> SnapvaultResult<Self> {
        let format = Self {
            pattern: pattern.into(),
        };
        format.validate()?;
        Ok(format)
    }

    /// The strftime pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render a timestamp as a snapshot name
    pub fn render(&self, timestamp: &DateTime<Utc>) -> String {
        timestamp.format(&self.pattern).to_string()
    }

    /// Parse a snapshot name back into its timestamp
    ///
    /// Returns `None` for names that do not round-trip exactly, so a foreign
    /// directory that merely happens to parse is not mistaken for a snapshot.
    pub fn parse(&self, name: &str) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(name, &self.pattern).ok()?;
        let timestamp = Utc.from_utc_datetime(&naive);

        if self.render(&timestamp) == name {
            Some(timestamp)
        } else {
            None
        }
    }

    /// Check that the pattern can name snapshots at all
    fn validate(&self) -> SnapvaultResult<()> {
        // Formatting an invalid strftime item panics inside Display, so probe
        // the items before rendering anything.
        if chrono::format::StrftimeItems::new(&self.pattern)
            .any(|item| matches!(item, chrono::format::Item::Error))
        {
            return Err(SnapvaultError::Config(format!(
                "Invalid timestamp format '{}'",
                self.pattern
            )));
        }

        let probe = Utc
            .with_ymd_and_hms(2001, 2, 3, 4, 5, 6)
            .single()
            .ok_or_else(|| SnapvaultError::Config("Invalid probe timestamp".into()))?;
        let rendered = self.render(&probe);

        if rendered.is_empty() || rendered.contains(std::path::MAIN_SEPARATOR) || rendered.contains('/') {
            return Err(SnapvaultError::Config(format!(
                "Timestamp format '{}' must render a single path component",
                self.pattern
            )));
        }

        if rendered.ends_with(FAILED_SUFFIX) {
            return Err(SnapvaultError::Config(format!(
                "Timestamp format '{}' must not end with '{}'",
                self.pattern, FAILED_SUFFIX
            )));
        }

        match self.parse(&rendered) {
            Some(parsed) if parsed == probe => Ok(()),
            _ => Err(SnapvaultError::Config(format!(
                "Timestamp format '{}' does not identify a time to the second",
                self.pattern
            ))),
        }
    }

    /// Name of the remnant left behind by a failed snapshot
    pub fn failed_name(name: &str) -> String {
        format!("{}{}", name, FAILED_SUFFIX)
    }

    /// If `entry` is a failed remnant of a snapshot name, return that name
    pub fn strip_failed<'a>(&self, entry: &'a str) -> Option<&'a str> {
        let name = entry.strip_suffix(FAILED_SUFFIX)?;
        self.parse(name).map(|_| name)
    }
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl fmt::Display for TimestampFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_default_format_renders_expected_name() {
        let format = TimestampFormat::default();
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(format.render(&ts), "2024-03-09-07:05:01");
    }

    #[test]
    fn test_parse_round_trip() {
        let format = TimestampFormat::default();
        for name in [
            "2024-03-09-07:05:01",
            "1999-12-31-23:59:59",
            "2024-02-29-00:00:00",
        ] {
            let parsed = format.parse(name).unwrap();
            assert_eq!(format.render(&parsed), name);
        }

        let parsed = format.parse("2024-03-09-07:05:01").unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.day(), 9);
        assert_eq!(parsed.second(), 1);
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        let format = TimestampFormat::default();
        assert!(format.parse("current").is_none());
        assert!(format.parse("lost+found").is_none());
        assert!(format.parse("2024-03-09-07:05:01-FAILED").is_none());
        assert!(format.parse("2024-02-30-00:00:00").is_none());
    }

    #[test]
    fn test_parse_rejects_non_canonical_names() {
        let format = TimestampFormat::default();
        // Parses under %m/%d but would render with zero padding
        assert!(format.parse("2024-3-9-07:05:01").is_none());
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::new("snap_%Y%m%dT%H%M%S").unwrap();
        let ts = Utc.with_ymd_and_hms(2023, 11, 27, 14, 30, 22).unwrap();
        let name = format.render(&ts);
        assert_eq!(name, "snap_20231127T143022");
        assert_eq!(format.parse(&name), Some(ts));
    }

    #[test]
    fn test_rejects_coarse_format() {
        // Day granularity cannot name snapshots uniquely
        assert!(TimestampFormat::new("%Y-%m-%d").is_err());
    }

    #[test]
    fn test_rejects_path_separator() {
        assert!(TimestampFormat::new("%Y/%m/%d-%H:%M:%S").is_err());
    }

    #[test]
    fn test_rejects_invalid_pattern() {
        assert!(TimestampFormat::new("%Y-%m-%d-%H:%M:%S%").is_err());
    }

    #[test]
    fn test_failed_names() {
        let format = TimestampFormat::default();
        let failed = TimestampFormat::failed_name("2024-03-09-07:05:01");
        assert_eq!(failed, "2024-03-09-07:05:01-FAILED");
        assert_eq!(format.strip_failed(&failed), Some("2024-03-09-07:05:01"));
        assert_eq!(format.strip_failed("2024-03-09-07:05:01"), None);
        assert_eq!(format.strip_failed("junk-FAILED"), None);
    }
}
