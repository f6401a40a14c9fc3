//! Retention policy for pruning
//!
//! The policy is configured as a single number of days: zero keeps only the
//! most recent snapshot, a positive value keeps snapshots younger than that
//! many days, and a negative value disables pruning.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// What pruning is allowed to remove
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Never remove anything
    KeepAll,
    /// Remove everything except the most recent snapshot
    KeepLatest,
    /// Remove snapshots older than this many days
    Days(u32),
}

impl RetentionPolicy {
    /// Interpret the configured retention period
    pub fn from_days(days: i64) -> Self {
        match days {
            d if d < 0 => Self::KeepAll,
            0 => Self::KeepLatest,
            d => Self::Days(u32::try_from(d).unwrap_or(u32::MAX)),
        }
    }

    /// The configured retention period this policy came from
    pub fn as_days(&self) -> i64 {
        match self {
            Self::KeepAll => -1,
            Self::KeepLatest => 0,
            Self::Days(days) => i64::from(*days),
        }
    }

    /// Whether a snapshot created at `created_at` has aged out as of `now`
    ///
    /// `is_latest` marks the most recent snapshot in the store, which only
    /// matters for [`RetentionPolicy::KeepLatest`].
    pub fn expires(&self, created_at: &DateTime<Utc>, now: &DateTime<Utc>, is_latest: bool) -> bool {
        match self {
            Self::KeepAll => false,
            Self::KeepLatest => !is_latest,
            Self::Days(days) => now.signed_duration_since(*created_at) > Duration::days(i64::from(*days)),
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::Days(30)
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeepAll => write!(f, "keep all snapshots"),
            Self::KeepLatest => write!(f, "keep only the latest snapshot"),
            Self::Days(1) => write!(f, "keep snapshots for 1 day"),
            Self::Days(days) => write!(f, "keep snapshots for {} days", days),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_from_days() {
        assert_eq!(RetentionPolicy::from_days(-1), RetentionPolicy::KeepAll);
        assert_eq!(RetentionPolicy::from_days(-30), RetentionPolicy::KeepAll);
        assert_eq!(RetentionPolicy::from_days(0), RetentionPolicy::KeepLatest);
        assert_eq!(RetentionPolicy::from_days(30), RetentionPolicy::Days(30));
        assert_eq!(RetentionPolicy::default(), RetentionPolicy::Days(30));
    }

    #[test]
    fn test_as_days_round_trip() {
        for days in [-1, 0, 1, 30] {
            assert_eq!(RetentionPolicy::from_days(days).as_days(), days);
        }
    }

    #[test]
    fn test_days_policy_is_strict() {
        let policy = RetentionPolicy::Days(30);
        let exactly = now() - Duration::days(30);
        let older = exactly - Duration::seconds(1);

        assert!(!policy.expires(&exactly, &now(), false));
        assert!(policy.expires(&older, &now(), false));
        assert!(!policy.expires(&(now() - Duration::days(5)), &now(), false));
    }

    #[test]
    fn test_keep_latest_ignores_age() {
        let policy = RetentionPolicy::KeepLatest;
        let ancient = now() - Duration::days(1000);
        let fresh = now();

        assert!(!policy.expires(&ancient, &now(), true));
        assert!(policy.expires(&fresh, &now(), false));
    }

    #[test]
    fn test_keep_all_never_expires() {
        let policy = RetentionPolicy::KeepAll;
        let ancient = now() - Duration::days(1000);
        assert!(!policy.expires(&ancient, &now(), false));
    }

    #[test]
    fn test_display() {
        assert_eq!(RetentionPolicy::Days(1).to_string(), "keep snapshots for 1 day");
        assert_eq!(RetentionPolicy::Days(30).to_string(), "keep snapshots for 30 days");
        assert_eq!(RetentionPolicy::KeepAll.to_string(), "keep all snapshots");
    }
}
