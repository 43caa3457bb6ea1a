use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::version::{LibraryItemStatus, Version};

/// Lifecycle metadata of one version snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    /// Position of the snapshot in the item's append-only log (1-based)
    pub seq: u64,

    pub version: Version,

    pub status: LibraryItemStatus,

    pub start_date: DateTime<Utc>,

    /// None while this snapshot is current
    pub end_date: Option<DateTime<Utc>>,

    pub author: String,

    pub change_description: Option<String>,
}

impl VersionMetadata {
    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }

    /// Whether the snapshot's [start, end) interval contains `instant`
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start_date <= instant && self.end_date.map_or(true, |end| instant < end)
    }
}

/// Current time truncated to the microsecond precision persisted by the store
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn meta(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> VersionMetadata {
        VersionMetadata {
            seq: 1,
            version: Version::INITIAL,
            status: LibraryItemStatus::Draft,
            start_date: start,
            end_date: end,
            author: "tester".to_string(),
            change_description: None,
        }
    }

    #[test]
    fn test_covers_is_half_open() {
        let start = now_micros();
        let end = start + Duration::seconds(10);
        let m = meta(start, Some(end));

        assert!(m.covers(start));
        assert!(m.covers(start + Duration::seconds(5)));
        assert!(!m.covers(end));
        assert!(!m.covers(start - Duration::microseconds(1)));
    }

    #[test]
    fn test_open_interval_covers_future() {
        let start = now_micros();
        let m = meta(start, None);
        assert!(m.is_current());
        assert!(m.covers(start + Duration::days(365)));
    }

    #[test]
    fn test_now_micros_has_no_sub_microsecond_part() {
        let now = now_micros();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }
}
