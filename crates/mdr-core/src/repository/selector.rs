use chrono::{DateTime, Utc};
use std::fmt;

use crate::errors::MdrError;
use crate::model::{LibraryItemStatus, Version, VersionSnapshot};

/// Which snapshot of an aggregate root a lookup resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    /// The current snapshot
    #[default]
    Latest,
    /// Newest snapshot carrying this version number
    Version(Version),
    /// Newest snapshot in this status
    Status(LibraryItemStatus),
    /// Snapshot whose [start, end) interval contains the instant
    AsOf(DateTime<Utc>),
}

impl VersionSelector {
    /// Build a selector from mutually exclusive optional parts
    ///
    /// # Errors
    ///
    /// `Validation` when more than one part is given.
    pub fn from_parts(
        version: Option<Version>,
        status: Option<LibraryItemStatus>,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Self, MdrError> {
        match (version, status, as_of) {
            (None, None, None) => Ok(VersionSelector::Latest),
            (Some(v), None, None) => Ok(VersionSelector::Version(v)),
            (None, Some(s), None) => Ok(VersionSelector::Status(s)),
            (None, None, Some(t)) => Ok(VersionSelector::AsOf(t)),
            _ => Err(MdrError::validation(
                "version, status and at_specified_date_time are mutually exclusive",
            )),
        }
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, VersionSelector::Latest)
    }

    /// Pick the matching snapshot from a log ordered by ascending seq
    pub fn select<'a, P>(&self, log: &'a [VersionSnapshot<P>]) -> Option<&'a VersionSnapshot<P>> {
        match self {
            VersionSelector::Latest => log.iter().rev().find(|s| s.meta.is_current()),
            VersionSelector::Version(v) => log.iter().rev().find(|s| s.meta.version == *v),
            VersionSelector::Status(st) => log.iter().rev().find(|s| s.meta.status == *st),
            VersionSelector::AsOf(t) => log.iter().find(|s| s.meta.covers(*t)),
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => write!(f, "latest"),
            VersionSelector::Version(v) => write!(f, "version {}", v),
            VersionSelector::Status(s) => write!(f, "status {}", s),
            VersionSelector::AsOf(t) => write!(f, "date {}", t.to_rfc3339()),
        }
    }
}
