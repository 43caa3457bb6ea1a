use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::MdrError;

/// Version number `<major>.<minor>`
///
/// Ordered lexicographically on (major, minor). Drafts live on minor
/// increments; each approval moves to the next major with minor 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Version {
    /// Version assigned by create
    pub const INITIAL: Version = Version { major: 0, minor: 1 };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Next Draft version after an edit
    pub fn next_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor + 1,
        }
    }

    /// Version assigned by approve: `(major + 1).0`
    pub fn next_major(self) -> Self {
        Self {
            major: self.major + 1,
            minor: 0,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = MdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MdrError::validation(format!("invalid version '{}'", s));
        let (major, minor) = s.trim().split_once('.').ok_or_else(invalid)?;
        let major = major.parse::<u32>().map_err(|_| invalid())?;
        let minor = minor.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self { major, minor })
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle status of a version snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryItemStatus {
    Draft,
    Final,
    Retired,
}

impl LibraryItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryItemStatus::Draft => "Draft",
            LibraryItemStatus::Final => "Final",
            LibraryItemStatus::Retired => "Retired",
        }
    }
}

impl fmt::Display for LibraryItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryItemStatus {
    type Err = MdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft" => Ok(LibraryItemStatus::Draft),
            "final" => Ok(LibraryItemStatus::Final),
            "retired" => Ok(LibraryItemStatus::Retired),
            _ => Err(MdrError::validation(format!("invalid status '{}'", s))),
        }
    }
}

/// Lifecycle operations a consumer may offer on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectAction {
    Edit,
    Approve,
    NewVersion,
    Retire,
    Reactivate,
    Delete,
}

impl ObjectAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAction::Edit => "edit",
            ObjectAction::Approve => "approve",
            ObjectAction::NewVersion => "new_version",
            ObjectAction::Retire => "retire",
            ObjectAction::Reactivate => "reactivate",
            ObjectAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ObjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
