//! Archive tags and their classes
//!
//! A tag names one archive slot of a site: `<site>.<tag>.tar.gz`.
//!
//! | class    | form                | written by          |
//! |----------|---------------------|---------------------|
//! | snapshot | `YYYY-MM-DD_hh-mm`  | manual backup       |
//! | daily    | `wd0`..`wd6`        | recurring dump      |
//! | longterm | `m01`..`m12`, `w1`..`w3` | promotion only |

use std::fmt;

use chrono::{Datelike, NaiveDateTime};

use super::errors::{PolicyError, PolicyResult};

/// Suffix of every archive file
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

const SNAPSHOT_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Archive class, derived from the tag's form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Snapshot,
    Daily,
    Longterm,
}

/// Identifier of one archive slot of a site
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveTag(pub(super) String);

impl ArchiveTag {
    /// Validate an operator-supplied tag
    pub fn parse(raw: &str) -> PolicyResult<Self> {
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(PolicyError::InvalidTag(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Any tag containing `_` or `-` is a snapshot
    pub fn is_snapshot(&self) -> bool {
        self.0.contains('_') || self.0.contains('-')
    }

    pub fn kind(&self) -> TagKind {
        if self.is_snapshot() {
            TagKind::Snapshot
        } else if self.0.starts_with("wd") {
            TagKind::Daily
        } else {
            TagKind::Longterm
        }
    }

    /// `<site>.<tag>.tar.gz`
    pub fn archive_file_name(&self, site: &str) -> String {
        format!("{}.{}{}", site, self.0, ARCHIVE_SUFFIX)
    }

    /// Recover the tag from an archive file name of `site`
    pub fn from_file_name(site: &str, file_name: &str) -> Option<Self> {
        let tag = file_name
            .strip_prefix(site)?
            .strip_prefix('.')?
            .strip_suffix(ARCHIVE_SUFFIX)?;
        Self::parse(tag).ok()
    }
}

impl fmt::Display for ArchiveTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag for a new archive: weekday slot for recurring dumps, timestamp otherwise
pub fn tag_for(recurring: bool, now: NaiveDateTime) -> ArchiveTag {
    if recurring {
        ArchiveTag(format!("wd{}", now.weekday().num_days_from_sunday()))
    } else {
        ArchiveTag(now.format(SNAPSHOT_FORMAT).to_string())
    }
}
