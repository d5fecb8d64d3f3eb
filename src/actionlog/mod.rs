//! Per-site action log
//!
//! One append-only text file per site, `<logdir>/<site>.txt`, one line per
//! saved or restored archive:
//!
//! ```text
//! 2025-03-01_10-00 saved: before plugin update
//! 2025.03.04(wd2) restored: rollback
//! ```
//!
//! Lines are never rewritten or removed.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::observability::{log_event_with_fields, Event};
use crate::policy::{ensure_dir, PolicyError};

/// Kind of recorded action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Saved,
    Restored,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Saved => "saved",
            Action::Restored => "restored",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEntry {
    /// Tag, or `<date>(<tag>)` for archives whose tag carries no date
    pub label: String,
    pub action: Action,
    pub comment: String,
}

impl fmt::Display for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.label, self.action, self.comment)
    }
}

/// Action logs under one directory
#[derive(Debug, Clone)]
pub struct ActionLog {
    dir: PathBuf,
    dir_mode: u32,
}

impl ActionLog {
    pub fn new(dir: impl Into<PathBuf>, dir_mode: u32) -> Self {
        Self {
            dir: dir.into(),
            dir_mode,
        }
    }

    /// Log file of `site`
    pub fn path(&self, site: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", site))
    }

    /// Append one entry; the directory is created if missing
    pub fn append(&self, site: &str, entry: &ActionEntry) -> io::Result<PathBuf> {
        ensure_dir(&self.dir, self.dir_mode).map_err(|e| match e {
            PolicyError::CreateDirectory { source, .. } => source,
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        })?;

        let path = self.path(site);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        // Comments are single-line
        let line = entry.to_string().replace(['\n', '\r'], " ");
        writeln!(file, "{}", line)?;
        file.sync_all()?;

        log_event_with_fields(
            Event::ActionLogged,
            &[("site", site), ("action", entry.action.as_str())],
        );
        Ok(path)
    }

    /// All entries of `site`, oldest first; empty if none were written
    pub fn read(&self, site: &str) -> io::Result<Vec<String>> {
        read_lines(&self.path(site))
    }
}

fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content.lines().map(str::to_string).collect()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}
