//! Archive layout validation for restore
//!
//! An extracted archive must contain:
//! - www/
//! - database/ with exactly one `*.sql`, when the site has a database
//!
//! Any deviation aborts the restore before anything live is touched.
//! There is no guessing between several dump files.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::errors::{RestoreError, RestoreResult};
use crate::registry::Site;

/// Top-level shape of an archive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveLayout {
    pub www: bool,
    pub database: bool,
    /// `*.sql` files directly inside `database/`
    pub sql_files: Vec<String>,
}

fn is_sql(name: &str) -> bool {
    name.ends_with(".sql")
}

impl ArchiveLayout {
    /// Inspect an extracted tree
    pub fn from_dir(root: &Path) -> RestoreResult<Self> {
        let database_dir = root.join("database");
        let mut sql_files = Vec::new();

        if database_dir.is_dir() {
            let entries = fs::read_dir(&database_dir)
                .map_err(|e| RestoreError::io_error_at_path(&database_dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| RestoreError::io_error_at_path(&database_dir, e))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if is_sql(&name) && entry.path().is_file() {
                    sql_files.push(name);
                }
            }
        }
        sql_files.sort();

        Ok(Self {
            www: root.join("www").is_dir(),
            database: database_dir.is_dir(),
            sql_files,
        })
    }

    /// Derive the layout from archive member paths
    pub fn from_members(members: &[(PathBuf, bool)]) -> Self {
        let mut layout = Self::default();
        for (path, is_dir) in members {
            let parts: Vec<String> = path
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            match parts.first().map(String::as_str) {
                Some("www") => layout.www = true,
                Some("database") => {
                    layout.database = true;
                    if parts.len() == 2 && !is_dir && is_sql(&parts[1]) {
                        layout.sql_files.push(parts[1].clone());
                    }
                }
                _ => {}
            }
        }
        layout.sql_files.sort();
        layout
    }

    /// Check the layout against `site`; returns the dump file name, if any
    pub fn validate(&self, site: &Site) -> RestoreResult<Option<String>> {
        if !self.www {
            return Err(RestoreError::invalid_archive(
                "Missing www/ directory in archive",
            ));
        }
        if !site.has_database() {
            return Ok(None);
        }
        if !self.database {
            return Err(RestoreError::invalid_archive(
                "Missing database/ directory in archive",
            ));
        }
        match self.sql_files.as_slice() {
            [single] => Ok(Some(single.clone())),
            [] => Err(RestoreError::invalid_archive(
                "No *.sql file in database/ of archive",
            )),
            several => Err(RestoreError::invalid_archive(format!(
                "Expected one *.sql file in database/ of archive, found {}: {}",
                several.len(),
                several.join(", ")
            ))),
        }
    }
}
