//! Work directory handling for backup
//!
//! The database dump is staged in a fixed-name work directory under the
//! archive directory, packed as `database/`, then removed. Backup never
//! modifies the site's web directory.

use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use super::errors::{BackupError, BackupResult};

/// Name of the throwaway work directory inside an archive directory
pub const WORK_DIR_NAME: &str = "temp932524687";

const WORK_DIR_MODE: u32 = 0o755;

/// Create an empty work directory under `archive_dir`
///
/// A leftover directory of the same name is removed first.
pub fn create_work_dir(archive_dir: &Path) -> BackupResult<PathBuf> {
    let work_dir = archive_dir.join(WORK_DIR_NAME);

    if work_dir.is_file() {
        return Err(BackupError::precondition(format!(
            "Work directory path is a file: {}",
            work_dir.display()
        )));
    }
    if work_dir.exists() {
        fs::remove_dir_all(&work_dir).map_err(|e| {
            BackupError::io_error(
                format!(
                    "Failed to clean up existing work dir: {}",
                    work_dir.display()
                ),
                e,
            )
        })?;
    }

    DirBuilder::new()
        .mode(WORK_DIR_MODE)
        .create(&work_dir)
        .map_err(|e| {
            BackupError::io_error(
                format!("Failed to create work dir: {}", work_dir.display()),
                e,
            )
        })?;

    Ok(work_dir)
}

/// Remove the work directory
pub fn cleanup_work_dir(work_dir: &Path) {
    if work_dir.is_dir() {
        let _ = fs::remove_dir_all(work_dir);
    }
}

/// Fail unless the dump command left its output file behind
pub fn require_dump_output(sql_path: &Path) -> BackupResult<()> {
    if sql_path.is_file() {
        Ok(())
    } else {
        Err(BackupError::precondition(format!(
            "Database dump missing after dump command: {}",
            sql_path.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_work_dir_clears_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let stale = temp_dir.path().join(WORK_DIR_NAME);
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("old.sql"), b"stale").unwrap();

        let work_dir = create_work_dir(temp_dir.path()).unwrap();

        assert_eq!(work_dir, stale);
        assert!(work_dir.is_dir());
        assert_eq!(fs::read_dir(&work_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_work_dir_path_occupied_by_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(WORK_DIR_NAME), b"file").unwrap();

        let err = create_work_dir(temp_dir.path()).unwrap_err();
        assert_eq!(
            err.code(),
            super::super::errors::BackupErrorCode::SitekeepBackupPrecondition
        );
    }

    #[test]
    fn test_cleanup_work_dir() {
        let temp_dir = TempDir::new().unwrap();
        let work_dir = create_work_dir(temp_dir.path()).unwrap();
        fs::write(work_dir.join("s1.sql"), b"dump").unwrap();

        cleanup_work_dir(&work_dir);
        assert!(!work_dir.exists());

        // Should not panic
        cleanup_work_dir(&work_dir);
    }

    #[test]
    fn test_require_dump_output() {
        let temp_dir = TempDir::new().unwrap();
        let sql = temp_dir.path().join("s1.sql");

        assert!(require_dump_output(&sql).is_err());
        fs::write(&sql, b"").unwrap();
        assert!(require_dump_output(&sql).is_ok());
    }
}
