//! Archive extraction for restore
//!
//! - Extract the archive into a fresh work directory
//! - Handle cleanup on failure
//! - List archive members without extracting, for simulated runs

use std::fs::{self, DirBuilder, File};
use std::io::BufReader;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use super::errors::{RestoreError, RestoreResult};
use crate::backup::WORK_DIR_NAME;

const WORK_DIR_MODE: u32 = 0o755;

/// Create an empty work directory next to the archive
pub fn create_work_dir(archive_dir: &Path) -> RestoreResult<PathBuf> {
    let work_dir = archive_dir.join(WORK_DIR_NAME);

    if work_dir.is_file() {
        return Err(RestoreError::precondition(format!(
            "Work directory path is a file: {}",
            work_dir.display()
        )));
    }
    // Clean up a work directory left by an interrupted run
    if work_dir.exists() {
        fs::remove_dir_all(&work_dir).map_err(|e| {
            RestoreError::io_error(
                format!(
                    "Failed to clean up existing work directory: {}",
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
            RestoreError::io_error(
                format!("Failed to create work directory: {}", work_dir.display()),
                e,
            )
        })?;

    Ok(work_dir)
}

fn open_archive(archive_path: &Path) -> RestoreResult<Archive<GzDecoder<BufReader<File>>>> {
    let file = File::open(archive_path).map_err(|e| {
        RestoreError::io_error(
            format!("Failed to open archive: {}", archive_path.display()),
            e,
        )
    })?;
    Ok(Archive::new(GzDecoder::new(BufReader::new(file))))
}

/// Extract a gzip tar archive into `dest_dir`, keeping file modes
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> RestoreResult<()> {
    let mut archive = open_archive(archive_path)?;
    archive.set_preserve_permissions(true);

    archive.unpack(dest_dir).map_err(|e| {
        RestoreError::invalid_archive_with_source(
            format!("Failed to extract archive: {}", archive_path.display()),
            e,
        )
    })?;

    Ok(())
}

/// Paths of all archive members, without extracting
pub fn list_members(archive_path: &Path) -> RestoreResult<Vec<(PathBuf, bool)>> {
    let mut archive = open_archive(archive_path)?;
    let read_error = |e| {
        RestoreError::invalid_archive_with_source(
            format!("Failed to read archive: {}", archive_path.display()),
            e,
        )
    };

    let mut members = Vec::new();
    for entry in archive.entries().map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let is_dir = entry.header().entry_type().is_dir();
        let path = entry.path().map_err(read_error)?.into_owned();
        members.push((path, is_dir));
    }
    Ok(members)
}

/// Remove the work directory
pub fn cleanup_work_dir(work_dir: &Path) {
    if work_dir.is_dir() {
        let _ = fs::remove_dir_all(work_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::os::unix::fs::PermissionsExt;
    use tar::{Builder, Header};
    use tempfile::TempDir;

    fn create_test_archive(archive_path: &Path) {
        let file = File::create(archive_path).unwrap();
        let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

        let mut header = Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o640);
        header.set_cksum();
        builder
            .append_data(&mut header, "www/index.html", &b"hello"[..])
            .unwrap();

        let mut header = Header::new_gnu();
        header.set_size(7);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "database/s1.sql", &b"-- dump"[..])
            .unwrap();

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_extract_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("s1.wd2.tar.gz");
        create_test_archive(&archive);
        let work_dir = create_work_dir(temp.path()).unwrap();

        extract_archive(&archive, &work_dir).unwrap();

        let index = work_dir.join("www").join("index.html");
        assert_eq!(fs::read(&index).unwrap(), b"hello");
        let mode = fs::metadata(&index).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        assert!(work_dir.join("database").join("s1.sql").is_file());
    }

    #[test]
    fn test_list_members() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("s1.wd2.tar.gz");
        create_test_archive(&archive);

        let members = list_members(&archive).unwrap();
        assert_eq!(
            members,
            vec![
                (PathBuf::from("www/index.html"), false),
                (PathBuf::from("database/s1.sql"), false),
            ]
        );
    }

    #[test]
    fn test_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.tar.gz");
        fs::write(&archive, b"not an archive").unwrap();
        let work_dir = create_work_dir(temp.path()).unwrap();

        let err = extract_archive(&archive, &work_dir).unwrap_err();
        assert_eq!(
            err.code(),
            super::super::errors::RestoreErrorCode::SitekeepRestoreInvalidArchive
        );
    }

    #[test]
    fn test_work_dir_is_recreated_empty() {
        let temp = TempDir::new().unwrap();
        let work_dir = create_work_dir(temp.path()).unwrap();
        fs::write(work_dir.join("leftover"), b"x").unwrap();

        let work_dir = create_work_dir(temp.path()).unwrap();
        assert_eq!(fs::read_dir(&work_dir).unwrap().count(), 0);

        cleanup_work_dir(&work_dir);
        assert!(!work_dir.exists());
    }
}
