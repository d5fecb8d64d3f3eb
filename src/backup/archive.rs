//! Compressed archive creation for backup
//!
//! - gzip-compressed tar, compression level 5
//! - Deterministic file ordering
//! - Symlinks stored as symlinks
//! - Written to `<archive>.tmp`, renamed into place after fsync

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::Builder;

use super::errors::{BackupError, BackupResult};

const COMPRESSION_LEVEL: u32 = 5;

/// Path the archive is written to before it is complete
pub fn partial_path(output_path: &Path) -> PathBuf {
    let mut name = OsString::from(output_path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn tar_error(message: String, e: std::io::Error) -> BackupError {
    BackupError::io_error(message, e)
}

/// Create a gzip tar archive from `(name, directory)` trees
///
/// Each directory is stored under its name at the archive root. The
/// archive appears at `output_path` only once it is complete; on failure
/// nothing is left under either name.
pub fn create_site_archive(sources: &[(&str, &Path)], output_path: &Path) -> BackupResult<()> {
    let partial = partial_path(output_path);
    let result = write_archive(sources, &partial).and_then(|()| {
        fs::rename(&partial, output_path).map_err(|e| {
            BackupError::io_error(
                format!(
                    "Failed to move archive into place: {}",
                    output_path.display()
                ),
                e,
            )
        })
    });
    if result.is_err() {
        cleanup_partial_archive(&partial);
    }
    result
}

fn write_archive(sources: &[(&str, &Path)], path: &Path) -> BackupResult<()> {
    let file = File::create(path).map_err(|e| {
        BackupError::io_error(
            format!("Failed to create archive file: {}", path.display()),
            e,
        )
    })?;

    let encoder = GzEncoder::new(BufWriter::new(file), Compression::new(COMPRESSION_LEVEL));
    let mut builder = Builder::new(encoder);
    builder.follow_symlinks(false);

    for (name, dir) in sources {
        let mut entries = collect_entries(dir, name)?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        builder
            .append_dir(name, dir)
            .map_err(|e| tar_error(format!("Failed to add directory to archive: {}", name), e))?;

        for (archive_path, fs_path) in entries {
            builder
                .append_path_with_name(&fs_path, &archive_path)
                .map_err(|e| {
                    tar_error(format!("Failed to add entry to archive: {}", archive_path), e)
                })?;
        }
    }

    // Finish tar, then gzip, then the buffer
    let encoder = builder
        .into_inner()
        .map_err(|e| tar_error("Failed to finish archive".to_string(), e))?;
    let writer = encoder
        .finish()
        .map_err(|e| tar_error("Failed to finish compression".to_string(), e))?;
    let file = writer.into_inner().map_err(|e| {
        BackupError::io_error("Failed to flush archive buffer", e.into_error())
    })?;

    file.sync_all().map_err(|e| {
        BackupError::io_error(format!("Failed to fsync archive: {}", path.display()), e)
    })?;

    Ok(())
}

/// Collect all entries below a directory, with archive paths under `prefix`
fn collect_entries(dir: &Path, prefix: &str) -> BackupResult<Vec<(String, PathBuf)>> {
    let mut entries = Vec::new();
    collect_entries_recursive(dir, prefix, &mut entries)?;
    Ok(entries)
}

fn collect_entries_recursive(
    current_dir: &Path,
    prefix: &str,
    entries: &mut Vec<(String, PathBuf)>,
) -> BackupResult<()> {
    let mut dir_entries: Vec<_> = fs::read_dir(current_dir)
        .map_err(|e| BackupError::io_error_at_path(current_dir, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| BackupError::io_error_at_path(current_dir, e))?;

    dir_entries.sort_by_key(|e| e.file_name());

    for entry in dir_entries {
        let fs_path = entry.path();
        let archive_path = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        // file_type does not follow symlinks
        let is_dir = entry
            .file_type()
            .map_err(|e| BackupError::io_error_at_path(&fs_path, e))?
            .is_dir();

        entries.push((archive_path.clone(), fs_path.clone()));

        if is_dir {
            collect_entries_recursive(&fs_path, &archive_path, entries)?;
        }
    }

    Ok(())
}

/// Delete a partial archive if it exists
pub fn cleanup_partial_archive(archive_path: &Path) {
    if archive_path.exists() {
        let _ = fs::remove_file(archive_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tar::Archive;
    use tempfile::TempDir;

    fn create_site_tree(root: &Path) -> (PathBuf, PathBuf) {
        let www = root.join("www_src");
        fs::create_dir_all(www.join("assets")).unwrap();
        fs::write(www.join("index.php"), b"<?php echo 1;").unwrap();
        fs::write(www.join("assets").join("site.css"), b"body{}").unwrap();

        let db = root.join("db_src");
        fs::create_dir_all(&db).unwrap();
        fs::write(db.join("s1.sql"), b"-- dump").unwrap();
        (www, db)
    }

    fn entry_names(archive_path: &Path) -> Vec<String> {
        let file = File::open(archive_path).unwrap();
        let mut archive = Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_archive_layout() {
        let temp_dir = TempDir::new().unwrap();
        let (www, db) = create_site_tree(temp_dir.path());
        let output = temp_dir.path().join("s1.wd2.tar.gz");

        create_site_archive(&[("www", &www), ("database", &db)], &output).unwrap();

        let names: Vec<String> = entry_names(&output)
            .into_iter()
            .map(|n| n.trim_end_matches('/').to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "www",
                "www/assets",
                "www/assets/site.css",
                "www/index.php",
                "database",
                "database/s1.sql",
            ]
        );
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_archive_is_gzip() {
        let temp_dir = TempDir::new().unwrap();
        let (www, db) = create_site_tree(temp_dir.path());
        let output = temp_dir.path().join("s1.tar.gz");

        create_site_archive(&[("www", &www), ("database", &db)], &output).unwrap();

        let mut magic = [0u8; 2];
        File::open(&output).unwrap().read_exact(&mut magic).unwrap();
        assert_eq!(magic, [0x1f, 0x8b]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let temp_dir = TempDir::new().unwrap();
        let (www, db) = create_site_tree(temp_dir.path());
        std::os::unix::fs::symlink(&db, www.join("link")).unwrap();
        let output = temp_dir.path().join("s1.tar.gz");

        create_site_archive(&[("www", &www), ("database", &db)], &output).unwrap();

        let names = entry_names(&output);
        assert!(names.contains(&"www/link".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("www/link/")));
    }

    #[test]
    fn test_failed_archive_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");
        let output = temp_dir.path().join("s1.tar.gz");

        let result = create_site_archive(&[("www", &missing)], &output);

        assert!(result.is_err());
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/d/s1.wd2.tar.gz")),
            PathBuf::from("/d/s1.wd2.tar.gz.tmp")
        );
    }
}
