//! Archive directory resolution and listing

use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};

use super::errors::{PolicyError, PolicyResult};
use super::tag::ArchiveTag;
use crate::settings::Settings;

/// Directory holding archives of `tag`'s class
///
/// Snapshot tags resolve to the alternate directory when one is given,
/// which must already exist, otherwise to the snapshot directory. Every
/// other tag resolves to the dump directory; the alternate is ignored.
pub fn resolve_archive_dir(
    settings: &Settings,
    tag: &ArchiveTag,
    alternate: Option<&Path>,
) -> PolicyResult<PathBuf> {
    if !tag.is_snapshot() {
        return Ok(settings.sitedump_dir.clone());
    }
    match alternate {
        Some(dir) if dir.is_dir() => Ok(dir.to_path_buf()),
        Some(dir) => Err(PolicyError::MissingDirectory(dir.to_path_buf())),
        None => Ok(settings.snapshot_dir.clone()),
    }
}

/// Create `path` and its parents with `mode` if missing
pub fn ensure_dir(path: &Path, mode: u32) -> PolicyResult<()> {
    if path.is_dir() {
        return Ok(());
    }
    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|source| PolicyError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })
}

/// Local modification date of a file
pub fn modified_date(path: &Path) -> std::io::Result<NaiveDate> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified).date_naive())
}

/// `YYYY.MM.DD(tag)`, naming an archive whose tag carries no date
pub fn dated_label(date: NaiveDate, tag: &ArchiveTag) -> String {
    format!("{}({})", date.format("%Y.%m.%d"), tag)
}

/// One archive found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub tag: ArchiveTag,
    pub file_name: String,
    pub modified: NaiveDate,
}

impl ArchiveEntry {
    /// `YYYY.MM.DD(tag)`
    pub fn label(&self) -> String {
        dated_label(self.modified, &self.tag)
    }
}

/// Archives of one site, grouped by directory
#[derive(Debug, Clone, Default)]
pub struct ArchiveListing {
    pub dump_dir: PathBuf,
    pub dumps: Vec<ArchiveEntry>,
    pub snapshot_dir: PathBuf,
    pub snapshots: Vec<ArchiveEntry>,
}

fn scan(dir: &Path, site: &str) -> PolicyResult<Vec<ArchiveEntry>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let read_error = |source| PolicyError::ReadDirectory {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(tag) = ArchiveTag::from_file_name(site, &file_name) else {
            continue;
        };
        let modified = modified_date(&entry.path()).map_err(read_error)?;
        entries.push(ArchiveEntry {
            tag,
            file_name,
            modified,
        });
    }
    entries.sort_by(|a, b| a.tag.cmp(&b.tag));
    Ok(entries)
}

/// Archives of `site` in the dump directory and the snapshot (or alternate)
/// directory, each sorted by tag. Missing directories list as empty.
pub fn list_archives(
    settings: &Settings,
    site: &str,
    alternate: Option<&Path>,
) -> PolicyResult<ArchiveListing> {
    let snapshot_dir = alternate
        .map(Path::to_path_buf)
        .unwrap_or_else(|| settings.snapshot_dir.clone());
    Ok(ArchiveListing {
        dumps: scan(&settings.sitedump_dir, site)?,
        dump_dir: settings.sitedump_dir.clone(),
        snapshots: scan(&snapshot_dir, site)?,
        snapshot_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::test_settings;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn tag(raw: &str) -> ArchiveTag {
        ArchiveTag::parse(raw).unwrap()
    }

    #[test]
    fn test_snapshot_tag_resolves_to_snapshot_dir() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());

        let dir = resolve_archive_dir(&settings, &tag("2025-03-01_10-00"), None).unwrap();
        assert_eq!(dir, settings.snapshot_dir);

        let dir = resolve_archive_dir(&settings, &tag("wd3"), None).unwrap();
        assert_eq!(dir, settings.sitedump_dir);
        let dir = resolve_archive_dir(&settings, &tag("m01"), None).unwrap();
        assert_eq!(dir, settings.sitedump_dir);
    }

    #[test]
    fn test_alternate_dir_must_exist() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let snap = tag("2025-03-01_10-00");

        let missing = root.path().join("elsewhere");
        assert!(matches!(
            resolve_archive_dir(&settings, &snap, Some(&missing)),
            Err(PolicyError::MissingDirectory(_))
        ));

        fs::create_dir(&missing).unwrap();
        assert_eq!(
            resolve_archive_dir(&settings, &snap, Some(&missing)).unwrap(),
            missing
        );

        // Dumps never go to the alternate directory
        assert_eq!(
            resolve_archive_dir(&settings, &tag("wd1"), Some(&missing)).unwrap(),
            settings.sitedump_dir
        );
    }

    #[test]
    fn test_ensure_dir_applies_mode() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("a").join("b");

        ensure_dir(&dir, 0o700).unwrap();
        assert!(dir.is_dir());
        let mode = fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & 0o077, 0);

        // Idempotent
        ensure_dir(&dir, 0o700).unwrap();
    }

    #[test]
    fn test_list_archives_filters_and_sorts() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        fs::create_dir_all(&settings.sitedump_dir).unwrap();
        fs::create_dir_all(&settings.snapshot_dir).unwrap();

        for name in ["s1.wd2.tar.gz", "s1.m03.tar.gz", "s10.wd2.tar.gz", "s1.wd0.tar.gz.tmp"] {
            fs::write(settings.sitedump_dir.join(name), b"x").unwrap();
        }
        fs::write(settings.snapshot_dir.join("s1.2025-03-01_10-00.tar.gz"), b"x").unwrap();

        let listing = list_archives(&settings, "s1", None).unwrap();
        let dumps: Vec<&str> = listing.dumps.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(dumps, vec!["m03", "wd2"]);
        assert_eq!(listing.snapshots.len(), 1);

        let label = listing.dumps[0].label();
        assert!(label.ends_with("(m03)"));
        assert_eq!(label.find('('), Some(10));
    }

    #[test]
    fn test_list_archives_missing_dirs_are_empty() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());

        let listing = list_archives(&settings, "s1", None).unwrap();
        assert!(listing.dumps.is_empty());
        assert!(listing.snapshots.is_empty());
    }
}
