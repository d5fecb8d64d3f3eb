//! Backup Engine
//!
//! Produces one compressed archive of one site: its web directory and a
//! dump of its database.
//!
//! # Archive Format
//!
//! ```text
//! <site>.<tag>.tar.gz
//! ├── www/          verbatim copy of the web directory
//! └── database/
//!     └── <site>.sql
//! ```
//!
//! # Algorithm
//!
//! 1. Compute the tag; resolve and create the archive directory
//! 2. For recurring dumps, decide promotion of the slot about to be reused
//! 3. Create an empty work directory
//! 4. Dump the database into it; the dump file must exist afterwards
//! 5. Rename the promoted archive to its longterm slot
//! 6. Pack `www/` and `database/` into `<archive>.tmp`, rename into place
//! 7. Remove the work directory
//! 8. Tighten archive permissions if configured
//! 9. Log snapshots to the site's action log
//! 10. Upload recurring dumps (and the promoted archive) if configured
//!
//! Every step is fail-stop. The engine takes no lock: the caller must not
//! run two backups of the same site concurrently.

mod archive;
mod batch;
mod errors;
mod packer;
mod upload;

pub use batch::{save_all, BatchReport};
pub use errors::{BackupError, BackupErrorCode, BackupResult, Severity};
pub use packer::WORK_DIR_NAME;

use std::fs;
use std::path::{Path, PathBuf};

use crate::actionlog::{Action, ActionEntry, ActionLog};
use crate::database::DbClient;
use crate::observability::{log_event_with_fields, Event, ObservationScope, Timer};
use crate::policy::{
    ensure_dir, promote, resolve_archive_dir, tag_for, ArchiveTag, Clock, PolicyError,
};
use crate::registry::Site;
use crate::runner::{CommandRunner, ShellCommand};
use crate::settings::Settings;

use archive::create_site_archive;
use packer::{cleanup_work_dir, create_work_dir, require_dump_output};
use upload::upload_archives;

/// One backup to perform
#[derive(Debug, Clone)]
pub struct BackupRequest<'a> {
    pub site: &'a Site,
    /// Recurring dump (weekday slot, unlogged) rather than a snapshot
    pub recurring: bool,
    /// Snapshot target overriding the snapshot directory; must exist
    pub alternate_dir: Option<&'a Path>,
    /// Operator comment for the action log
    pub comment: &'a str,
}

impl<'a> BackupRequest<'a> {
    /// Manual snapshot
    pub fn snapshot(site: &'a Site, comment: &'a str) -> Self {
        Self {
            site,
            recurring: false,
            alternate_dir: None,
            comment,
        }
    }

    /// Recurring dump
    pub fn dump(site: &'a Site) -> Self {
        Self {
            site,
            recurring: true,
            alternate_dir: None,
            comment: "",
        }
    }

    pub fn with_alternate_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.alternate_dir = dir;
        self
    }
}

/// What a finished backup produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub tag: ArchiveTag,
    pub archive_path: PathBuf,
    /// Longterm archive the previous daily archive was renamed to
    pub promoted: Option<PathBuf>,
    pub uploaded: bool,
    /// Nothing was written: the runner only simulated
    pub simulated: bool,
}

/// Runs backups against one set of settings
pub struct BackupEngine<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    clock: &'a dyn Clock,
}

impl<'a> BackupEngine<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            settings,
            runner,
            clock,
        }
    }

    /// Back up one site
    pub fn backup(&self, request: &BackupRequest<'_>) -> BackupResult<BackupOutcome> {
        let kind = if request.recurring { "dump" } else { "snapshot" };
        let scope =
            ObservationScope::with_fields("BACKUP", &[("site", &request.site.name), ("kind", kind)]);

        match self.run(request) {
            Ok(outcome) => {
                scope.complete_with_fields(&[
                    ("archive", &outcome.archive_path.display().to_string()),
                    ("simulated", if outcome.simulated { "true" } else { "false" }),
                ]);
                Ok(outcome)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn run(&self, request: &BackupRequest<'_>) -> BackupResult<BackupOutcome> {
        let site = request.site;
        let simulate = self.runner.simulating();
        let timer = Timer::new();
        let now = self.clock.now();

        // Step 1: tag and directory
        let tag = tag_for(request.recurring, now);
        let archive_dir = resolve_archive_dir(self.settings, &tag, request.alternate_dir)?;
        if !simulate {
            ensure_dir(&archive_dir, self.settings.dir_mode)?;
        }
        let archive_path = archive_dir.join(tag.archive_file_name(&site.name));
        log_event_with_fields(
            Event::TagSelected,
            &[("site", &site.name), ("tag", tag.as_str())],
        );

        let www_dir = self.settings.www_dir(&site.www_subdir);
        if !www_dir.is_dir() {
            return Err(BackupError::precondition(format!(
                "Web directory missing: {}",
                www_dir.display()
            )));
        }

        // Step 2: promotion decision, before anything is written
        let promoted = if request.recurring {
            promote(&archive_path, now.date())
                .map(|longterm| archive_dir.join(longterm.archive_file_name(&site.name)))
        } else {
            None
        };

        // Steps 3-7
        if simulate {
            self.dump_database(site, &archive_dir.join(WORK_DIR_NAME), true)?;
            log_event_with_fields(
                Event::StepSimulated,
                &[("step", "write archive"), ("archive", &archive_path.display().to_string())],
            );
        } else {
            let work_dir = create_work_dir(&archive_dir)?;
            let packed = self
                .dump_database(site, &work_dir, false)
                .and_then(|()| {
                    log_event_with_fields(
                        Event::DatabaseDumped,
                        &[("site", &site.name), ("elapsed_ms", &timer.lap_ms())],
                    );
                    if let Some(target) = &promoted {
                        self.promote_archive(&archive_path, target)?;
                    }
                    create_site_archive(&[("www", &www_dir), ("database", &work_dir)], &archive_path)
                });
            cleanup_work_dir(&work_dir);
            packed?;
            log_event_with_fields(
                Event::ArchiveWritten,
                &[
                    ("archive", &archive_path.display().to_string()),
                    ("elapsed_ms", &timer.lap_ms()),
                ],
            );
        }

        // Step 8
        if self.settings.ban_others {
            self.runner.run(
                &ShellCommand::new("chmod")
                    .arg("o-rwx")
                    .arg(archive_path.display().to_string()),
            )?;
        }

        // Step 9: snapshots only
        if !request.recurring {
            self.log_action(site, &tag, request.comment, simulate)?;
        }

        // Step 10: recurring dumps only
        let mut uploaded = false;
        if let (true, Some(remote)) = (request.recurring, &self.settings.remote_location) {
            let mut archives = vec![archive_path.as_path()];
            if let Some(target) = &promoted {
                archives.push(target.as_path());
            }
            upload_archives(self.runner, &self.settings.scp, remote, &archives)?;
            uploaded = true;
        }

        Ok(BackupOutcome {
            tag,
            archive_path,
            promoted,
            uploaded,
            simulated: simulate,
        })
    }

    fn dump_database(&self, site: &Site, work_dir: &Path, simulate: bool) -> BackupResult<()> {
        if !site.has_database() {
            return Ok(());
        }
        let sql_path = work_dir.join(site.sql_file_name());
        let client = DbClient::new(self.settings, self.runner);
        let prepared = client.prepare_dump(site, &sql_path)?;
        client.execute(prepared)?;
        if !simulate {
            // Exit status and output file are checked independently
            require_dump_output(&sql_path)?;
        }
        Ok(())
    }

    fn promote_archive(&self, from: &Path, to: &Path) -> BackupResult<()> {
        fs::rename(from, to).map_err(|source| PolicyError::Rename {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;
        log_event_with_fields(
            Event::ArchivePromoted,
            &[
                ("from", &from.display().to_string()),
                ("to", &to.display().to_string()),
            ],
        );
        Ok(())
    }

    fn log_action(
        &self,
        site: &Site,
        tag: &ArchiveTag,
        comment: &str,
        simulate: bool,
    ) -> BackupResult<()> {
        if simulate {
            log_event_with_fields(Event::StepSimulated, &[("step", "action log")]);
            return Ok(());
        }
        let log = ActionLog::new(&self.settings.log_dir, self.settings.dir_mode);
        let entry = ActionEntry {
            label: tag.to_string(),
            action: Action::Saved,
            comment: comment.to_string(),
        };
        log.append(&site.name, &entry)
            .map_err(|e| BackupError::io_error_at_path(&log.path(&site.name), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::FixedClock;
    use crate::registry::{test_site, NONE};
    use crate::runner::RecordingRunner;
    use crate::settings::{test_settings, test_settings_toml};
    use chrono::{NaiveDate, NaiveDateTime};
    use flate2::read::GzDecoder;
    use std::fs::File;
    use tar::Archive;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(10, 0, 0))
            .unwrap()
    }

    fn setup(root: &Path, site: &Site) {
        let www = root.join("www").join(&site.www_subdir);
        fs::create_dir_all(&www).unwrap();
        fs::write(www.join("index.html"), b"hello").unwrap();
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_snapshot_is_logged() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        setup(root.path(), &site);
        let runner = RecordingRunner::new();
        let clock = FixedClock(at(2025, 3, 1));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let outcome = engine
            .backup(&BackupRequest::snapshot(&site, "before update"))
            .unwrap();

        assert_eq!(outcome.tag.as_str(), "2025-03-01_10-00");
        assert_eq!(
            outcome.archive_path,
            settings.snapshot_dir.join("s1.2025-03-01_10-00.tar.gz")
        );
        assert!(outcome.archive_path.is_file());
        assert!(!outcome.uploaded);

        let names = entry_names(&outcome.archive_path);
        assert!(names.contains(&"www/index.html".to_string()));
        assert!(names.contains(&"database/s1.sql".to_string()));
        assert!(!settings.snapshot_dir.join(WORK_DIR_NAME).exists());

        let log = fs::read_to_string(settings.log_dir.join("s1.txt")).unwrap();
        assert_eq!(log, "2025-03-01_10-00 saved: before update\n");
    }

    #[test]
    fn test_recurring_dump_is_not_logged() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        setup(root.path(), &site);
        let runner = RecordingRunner::new();
        // Tuesday
        let clock = FixedClock(at(2025, 3, 4));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let outcome = engine.backup(&BackupRequest::dump(&site)).unwrap();

        assert_eq!(outcome.archive_path, settings.sitedump_dir.join("s1.wd2.tar.gz"));
        assert_eq!(outcome.promoted, None);
        assert!(!settings.log_dir.join("s1.txt").exists());
    }

    #[test]
    fn test_missing_dump_output_fails() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        setup(root.path(), &site);
        let runner = RecordingRunner::new().without_output();
        let clock = FixedClock(at(2025, 3, 4));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let err = engine.backup(&BackupRequest::dump(&site)).unwrap_err();

        assert_eq!(err.code(), BackupErrorCode::SitekeepBackupPrecondition);
        assert!(!settings.sitedump_dir.join("s1.wd2.tar.gz").exists());
        assert!(!settings.sitedump_dir.join(WORK_DIR_NAME).exists());
    }

    #[test]
    fn test_failed_dump_keeps_daily_slot() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        setup(root.path(), &site);
        fs::create_dir_all(&settings.sitedump_dir).unwrap();
        let existing = settings.sitedump_dir.join("s1.wd6.tar.gz");
        fs::write(&existing, b"previous").unwrap();
        let runner = RecordingRunner::new().failing("mysqldump");
        // Saturday the 8th
        let clock = FixedClock(at(2025, 3, 8));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let err = engine.backup(&BackupRequest::dump(&site)).unwrap_err();

        assert_eq!(err.code(), BackupErrorCode::SitekeepBackupCommand);
        assert_eq!(fs::read(&existing).unwrap(), b"previous");
        assert!(!settings.sitedump_dir.join("s1.m03.tar.gz").exists());
    }

    #[test]
    fn test_site_without_database() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let mut site = test_site("static");
        site.db_name = NONE.to_string();
        site.db_user = NONE.to_string();
        setup(root.path(), &site);
        let runner = RecordingRunner::new();
        let clock = FixedClock(at(2025, 3, 4));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let outcome = engine.backup(&BackupRequest::dump(&site)).unwrap();

        assert!(runner.commands().is_empty());
        let names = entry_names(&outcome.archive_path);
        assert!(names.contains(&"database".to_string()));
        assert!(!names.iter().any(|n| n.ends_with(".sql")));
    }

    #[test]
    fn test_missing_web_dir() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        let runner = RecordingRunner::new();
        let clock = FixedClock(at(2025, 3, 4));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let err = engine.backup(&BackupRequest::dump(&site)).unwrap_err();
        assert_eq!(err.code(), BackupErrorCode::SitekeepBackupPrecondition);
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_permissions_and_upload() {
        let root = TempDir::new().unwrap();
        let toml = test_settings_toml(root.path())
            .replace("wwwbanothers = \"false\"", "wwwbanothers = \"true\"")
            .replace("remotelocation = \"none\"", "remotelocation = \"u@host:/srv\"");
        let settings = Settings::from_toml_str(&toml).unwrap();
        let site = test_site("s1");
        setup(root.path(), &site);
        fs::create_dir_all(&settings.sitedump_dir).unwrap();
        fs::write(settings.sitedump_dir.join("s1.wd3.tar.gz"), b"previous").unwrap();
        let runner = RecordingRunner::new();
        // Wednesday the 15th
        let clock = FixedClock(at(2025, 1, 15));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let outcome = engine.backup(&BackupRequest::dump(&site)).unwrap();

        let w1 = settings.sitedump_dir.join("s1.w1.tar.gz");
        assert_eq!(outcome.promoted.as_ref(), Some(&w1));
        assert!(outcome.uploaded);

        let chmod = runner.issued("chmod");
        assert_eq!(chmod.len(), 1);
        assert_eq!(chmod[0].args[0], "o-rwx");

        let scp = runner.issued("scp");
        assert_eq!(scp.len(), 2);
        assert_eq!(scp[0].args[2], "u@host:/srv/s1.wd3.tar.gz");
        assert_eq!(scp[1].args[2], "u@host:/srv/s1.w1.tar.gz");
    }

    #[test]
    fn test_snapshot_is_not_uploaded() {
        let root = TempDir::new().unwrap();
        let toml = test_settings_toml(root.path())
            .replace("remotelocation = \"none\"", "remotelocation = \"u@host:/srv\"");
        let settings = Settings::from_toml_str(&toml).unwrap();
        let site = test_site("s1");
        setup(root.path(), &site);
        let runner = RecordingRunner::new();
        let clock = FixedClock(at(2025, 1, 15));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let outcome = engine.backup(&BackupRequest::snapshot(&site, "")).unwrap();
        assert!(!outcome.uploaded);
        assert!(runner.issued("scp").is_empty());
    }

    #[test]
    fn test_alternate_dir_for_snapshot() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        setup(root.path(), &site);
        let alt = root.path().join("usb");
        let runner = RecordingRunner::new();
        let clock = FixedClock(at(2025, 1, 15));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let request = BackupRequest::snapshot(&site, "").with_alternate_dir(Some(&alt));
        assert!(engine.backup(&request).is_err());

        fs::create_dir_all(&alt).unwrap();
        let outcome = engine.backup(&request).unwrap();
        assert!(outcome.archive_path.starts_with(&alt));
    }

    #[test]
    fn test_simulated_backup_writes_nothing() {
        let root = TempDir::new().unwrap();
        let settings = test_settings(root.path());
        let site = test_site("s1");
        setup(root.path(), &site);
        let runner = RecordingRunner::new().simulated();
        let clock = FixedClock(at(2025, 3, 4));
        let engine = BackupEngine::new(&settings, &runner, &clock);

        let outcome = engine.backup(&BackupRequest::snapshot(&site, "x")).unwrap();

        assert!(outcome.simulated);
        assert!(!settings.snapshot_dir.exists());
        assert!(!settings.log_dir.exists());
        assert_eq!(runner.issued("mysqldump").len(), 1);
    }
}
