//! Restore Engine
//!
//! Replaces a site's live database and web directory with the content of
//! one archive.
//!
//! # Stages
//!
//! ```text
//! Located → Extracted → Validated → DatabaseConfirmed → DatabaseRestored
//!         → FilesConfirmed → FilesSwapped → Logged
//! ```
//!
//! 1. The archive `<dir>/<site>.<tag>.tar.gz` must exist
//! 2. Extract it into a fresh work directory next to the archive
//! 3. Require `www/`, and `database/` with exactly one `*.sql`
//! 4. Ensure the database and its user exist
//! 5. Confirm the literal restore command, then run it
//! 6. Confirm the web directory replacement and fixups, then swap
//! 7. Remove the work directory
//! 8. Append to the site's action log
//!
//! Nothing live is touched before the first confirmation. A declined
//! confirmation ends the run with `RestoreOutcome::Declined`. A failure
//! after the database was restored, or once the live web directory is
//! being replaced, is a FATAL partial failure; nothing is rolled back and
//! the extracted tree is kept for manual recovery.

mod errors;
mod extractor;
mod restorer;
mod validator;

pub use errors::{RestoreError, RestoreErrorCode, RestoreResult, Severity};
pub use validator::ArchiveLayout;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::actionlog::{Action, ActionEntry, ActionLog};
use crate::backup::WORK_DIR_NAME;
use crate::confirm::{self, Confirmation, Confirmer};
use crate::database::DbClient;
use crate::observability::{log_event_with_fields, Event, ObservationScope, Timer};
use crate::policy::{dated_label, modified_date, resolve_archive_dir, ArchiveTag};
use crate::registry::Site;
use crate::runner::{CommandRunner, ShellCommand};
use crate::settings::Settings;

use extractor::{cleanup_work_dir, create_work_dir, extract_archive, list_members};
use restorer::replace_web_dir;

/// Restore progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Located,
    Extracted,
    Validated,
    DatabaseConfirmed,
    DatabaseRestored,
    FilesConfirmed,
    FilesSwapped,
    Logged,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Located => "located",
            Stage::Extracted => "extracted",
            Stage::Validated => "validated",
            Stage::DatabaseConfirmed => "database confirmed",
            Stage::DatabaseRestored => "database restored",
            Stage::FilesConfirmed => "files confirmed",
            Stage::FilesSwapped => "files swapped",
            Stage::Logged => "logged",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One restore to perform
#[derive(Debug, Clone)]
pub struct RestoreRequest<'a> {
    pub site: &'a Site,
    pub tag: ArchiveTag,
    /// Directory holding the archive
    pub archive_dir: PathBuf,
    /// Operator comment for the action log
    pub comment: &'a str,
}

impl<'a> RestoreRequest<'a> {
    pub fn new(site: &'a Site, tag: ArchiveTag, archive_dir: PathBuf) -> Self {
        Self {
            site,
            tag,
            archive_dir,
            comment: "",
        }
    }

    /// Request for `tag`, with the archive directory derived from the tag
    pub fn resolve(
        settings: &Settings,
        site: &'a Site,
        tag: ArchiveTag,
        alternate_dir: Option<&Path>,
    ) -> RestoreResult<Self> {
        let archive_dir = resolve_archive_dir(settings, &tag, alternate_dir)?;
        Ok(Self::new(site, tag, archive_dir))
    }

    pub fn with_comment(mut self, comment: &'a str) -> Self {
        self.comment = comment;
        self
    }

    pub fn archive_path(&self) -> PathBuf {
        self.archive_dir
            .join(self.tag.archive_file_name(&self.site.name))
    }
}

/// What a completed restore did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub archive_path: PathBuf,
    pub live_dir: PathBuf,
    pub database_restored: bool,
    /// Label written to the action log
    pub label: String,
    /// Nothing was changed: the runner only simulated
    pub simulated: bool,
}

/// Result of a restore that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Completed(RestoreReport),
    /// The operator refused the confirmation gate `stage`
    Declined {
        stage: Stage,
        database_restored: bool,
    },
}

/// Runs restores against one set of settings
pub struct RestoreEngine<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    confirmer: &'a dyn Confirmer,
}

impl<'a> RestoreEngine<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        confirmer: &'a dyn Confirmer,
    ) -> Self {
        Self {
            settings,
            runner,
            confirmer,
        }
    }

    /// Restore one site from one archive
    pub fn restore(&self, request: &RestoreRequest<'_>) -> RestoreResult<RestoreOutcome> {
        let scope = ObservationScope::with_fields(
            "RESTORE",
            &[("site", &request.site.name), ("tag", request.tag.as_str())],
        );

        match self.run(request) {
            Ok(RestoreOutcome::Completed(report)) => {
                scope.complete_with_fields(&[
                    ("archive", &report.archive_path.display().to_string()),
                    ("simulated", if report.simulated { "true" } else { "false" }),
                ]);
                Ok(RestoreOutcome::Completed(report))
            }
            Ok(RestoreOutcome::Declined {
                stage,
                database_restored,
            }) => {
                scope.abandon(&format!("declined at {}", stage));
                Ok(RestoreOutcome::Declined {
                    stage,
                    database_restored,
                })
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn run(&self, request: &RestoreRequest<'_>) -> RestoreResult<RestoreOutcome> {
        let simulate = self.runner.simulating();

        // Located
        let archive_path = request.archive_path();
        if !archive_path.is_file() {
            return Err(RestoreError::precondition(format!(
                "Archive not found: {}",
                archive_path.display()
            )));
        }

        // Extracted, Validated
        if simulate {
            let layout = ArchiveLayout::from_members(&list_members(&archive_path)?);
            let work_dir = request.archive_dir.join(WORK_DIR_NAME);
            log_event_with_fields(
                Event::StepSimulated,
                &[("step", "extract"), ("archive", &archive_path.display().to_string())],
            );
            return self.apply(request, &archive_path, &work_dir, &layout);
        }

        let work_dir = create_work_dir(&request.archive_dir)?;
        let result = extract_archive(&archive_path, &work_dir)
            .and_then(|()| {
                log_event_with_fields(
                    Event::ArchiveExtracted,
                    &[("work_dir", &work_dir.display().to_string())],
                );
                ArchiveLayout::from_dir(&work_dir)
            })
            .and_then(|layout| self.apply(request, &archive_path, &work_dir, &layout));

        match &result {
            // Extracted tree is the only copy of the web files left
            Err(e) if e.is_fatal() => {}
            _ => cleanup_work_dir(&work_dir),
        }
        result
    }

    fn apply(
        &self,
        request: &RestoreRequest<'_>,
        archive_path: &Path,
        work_dir: &Path,
        layout: &ArchiveLayout,
    ) -> RestoreResult<RestoreOutcome> {
        let site = request.site;
        let simulate = self.runner.simulating();
        let timer = Timer::new();

        let sql_file = layout.validate(site)?;
        log_event_with_fields(
            Event::ArchiveValidated,
            &[
                ("site", &site.name),
                ("sql_file", sql_file.as_deref().unwrap_or("none")),
            ],
        );

        // DatabaseConfirmed, DatabaseRestored
        let mut database_restored = false;
        if let Some(sql_file) = sql_file {
            let client = DbClient::new(self.settings, self.runner);
            client.ensure_database(site)?;

            let sql_path = work_dir.join("database").join(sql_file);
            let prepared = client.prepare_restore(site, &sql_path)?;
            let confirmation =
                Confirmation::new("restore database", vec![prepared.command.to_string()]);
            if !self.confirm(&confirmation)? {
                return Ok(RestoreOutcome::Declined {
                    stage: Stage::DatabaseConfirmed,
                    database_restored,
                });
            }

            client.execute(prepared)?;
            database_restored = true;
            log_event_with_fields(
                Event::DatabaseRestored,
                &[("database", &site.db_name), ("elapsed_ms", &timer.lap_ms())],
            );
        }

        // FilesConfirmed
        let live_dir = self.settings.www_dir(&site.www_subdir);
        let extracted = work_dir.join("www");
        let fixups = self.fixup_commands(&live_dir);
        let mut plan = vec![
            format!("delete {}", live_dir.display()),
            format!("move {} to {}", extracted.display(), live_dir.display()),
        ];
        plan.extend(fixups.iter().map(|c| c.to_string()));

        if !self.confirm(&Confirmation::new("replace web files", plan))? {
            if database_restored {
                log_event_with_fields(
                    Event::RestoreInconsistent,
                    &[("site", &site.name), ("reason", "web file replacement declined")],
                );
            }
            return Ok(RestoreOutcome::Declined {
                stage: Stage::FilesConfirmed,
                database_restored,
            });
        }

        // FilesSwapped
        let swapped = self.swap(&live_dir, &extracted, &fixups, simulate);
        if let Err(e) = swapped {
            // A real swap deletes the live tree first
            let live_touched = database_restored || !simulate;
            if !live_touched {
                return Err(e);
            }
            log_event_with_fields(
                Event::RestoreInconsistent,
                &[
                    ("site", &site.name),
                    ("reason", e.message()),
                    ("work_dir", &work_dir.display().to_string()),
                ],
            );
            return Err(RestoreError::partial_failure(e));
        }
        log_event_with_fields(
            Event::FilesSwapped,
            &[
                ("live_dir", &live_dir.display().to_string()),
                ("elapsed_ms", &timer.lap_ms()),
            ],
        );

        // Logged
        let label = self.log_action(request, archive_path, simulate)?;

        Ok(RestoreOutcome::Completed(RestoreReport {
            archive_path: archive_path.to_path_buf(),
            live_dir,
            database_restored,
            label,
            simulated: simulate,
        }))
    }

    fn confirm(&self, confirmation: &Confirmation) -> RestoreResult<bool> {
        confirm::request(self.confirmer, confirmation)
            .map_err(|e| RestoreError::io_error("Failed to read confirmation", e))
    }

    /// Ownership and permission commands applied to the restored tree
    fn fixup_commands(&self, live_dir: &Path) -> Vec<ShellCommand> {
        let target = live_dir.display().to_string();
        let mut commands = Vec::new();
        if let Some(owner) = &self.settings.www_user_group {
            commands.push(ShellCommand::new("chown").arg("-R").arg(owner).arg(&target));
        }
        if self.settings.ban_others {
            commands.push(ShellCommand::new("chmod").arg("-R").arg("o-rwx").arg(&target));
        }
        commands
    }

    fn swap(
        &self,
        live_dir: &Path,
        extracted: &Path,
        fixups: &[ShellCommand],
        simulate: bool,
    ) -> RestoreResult<()> {
        if simulate {
            log_event_with_fields(
                Event::StepSimulated,
                &[("step", "replace web files"), ("live_dir", &live_dir.display().to_string())],
            );
        } else {
            replace_web_dir(live_dir, extracted)?;
        }
        for command in fixups {
            self.runner.run(command)?;
        }
        Ok(())
    }

    fn log_action(
        &self,
        request: &RestoreRequest<'_>,
        archive_path: &Path,
        simulate: bool,
    ) -> RestoreResult<String> {
        let tag = &request.tag;
        let label = if tag.is_snapshot() {
            tag.to_string()
        } else {
            let modified = modified_date(archive_path)
                .map_err(|e| RestoreError::io_error_at_path(archive_path, e))?;
            dated_label(modified, tag)
        };

        if simulate {
            log_event_with_fields(Event::StepSimulated, &[("step", "action log")]);
            return Ok(label);
        }

        let log = ActionLog::new(&self.settings.log_dir, self.settings.dir_mode);
        let entry = ActionEntry {
            label: label.clone(),
            action: Action::Restored,
            comment: request.comment.to_string(),
        };
        log.append(&request.site.name, &entry)
            .map_err(|e| RestoreError::io_error_at_path(&log.path(&request.site.name), e))?;
        Ok(label)
    }
}
