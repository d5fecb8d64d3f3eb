//! Database client
//!
//! Builds and issues the database commands of a site:
//! - dump: `<sqldump> --defaults-file=F -h <host> <options> <db> > <file>`
//! - restore: `<sql> --defaults-file=F -h <host> <db> < <file>`
//! - ensure: probe access, provision user and database as the main user
//!
//! Site credentials go through a `DefaultsFile` placed in the snapshot
//! directory. In simulated runs that file is never written.

mod defaults;
mod errors;

pub use defaults::DefaultsFile;
pub use errors::{DatabaseError, DatabaseResult};

use std::path::Path;

use crate::observability::{log_event_with_fields, Event};
use crate::policy::ensure_dir;
use crate::registry::Site;
use crate::runner::{running_as_root, CommandRunner, ShellCommand};
use crate::settings::Settings;

/// How `ensure_database` found the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Reachable with the site's credentials
    Accessible,
    /// Created, together with the user when it was missing
    Provisioned { user_created: bool },
}

/// A command bound to the credentials file it references
#[derive(Debug)]
pub struct PreparedCommand {
    pub command: ShellCommand,
    _credentials: DefaultsFile,
}

/// Issues database commands for sites
pub struct DbClient<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
}

impl<'a> DbClient<'a> {
    pub fn new(settings: &'a Settings, runner: &'a dyn CommandRunner) -> Self {
        Self { settings, runner }
    }

    fn require_database(site: &Site) -> DatabaseResult<()> {
        if site.has_database() {
            Ok(())
        } else {
            Err(DatabaseError::NoDatabase(site.name.clone()))
        }
    }

    /// Credentials file for `site`
    pub fn credentials(&self, site: &Site) -> DatabaseResult<DefaultsFile> {
        let dir = &self.settings.snapshot_dir;
        if self.runner.simulating() {
            return Ok(DefaultsFile::placeholder(dir));
        }
        ensure_dir(dir, self.settings.dir_mode)?;
        DefaultsFile::create(dir, site)
    }

    /// Dump command writing `site`'s database to `output`
    pub fn prepare_dump(&self, site: &Site, output: &Path) -> DatabaseResult<PreparedCommand> {
        Self::require_database(site)?;
        let credentials = self.credentials(site)?;
        let command = ShellCommand::new(&self.settings.sql_dump)
            .arg(credentials.option())
            .arg("-h")
            .arg(&site.db_host)
            .args(self.settings.sql_dump_options.iter().cloned())
            .arg(&site.db_name)
            .stdout_to(output);
        Ok(PreparedCommand {
            command,
            _credentials: credentials,
        })
    }

    /// Client command replacing `site`'s database content from `sql_file`
    pub fn prepare_restore(&self, site: &Site, sql_file: &Path) -> DatabaseResult<PreparedCommand> {
        Self::require_database(site)?;
        let credentials = self.credentials(site)?;
        let command = ShellCommand::new(&self.settings.sql)
            .arg(credentials.option())
            .arg("-h")
            .arg(&site.db_host)
            .arg(&site.db_name)
            .stdin_from(sql_file);
        Ok(PreparedCommand {
            command,
            _credentials: credentials,
        })
    }

    /// Run a prepared command; its credentials file is removed afterwards
    pub fn execute(&self, prepared: PreparedCommand) -> DatabaseResult<()> {
        self.runner.run(&prepared.command)?;
        Ok(())
    }

    /// Whether the site's user can open the site's database
    pub fn database_accessible(&self, site: &Site) -> DatabaseResult<bool> {
        Self::require_database(site)?;
        let credentials = self.credentials(site)?;
        let probe = ShellCommand::new(&self.settings.sql)
            .arg(credentials.option())
            .arg("-h")
            .arg(&site.db_host)
            .arg("--silent")
            .arg("-e")
            .arg("quit")
            .arg(&site.db_name);
        Ok(self.runner.probe(&probe)?)
    }

    /// Statement run as the configured main user
    fn main_user_command(&self, statement: String) -> ShellCommand {
        let mut command = ShellCommand::new(&self.settings.sql);
        if let Some(defaults) = &self.settings.sql_main_defaults {
            command = command.arg(format!("--defaults-file={}", defaults.display()));
        }
        command
            .arg(format!("-u{}", self.settings.sql_main_user))
            .arg("-s")
            .arg("-N")
            .arg("-e")
            .arg(statement)
    }

    /// Whether the site's database user exists on the server
    pub fn user_exists(&self, site: &Site) -> DatabaseResult<bool> {
        let output = self.runner.capture(&self.main_user_command(format!(
            "SELECT COUNT(*) FROM mysql.user WHERE user='{}'",
            site.db_user
        )))?;
        Ok(output.trim_start().starts_with('1'))
    }

    fn create_user(&self, site: &Site) -> DatabaseResult<()> {
        let user = format!("{}@localhost", site.db_user);
        let statement = format!(
            "create user {user} identified by '{pw}';\
             alter user {user} identified with mysql_native_password;\
             alter user {user} identified by '{pw}';",
            user = user,
            pw = site.db_password
        );
        self.runner.run(&self.main_user_command(statement))?;
        Ok(())
    }

    fn create_database(&self, site: &Site) -> DatabaseResult<()> {
        let statement = format!(
            "create database {db};grant all privileges on {db}.* to {user}@localhost;flush privileges;",
            db = site.db_name,
            user = site.db_user
        );
        self.runner.run(&self.main_user_command(statement))?;
        Ok(())
    }

    /// Make sure the site's database exists and its user can reach it
    ///
    /// Provisioning runs as the main user and is only attempted when the
    /// settings allow running as root and the process actually is root.
    pub fn ensure_database(&self, site: &Site) -> DatabaseResult<EnsureOutcome> {
        if self.database_accessible(site)? {
            log_event_with_fields(
                Event::DatabaseEnsured,
                &[("database", &site.db_name), ("outcome", "accessible")],
            );
            return Ok(EnsureOutcome::Accessible);
        }

        if !self.settings.run_as_root || !running_as_root(self.runner)? {
            return Err(DatabaseError::NotProvisionable {
                database: site.db_name.clone(),
                user: site.db_user.clone(),
            });
        }

        let user_created = !self.user_exists(site)?;
        if user_created {
            self.create_user(site)?;
        }
        self.create_database(site)?;

        log_event_with_fields(
            Event::DatabaseEnsured,
            &[
                ("database", &site.db_name),
                ("outcome", "provisioned"),
                ("user_created", if user_created { "true" } else { "false" }),
            ],
        );
        Ok(EnsureOutcome::Provisioned { user_created })
    }
}
