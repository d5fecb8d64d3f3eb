//! CLI command implementations
//!
//! Settings and site table are loaded first; commands that change
//! anything then check root privileges when `runasroot` is set. All
//! operator interaction goes through the `input`/`output` handles passed
//! to `dispatch`.

use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::backup::{save_all, BackupEngine, BackupRequest};
use crate::confirm::{AutoApprove, Confirmer, TerminalConfirmer};
use crate::database::{DbClient, EnsureOutcome};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::policy::{list_archives, ArchiveEntry, ArchiveListing, ArchiveTag, Clock, LocalClock};
use crate::registry::{Site, SiteRegistry, CREDENTIAL_COLUMNS};
use crate::restore::{RestoreEngine, RestoreOutcome, RestoreRequest};
use crate::runner::{running_as_root, CommandRunner, RunnerOptions, SystemRunner};
use crate::settings::Settings;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// Everything a command acts with
pub struct Context<'a> {
    pub settings: &'a Settings,
    pub registry: &'a SiteRegistry,
    pub runner: &'a dyn CommandRunner,
    pub clock: &'a dyn Clock,
    /// Approves destructive steps; `None` asks on the command's console
    pub confirmer: Option<&'a dyn Confirmer>,
    pub comment: &'a str,
}

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args())
}

pub fn run_command(cli: Cli) -> CliResult<()> {
    if cli.verbose {
        Logger::set_min_severity(Severity::Trace);
    }

    let settings = load_settings(&locate(&cli.config))?;
    let registry = load_registry(&locate(&cli.websites))?;

    let runner = SystemRunner::new(RunnerOptions {
        verbose: cli.verbose,
        simulate: cli.simulate,
    });
    if changes_state(&cli.command) && settings.run_as_root && !running_as_root(&runner)? {
        return Err(CliError::not_root());
    }

    let ctx = Context {
        settings: &settings,
        registry: &registry,
        runner: &runner,
        clock: &LocalClock,
        confirmer: if settings.unattended {
            Some(&AutoApprove as &dyn Confirmer)
        } else {
            None
        },
        comment: &cli.comment,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    dispatch(&ctx, cli.command, &mut stdin.lock(), &mut stdout)
}

/// Run one command
pub fn dispatch(
    ctx: &Context<'_>,
    command: Command,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> CliResult<()> {
    match command {
        Command::Saveall => saveall(ctx, output),
        Command::Snapshot { site, altdir } => {
            let site = treated_site(ctx, &site, output)?;
            snapshot(ctx, site, altdir.as_deref(), output)
        }
        Command::Restore {
            site,
            timestamp,
            altdir,
        } => {
            let site = treated_site(ctx, &site, output)?;
            restore(ctx, site, timestamp, altdir.as_deref(), input, output)
        }
        Command::Back {
            site,
            timestamp,
            altdir,
        } => {
            let site = treated_site(ctx, &site, output)?;
            snapshot(ctx, site, altdir.as_deref(), output)?;
            restore(ctx, site, timestamp, altdir.as_deref(), input, output)
        }
        Command::Prepare { site } => {
            let site = treated_site(ctx, &site, output)?;
            prepare(ctx, site, output)
        }
        Command::List { site, altdir } => {
            let site = ctx.registry.get(&site)?;
            let listing = list_archives(ctx.settings, &site.name, altdir.as_deref())?;
            write_listing(&listing, output)
        }
        Command::Sites => {
            write!(output, "{}", ctx.registry.render_table(&CREDENTIAL_COLUMNS))?;
            Ok(())
        }
        Command::Settings => {
            write!(output, "{}", ctx.settings.render())?;
            Ok(())
        }
    }
}

fn changes_state(command: &Command) -> bool {
    !matches!(
        command,
        Command::List { .. } | Command::Sites | Command::Settings
    )
}

/// Relative paths missing from the working directory are looked up next
/// to the executable
fn locate(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

fn load_settings(path: &Path) -> CliResult<Settings> {
    let settings = Settings::load(path)?;
    log_event_with_fields(
        Event::SettingsLoaded,
        &[("path", &path.display().to_string())],
    );
    Ok(settings)
}

fn load_registry(path: &Path) -> CliResult<SiteRegistry> {
    let registry = SiteRegistry::load(path)?;
    log_event_with_fields(
        Event::SitesLoaded,
        &[
            ("path", &path.display().to_string()),
            ("sites", &registry.len().to_string()),
        ],
    );
    Ok(registry)
}

fn treated_site<'r>(
    ctx: &Context<'r>,
    name: &str,
    output: &mut dyn Write,
) -> CliResult<&'r Site> {
    let site = ctx.registry.get(name)?;
    writeln!(output, "=> Treated website: {} \"{}\"", site.name, site.comment)?;
    Ok(site)
}

fn saveall(ctx: &Context<'_>, output: &mut dyn Write) -> CliResult<()> {
    let engine = BackupEngine::new(ctx.settings, ctx.runner, ctx.clock);
    let report = save_all(&engine, ctx.registry);
    write!(output, "{}", report.summary())?;

    if report.is_success() {
        Ok(())
    } else {
        let failed: Vec<&str> = report.failed.iter().map(|(site, _)| site.as_str()).collect();
        Err(CliError::batch_failed(format!(
            "{} of {} sites failed: {}",
            failed.len(),
            ctx.registry.len(),
            failed.join(", ")
        )))
    }
}

fn snapshot(
    ctx: &Context<'_>,
    site: &Site,
    altdir: Option<&Path>,
    output: &mut dyn Write,
) -> CliResult<()> {
    let engine = BackupEngine::new(ctx.settings, ctx.runner, ctx.clock);
    let request = BackupRequest::snapshot(site, ctx.comment).with_alternate_dir(altdir);
    let outcome = engine.backup(&request)?;
    writeln!(output, "=> Snapshot written: {}", outcome.archive_path.display())?;
    Ok(())
}

fn restore(
    ctx: &Context<'_>,
    site: &Site,
    timestamp: Option<String>,
    altdir: Option<&Path>,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> CliResult<()> {
    let tag = match timestamp {
        Some(raw) => ArchiveTag::parse(&raw)?,
        None => {
            let listing = list_archives(ctx.settings, &site.name, altdir)?;
            write_listing(&listing, output)?;
            read_tag(&site.name, input, output)?
        }
    };

    let request = RestoreRequest::resolve(ctx.settings, site, tag, altdir)?.with_comment(ctx.comment);
    writeln!(output, "=> Restoring from {}", request.archive_path().display())?;

    let outcome = match ctx.confirmer {
        Some(confirmer) => {
            RestoreEngine::new(ctx.settings, ctx.runner, confirmer).restore(&request)?
        }
        None => {
            let prompt = TerminalConfirmer::new(&mut *input, &mut *output);
            RestoreEngine::new(ctx.settings, ctx.runner, &prompt).restore(&request)?
        }
    };
    match outcome {
        RestoreOutcome::Completed(report) => {
            writeln!(output, "=> Restored {} from {}", site.name, report.label)?;
        }
        RestoreOutcome::Declined {
            stage,
            database_restored,
        } => {
            writeln!(output, "=> Restore of {} stopped before: {}", site.name, stage)?;
            if database_restored {
                writeln!(
                    output,
                    "   The database was restored, the web files were not replaced."
                )?;
            } else {
                writeln!(output, "   Nothing was changed.")?;
            }
        }
    }
    Ok(())
}

fn prepare(ctx: &Context<'_>, site: &Site, output: &mut dyn Write) -> CliResult<()> {
    if !running_as_root(ctx.runner)? {
        return Err(CliError::not_root());
    }
    let client = DbClient::new(ctx.settings, ctx.runner);
    match client.ensure_database(site)? {
        EnsureOutcome::Accessible => {
            writeln!(output, "=> Database {} is accessible", site.db_name)?;
        }
        EnsureOutcome::Provisioned { user_created } => {
            writeln!(output, "=> Database {} created", site.db_name)?;
            if user_created {
                writeln!(output, "=> Database user {} created", site.db_user)?;
            }
        }
    }
    Ok(())
}

fn write_entries(
    title: &str,
    dir: &Path,
    entries: &[ArchiveEntry],
    label: impl Fn(&ArchiveEntry) -> String,
    output: &mut dyn Write,
) -> io::Result<()> {
    writeln!(output, "{} {} :", title, dir.display())?;
    if entries.is_empty() {
        writeln!(output, "  (none)")?;
    }
    for entry in entries {
        writeln!(output, "  {}", label(entry))?;
    }
    Ok(())
}

/// Print the archives of a site, dumps with their file date
pub fn write_listing(listing: &ArchiveListing, output: &mut dyn Write) -> CliResult<()> {
    write_entries(
        "Sitedumps in",
        &listing.dump_dir,
        &listing.dumps,
        ArchiveEntry::label,
        output,
    )?;
    write_entries(
        "Snapshots in",
        &listing.snapshot_dir,
        &listing.snapshots,
        |entry| entry.tag.to_string(),
        output,
    )?;
    Ok(())
}

/// Ask the operator for the tag of the archive to restore
fn read_tag(site: &str, input: &mut dyn BufRead, output: &mut dyn Write) -> CliResult<ArchiveTag> {
    writeln!(output, "Snapshot tags have format YYYY-MM-DD_hh-mm or YYYY-MM-DD")?;
    writeln!(output, "Sitedump tags have format wd#, w# or m##; enter the tag without date")?;
    write!(output, "Enter tag of \"{}\" archive to be restored: ", site)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::usage_error("no archive tag entered"));
    }
    Ok(ArchiveTag::parse(line.trim_end_matches(&['\n', '\r'][..]))?)
}
