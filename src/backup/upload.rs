//! Remote upload of finished archives

use std::path::Path;

use super::errors::BackupResult;
use crate::observability::{log_event_with_fields, Event};
use crate::runner::{CommandRunner, ShellCommand};

/// `<scp> -p <archive> <remote>/<file name>`
pub fn upload_command(scp: &str, archive: &Path, remote: &str) -> ShellCommand {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ShellCommand::new(scp)
        .arg("-p")
        .arg(archive.display().to_string())
        .arg(format!("{}/{}", remote.trim_end_matches('/'), name))
}

/// Copy each archive to the remote location, in order
///
/// The first failure stops the upload; archives already written locally
/// stay valid.
pub fn upload_archives(
    runner: &dyn CommandRunner,
    scp: &str,
    remote: &str,
    archives: &[&Path],
) -> BackupResult<()> {
    for archive in archives {
        runner.run(&upload_command(scp, archive, remote))?;
        log_event_with_fields(
            Event::ArchiveUploaded,
            &[
                ("archive", &archive.display().to_string()),
                ("remote", remote),
            ],
        );
    }
    Ok(())
}
