//! Restore refusal tests
//!
//! An archive whose layout is not exactly `www/` plus one `database/*.sql`
//! is refused before any command runs or any live file changes.

use flate2::write::GzEncoder;
use flate2::Compression;
use sitekeep::confirm::ScriptedConfirmer;
use sitekeep::policy::ArchiveTag;
use sitekeep::registry::SiteRegistry;
use sitekeep::restore::{RestoreEngine, RestoreErrorCode, RestoreRequest};
use sitekeep::runner::RecordingRunner;
use sitekeep::settings::Settings;
use std::fs::{self, File};
use std::path::Path;
use tar::{Builder, Header};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

const TABLE: &str = "\
siteName save wwwSubdir host      dbName dbUser dbPassWord comment
s1       1    htdocs    localhost s1_db  s1_u   secret     main site
";

fn settings_for(root: &Path) -> Settings {
    let toml = format!(
        r#"
[wm_config]
runasroot = "false"
scp = "scp"
sql = "mysql"
sqldump = "mysqldump"
sqldumpoptions = "--quick"
sqlmainuser = "root"
sqlmainpw = "none"
sitedumpdir = "{root}/dumps"
snapshotdir = "{root}/snapshots"
logdir = "{root}/logs"
wwwroot = "{root}/www"
wwwusergroup = "none"
wwwbanothers = "false"
remotelocation = "none"
"#,
        root = root.display()
    );
    Settings::from_toml_str(&toml).expect("settings")
}

fn write_archive(path: &Path, members: &[&str]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    for name in members {
        let mut header = Header::new_gnu();
        header.set_size(2);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, &b"--"[..]).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

fn assert_refused(members: &[&str]) {
    let root = TempDir::new().unwrap();
    let settings = settings_for(root.path());
    let registry = SiteRegistry::parse(TABLE).unwrap();
    let site = registry.get("s1").unwrap();

    let live = settings.www_dir("htdocs");
    fs::create_dir_all(&live).unwrap();
    fs::write(live.join("index.html"), b"live").unwrap();
    write_archive(&settings.sitedump_dir.join("s1.wd1.tar.gz"), members);

    let runner = RecordingRunner::new();
    let confirmer = ScriptedConfirmer::new(&[true, true]);
    let tag = ArchiveTag::parse("wd1").unwrap();
    let request = RestoreRequest::resolve(&settings, site, tag, None).unwrap();

    let err = RestoreEngine::new(&settings, &runner, &confirmer)
        .restore(&request)
        .unwrap_err();

    assert_eq!(err.code(), RestoreErrorCode::SitekeepRestoreInvalidArchive);
    assert!(!err.is_fatal());
    assert!(runner.commands().is_empty());
    assert!(confirmer.seen().is_empty());
    assert_eq!(fs::read(live.join("index.html")).unwrap(), b"live");
    assert!(!settings.log_dir.exists());
}

// =============================================================================
// Refusals
// =============================================================================

#[test]
fn test_refuses_archive_without_dump() {
    assert_refused(&["www/index.html", "database/readme.txt"]);
}

#[test]
fn test_refuses_archive_with_two_dumps() {
    assert_refused(&["www/index.html", "database/s1.sql", "database/old.sql"]);
}

#[test]
fn test_refuses_archive_without_web_tree() {
    assert_refused(&["database/s1.sql"]);
}

#[test]
fn test_refuses_missing_archive() {
    let root = TempDir::new().unwrap();
    let settings = settings_for(root.path());
    let registry = SiteRegistry::parse(TABLE).unwrap();
    let site = registry.get("s1").unwrap();
    let runner = RecordingRunner::new();
    let confirmer = ScriptedConfirmer::new(&[]);

    let tag = ArchiveTag::parse("2025-03-01_10-00").unwrap();
    let request = RestoreRequest::resolve(&settings, site, tag, None).unwrap();
    let err = RestoreEngine::new(&settings, &runner, &confirmer)
        .restore(&request)
        .unwrap_err();

    assert_eq!(err.code(), RestoreErrorCode::SitekeepRestorePrecondition);
    assert!(err.message().contains("s1.2025-03-01_10-00.tar.gz"));
}
