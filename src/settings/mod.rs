//! Settings Store
//!
//! Global operational parameters, read from the `[wm_config]` table of a
//! TOML file:
//!
//! ```toml
//! [wm_config]
//! runasroot = "true"
//! scp = "scp"
//! sql = "mysql"
//! sqldump = "mysqldump"
//! sqldumpoptions = "--single-transaction --routines"
//! sqlmainuser = "root"
//! sqlmainpw = "/root/.my.cnf"
//! sitedumpdir = "/var/backups/sites"
//! snapshotdir = "/var/backups/snapshots"
//! logdir = "/var/log/sitekeep"
//! wwwroot = "/var/www"
//! wwwusergroup = "www-data:www-data"
//! wwwbanothers = "true"
//! remotelocation = "backup@remote:/srv/sites"
//! ```
//!
//! Every listed key is mandatory and all missing keys are reported in one
//! error. `"none"` disables `sqlmainpw`, `wwwusergroup` and
//! `remotelocation`. Optional keys: `dirmode` (octal, default `700`) and
//! `unattended` (`"true"` pre-authorises destructive restore steps).

mod errors;

pub use errors::{SettingsError, SettingsResult};

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::registry::NONE;

/// Name of the settings table
pub const SECTION: &str = "wm_config";

/// Mandatory keys, in display order
pub const REQUIRED_KEYS: [&str; 14] = [
    "runasroot",
    "scp",
    "sql",
    "sqldump",
    "sqldumpoptions",
    "sqlmainuser",
    "sqlmainpw",
    "sitedumpdir",
    "snapshotdir",
    "logdir",
    "wwwroot",
    "wwwusergroup",
    "wwwbanothers",
    "remotelocation",
];

const DEFAULT_DIR_MODE: u32 = 0o700;

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    runasroot: Option<String>,
    scp: Option<String>,
    sql: Option<String>,
    sqldump: Option<String>,
    sqldumpoptions: Option<String>,
    sqlmainuser: Option<String>,
    sqlmainpw: Option<String>,
    sitedumpdir: Option<String>,
    snapshotdir: Option<String>,
    logdir: Option<String>,
    wwwroot: Option<String>,
    wwwusergroup: Option<String>,
    wwwbanothers: Option<String>,
    remotelocation: Option<String>,
    dirmode: Option<String>,
    unattended: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    wm_config: Option<RawSettings>,
}

impl RawSettings {
    fn value(&self, key: &str) -> Option<&String> {
        match key {
            "runasroot" => self.runasroot.as_ref(),
            "scp" => self.scp.as_ref(),
            "sql" => self.sql.as_ref(),
            "sqldump" => self.sqldump.as_ref(),
            "sqldumpoptions" => self.sqldumpoptions.as_ref(),
            "sqlmainuser" => self.sqlmainuser.as_ref(),
            "sqlmainpw" => self.sqlmainpw.as_ref(),
            "sitedumpdir" => self.sitedumpdir.as_ref(),
            "snapshotdir" => self.snapshotdir.as_ref(),
            "logdir" => self.logdir.as_ref(),
            "wwwroot" => self.wwwroot.as_ref(),
            "wwwusergroup" => self.wwwusergroup.as_ref(),
            "wwwbanothers" => self.wwwbanothers.as_ref(),
            "remotelocation" => self.remotelocation.as_ref(),
            _ => None,
        }
    }

    fn take(value: &mut Option<String>) -> String {
        value.take().unwrap_or_default()
    }
}

fn parse_bool(key: &'static str, value: &str) -> SettingsResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(SettingsError::InvalidBoolean {
            key,
            value: other.to_string(),
        }),
    }
}

fn optional(value: String) -> Option<String> {
    if value == NONE {
        None
    } else {
        Some(value)
    }
}

/// Validated operational parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Engine may provision databases and must check for root
    pub run_as_root: bool,
    /// Remote copy command
    pub scp: String,
    /// Database client command
    pub sql: String,
    /// Database dump command
    pub sql_dump: String,
    /// Extra dump arguments, split on whitespace
    pub sql_dump_options: Vec<String>,
    /// Privileged database user used for provisioning
    pub sql_main_user: String,
    /// Client defaults file holding the privileged user's password
    pub sql_main_defaults: Option<PathBuf>,
    /// Directory of recurring dumps and longterm archives
    pub sitedump_dir: PathBuf,
    /// Directory of snapshots
    pub snapshot_dir: PathBuf,
    /// Directory of per-site action logs
    pub log_dir: PathBuf,
    /// Parent of every site's web directory
    pub www_root: PathBuf,
    /// `user:group` applied to restored web files
    pub www_user_group: Option<String>,
    /// Strip permissions for others on archives and restored files
    pub ban_others: bool,
    /// Remote upload target for recurring dumps
    pub remote_location: Option<String>,
    /// Mode for directories the engine creates
    pub dir_mode: u32,
    /// Destructive restore steps are pre-authorised
    pub unattended: bool,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> SettingsResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> SettingsResult<Self> {
        let file: SettingsFile = toml::from_str(content)?;
        let mut raw = file
            .wm_config
            .ok_or(SettingsError::MissingSection(SECTION))?;

        let missing: Vec<&'static str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| raw.value(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SettingsError::MissingKeys(missing));
        }

        let dir_mode = match raw.dirmode.take() {
            None => DEFAULT_DIR_MODE,
            Some(mode) => u32::from_str_radix(&mode, 8)
                .ok()
                .filter(|m| *m <= 0o7777)
                .ok_or(SettingsError::InvalidDirMode(mode))?,
        };
        let unattended = match raw.unattended.take() {
            None => false,
            Some(value) => parse_bool("unattended", &value)?,
        };

        Ok(Self {
            run_as_root: parse_bool("runasroot", &RawSettings::take(&mut raw.runasroot))?,
            scp: RawSettings::take(&mut raw.scp),
            sql: RawSettings::take(&mut raw.sql),
            sql_dump: RawSettings::take(&mut raw.sqldump),
            sql_dump_options: RawSettings::take(&mut raw.sqldumpoptions)
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            sql_main_user: RawSettings::take(&mut raw.sqlmainuser),
            sql_main_defaults: optional(RawSettings::take(&mut raw.sqlmainpw)).map(PathBuf::from),
            sitedump_dir: PathBuf::from(RawSettings::take(&mut raw.sitedumpdir)),
            snapshot_dir: PathBuf::from(RawSettings::take(&mut raw.snapshotdir)),
            log_dir: PathBuf::from(RawSettings::take(&mut raw.logdir)),
            www_root: PathBuf::from(RawSettings::take(&mut raw.wwwroot)),
            www_user_group: optional(RawSettings::take(&mut raw.wwwusergroup)),
            ban_others: parse_bool("wwwbanothers", &RawSettings::take(&mut raw.wwwbanothers))?,
            remote_location: optional(RawSettings::take(&mut raw.remotelocation)),
            dir_mode,
            unattended,
        })
    }

    /// Live web directory of a site
    pub fn www_dir(&self, www_subdir: &str) -> PathBuf {
        self.www_root.join(www_subdir)
    }

    /// Key/value pairs for display, `sqlmainpw` masked
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let or_none = |v: &Option<String>| v.clone().unwrap_or_else(|| NONE.to_string());
        let path = |p: &Path| p.display().to_string();
        vec![
            ("runasroot", self.run_as_root.to_string()),
            ("scp", self.scp.clone()),
            ("sql", self.sql.clone()),
            ("sqldump", self.sql_dump.clone()),
            ("sqldumpoptions", self.sql_dump_options.join(" ")),
            ("sqlmainuser", self.sql_main_user.clone()),
            (
                "sqlmainpw",
                match self.sql_main_defaults {
                    Some(_) => "***".to_string(),
                    None => NONE.to_string(),
                },
            ),
            ("sitedumpdir", path(&self.sitedump_dir)),
            ("snapshotdir", path(&self.snapshot_dir)),
            ("logdir", path(&self.log_dir)),
            ("wwwroot", path(&self.www_root)),
            ("wwwusergroup", or_none(&self.www_user_group)),
            ("wwwbanothers", self.ban_others.to_string()),
            ("remotelocation", or_none(&self.remote_location)),
            ("dirmode", format!("{:o}", self.dir_mode)),
            ("unattended", self.unattended.to_string()),
        ]
    }

    /// Aligned `key = 'value'` lines
    pub fn render(&self) -> String {
        let entries = self.entries();
        let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or_default();
        entries
            .iter()
            .map(|(k, v)| format!("{:<width$} = '{}'\n", k, v, width = width))
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn test_settings_toml(root: &Path) -> String {
    format!(
        r#"
[wm_config]
runasroot = "false"
scp = "scp"
sql = "mysql"
sqldump = "mysqldump"
sqldumpoptions = "--single-transaction  --quick"
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
    )
}

#[cfg(test)]
pub(crate) fn test_settings(root: &Path) -> Settings {
    Settings::from_toml_str(&test_settings_toml(root)).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_complete_settings() {
        let settings = test_settings(Path::new("/srv"));

        assert!(!settings.run_as_root);
        assert_eq!(settings.sql_dump_options, vec!["--single-transaction", "--quick"]);
        assert_eq!(settings.sitedump_dir, PathBuf::from("/srv/dumps"));
        assert_eq!(settings.sql_main_defaults, None);
        assert_eq!(settings.www_user_group, None);
        assert_eq!(settings.remote_location, None);
        assert_eq!(settings.dir_mode, 0o700);
        assert!(!settings.unattended);
        assert_eq!(settings.www_dir("blog"), PathBuf::from("/srv/www/blog"));
    }

    #[test]
    fn test_all_missing_keys_reported() {
        let toml = "[wm_config]\nrunasroot = \"true\"\nscp = \"scp\"\n";
        match Settings::from_toml_str(toml) {
            Err(SettingsError::MissingKeys(keys)) => {
                assert_eq!(keys.len(), 12);
                assert!(keys.contains(&"remotelocation"));
                assert!(!keys.contains(&"scp"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_section() {
        let result = Settings::from_toml_str("[other]\nkey = \"v\"\n");
        assert!(matches!(result, Err(SettingsError::MissingSection("wm_config"))));
    }

    #[test]
    fn test_optional_keys() {
        let toml = test_settings_toml(Path::new("/srv")) + "dirmode = \"750\"\nunattended = \"true\"\n";
        let settings = Settings::from_toml_str(&toml).unwrap();
        assert_eq!(settings.dir_mode, 0o750);
        assert!(settings.unattended);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = test_settings_toml(Path::new("/srv"));

        let bad_mode = base.clone() + "dirmode = \"rwx\"\n";
        assert!(matches!(
            Settings::from_toml_str(&bad_mode),
            Err(SettingsError::InvalidDirMode(_))
        ));

        let bad_bool = base.replace("wwwbanothers = \"false\"", "wwwbanothers = \"yes\"");
        assert!(matches!(
            Settings::from_toml_str(&bad_bool),
            Err(SettingsError::InvalidBoolean { key: "wwwbanothers", .. })
        ));
    }

    #[test]
    fn test_render_masks_main_password_file() {
        let toml = test_settings_toml(Path::new("/srv"))
            .replace("sqlmainpw = \"none\"", "sqlmainpw = \"/root/.my.cnf\"");
        let settings = Settings::from_toml_str(&toml).unwrap();
        let rendered = settings.render();

        assert!(!rendered.contains(".my.cnf"));
        assert!(rendered.contains("sqlmainpw      = '***'"));
        assert_eq!(rendered.lines().count(), 16);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(test_settings_toml(Path::new("/srv")).as_bytes())
            .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.scp, "scp");
    }
}
