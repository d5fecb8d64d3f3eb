//! Client defaults file holding a site's database credentials
//!
//! Credentials never appear on a command line. They are written to a
//! randomly named, owner-only file that lives exactly as long as the
//! guard returned here.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::errors::{DatabaseError, DatabaseResult};
use crate::registry::Site;

const NAME_LENGTH: usize = 15;

/// Owner-only credentials file, removed on drop
#[derive(Debug)]
pub struct DefaultsFile {
    path: PathBuf,
    written: bool,
}

impl DefaultsFile {
    /// Write `[client]` credentials for `site` into a new file under `dir`
    pub fn create(dir: &Path, site: &Site) -> DatabaseResult<Self> {
        let path = Self::random_path(dir);
        let write_error = |source| DatabaseError::DefaultsFile {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(&path)
            .map_err(write_error)?;
        let guard = Self {
            path: path.clone(),
            written: true,
        };
        write!(
            file,
            "[client]\nuser={}\npassword={}\n",
            site.db_user, site.db_password
        )
        .map_err(write_error)?;
        Ok(guard)
    }

    /// A path that is never written, for simulated runs
    pub fn placeholder(dir: &Path) -> Self {
        Self {
            path: Self::random_path(dir),
            written: false,
        }
    }

    fn random_path(dir: &Path) -> PathBuf {
        let name: String = Uuid::new_v4().simple().to_string().chars().take(NAME_LENGTH).collect();
        dir.join(format!(".{}", name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `--defaults-file=<path>`
    pub fn option(&self) -> String {
        format!("--defaults-file={}", self.path.display())
    }
}

impl Drop for DefaultsFile {
    fn drop(&mut self) {
        if self.written {
            let _ = fs::remove_file(&self.path);
        }
    }
}
