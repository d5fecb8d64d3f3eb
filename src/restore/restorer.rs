//! Live web directory replacement for restore
//!
//! The replacement follows:
//! 1. Delete the live directory
//! 2. Move the extracted `www/` into its place
//! 3. fsync the parent directory
//!
//! When the rename crosses filesystems the tree is copied and the
//! extracted copy removed. There is no rollback: the live directory is
//! already gone when step 2 runs.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

use super::errors::{RestoreError, RestoreResult};

/// fsync a directory
pub fn fsync_dir(dir: &Path) -> RestoreResult<()> {
    let d = OpenOptions::new()
        .read(true)
        .open(dir)
        .map_err(|e| RestoreError::io_error_at_path(dir, e))?;

    d.sync_all()
        .map_err(|e| RestoreError::io_error(format!("Failed to fsync {}", dir.display()), e))
}

fn copy_file_with_fsync(src: &Path, dst: &Path) -> RestoreResult<()> {
    fs::copy(src, dst).map_err(|e| RestoreError::io_error_at_path(src, e))?;
    File::open(dst)
        .and_then(|f| f.sync_all())
        .map_err(|e| RestoreError::io_error_at_path(dst, e))
}

/// Copy directory recursively, keeping symlinks and file modes
fn copy_dir_recursive(src: &Path, dst: &Path) -> RestoreResult<()> {
    fs::create_dir_all(dst)
        .map_err(|e| RestoreError::io_error(format!("Failed to create {}", dst.display()), e))?;
    let permissions = fs::metadata(src)
        .map_err(|e| RestoreError::io_error_at_path(src, e))?
        .permissions();

    let entries = fs::read_dir(src).map_err(|e| RestoreError::io_error_at_path(src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| RestoreError::io_error_at_path(src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| RestoreError::io_error_at_path(&src_path, e))?;

        if file_type.is_symlink() {
            let target = fs::read_link(&src_path)
                .map_err(|e| RestoreError::io_error_at_path(&src_path, e))?;
            symlink(&target, &dst_path)
                .map_err(|e| RestoreError::io_error_at_path(&dst_path, e))?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            copy_file_with_fsync(&src_path, &dst_path)?;
        }
    }

    fs::set_permissions(dst, permissions)
        .map_err(|e| RestoreError::io_error_at_path(dst, e))?;
    fsync_dir(dst)?;
    Ok(())
}

fn is_cross_device(e: &io::Error) -> bool {
    // EXDEV
    e.raw_os_error() == Some(18)
}

/// Replace `live_dir` with `new_dir`
pub fn replace_web_dir(live_dir: &Path, new_dir: &Path) -> RestoreResult<()> {
    let parent = live_dir.parent().unwrap_or(Path::new("."));

    // Step 1
    if live_dir.exists() {
        fs::remove_dir_all(live_dir).map_err(|e| {
            RestoreError::io_error(format!("Failed to remove {}", live_dir.display()), e)
        })?;
    }
    fs::create_dir_all(parent)
        .map_err(|e| RestoreError::io_error(format!("Failed to create {}", parent.display()), e))?;

    // Step 2
    match fs::rename(new_dir, live_dir) {
        Ok(()) => {}
        Err(e) if is_cross_device(&e) => {
            copy_dir_recursive(new_dir, live_dir)?;
            let _ = fs::remove_dir_all(new_dir);
        }
        Err(e) => {
            return Err(RestoreError::io_error(
                format!(
                    "Failed to move {} to {}",
                    new_dir.display(),
                    live_dir.display()
                ),
                e,
            ))
        }
    }

    // Step 3
    fsync_dir(parent)?;

    Ok(())
}
