//! Copy-replace installation for targets that are not working copies.

use crate::error::Result;
use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Replaces `install_path` with a copy of `found_path`.
///
/// With `preserve` set (rsync mode) the existing directory is kept and files are
/// copied over it instead of deleting it first.
pub fn copy_replace(found_path: &Path, install_path: &Path, preserve: bool) -> Result<()> {
    if install_path.exists() && !preserve {
        tracing::debug!("Deleting {}", install_path.display());
        fs::remove_dir_all(install_path)?;
    }
    tracing::debug!(
        "Copying {} to {}",
        found_path.display(),
        install_path.display()
    );
    copy_dir_all(found_path, install_path)
}

pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let target = dst.join(relative);
        let ty = entry.file_type();

        if ty.is_dir() {
            fs::create_dir_all(&target)?;
        } else if ty.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)?;
    Ok(())
}
