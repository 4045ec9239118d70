//! Whole-tree filesystem operations.
//!
//! Bundles are never patched in place: every placement removes the destination
//! tree and moves or copies a complete replacement over it.

use std::fs;
use std::io;
use std::path::Path;

/// Recursively copies `src` into `dest`, creating `dest` and overwriting files.
///
/// Symlinks are recreated with the same target rather than followed, so
/// versioned bundles (`Versions/Current -> A`) keep their shape.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            copy_symlink(&path, &dest_path)?;
        } else if file_type.is_dir() {
            copy_dir_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    let target = fs::read_link(src)?;
    remove_path(dest)?;
    std::os::unix::fs::symlink(target, dest)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dest: &Path) -> io::Result<()> {
    if src.is_dir() {
        copy_dir_recursive(src, dest)
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

/// Removes a file or directory tree. Returns `Ok(false)` if nothing was there.
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Removes `path` if present and recreates it empty.
pub fn reset_dir(path: &Path) -> io::Result<()> {
    remove_path(path)?;
    fs::create_dir_all(path)
}

/// Replaces the tree at `dest` with the tree at `src`, consuming `src`.
///
/// Falls back to copy-then-delete when a rename is not possible (e.g. across
/// filesystems).
pub fn replace_tree(src: &Path, dest: &Path) -> io::Result<()> {
    remove_path(dest)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(src, dest).is_ok() {
        return Ok(());
    }
    if src.is_dir() {
        copy_dir_recursive(src, dest)?;
    } else {
        fs::copy(src, dest)?;
    }
    remove_path(src)?;
    Ok(())
}
