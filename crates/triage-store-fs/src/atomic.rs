// crates/triage-store-fs/src/atomic.rs
// ============================================================================
// Module: Atomic Writer
// Description: Whole-file replacement through a synced temporary sibling.
// Purpose: Never expose a partially written document to readers.
// Dependencies: cap-std, cap-primitives
// ============================================================================

//! ## Overview
//! [`write_atomic`] walks to the destination directory one component at a
//! time through capability handles, refusing symlinked directories and
//! symlinked destinations. It writes into `.tmp-<name>.<pid>.<attempt>` next
//! to the destination, syncs it, and renames it over the destination through
//! the same handle. Failures before the rename remove the temporary file and
//! leave the destination untouched. A failed rename is reported separately:
//! the destination must be re-verified before anything that depends on it is
//! written.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use cap_primitives::fs::FollowSymlinks;
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use cap_std::fs::OpenOptions;
use thiserror::Error;
use triage_core::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Temporary names tried before giving up.
const MAX_TEMP_ATTEMPTS: u32 = 64;

/// `ELOOP`, reported when a no-follow open meets a symlink.
#[cfg(target_os = "linux")]
const ELOOP: i32 = 40;

/// `ELOOP`, reported when a no-follow open meets a symlink.
#[cfg(all(unix, not(target_os = "linux")))]
const ELOOP: i32 = 62;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Atomic write failures.
#[derive(Debug, Error)]
pub enum AtomicWriteError {
    /// Destination path is unusable: no file name, a symlink, or a non-directory parent.
    #[error("invalid output path: {0}")]
    Path(String),
    /// Temporary file could not be created, written, or synced.
    #[error("atomic write io error: {0}")]
    Io(String),
    /// Rename over the destination failed; its state is indeterminate.
    #[error("atomic rename failed for {path}: {message}")]
    Rename {
        /// Destination path.
        path: String,
        /// Underlying error.
        message: String,
    },
}

impl From<AtomicWriteError> for StoreError {
    fn from(err: AtomicWriteError) -> Self {
        match err {
            AtomicWriteError::Path(message) => Self::Invalid(message),
            AtomicWriteError::Io(_) | AtomicWriteError::Rename {
                ..
            } => Self::Io(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Replaces `path` with exactly `bytes`, creating parent directories.
///
/// # Errors
///
/// Returns [`AtomicWriteError::Path`] when the path has no file name, a
/// parent component is a symlink or not a directory, or the destination is a
/// symlink. Returns [`AtomicWriteError::Io`] or [`AtomicWriteError::Rename`]
/// when the write itself fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AtomicWriteError> {
    let Some((parent, file_name)) = open_parent_dir(path, true)? else {
        return Err(AtomicWriteError::Path(path.display().to_string()));
    };
    refuse_symlink(&parent, &file_name, path)?;
    for attempt in 0 .. MAX_TEMP_ATTEMPTS {
        let temp_name = temp_file_name(&file_name, attempt);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        options._cap_fs_ext_follow(FollowSymlinks::No);
        match parent.open_with(&temp_name, &options) {
            Ok(mut temp_file) => {
                if let Err(err) = temp_file.write_all(bytes).and_then(|()| temp_file.sync_all()) {
                    drop(temp_file);
                    let _ = parent.remove_file(&temp_name);
                    return Err(AtomicWriteError::Io(format!("{}: {err}", path.display())));
                }
                drop(temp_file);
                if let Err(err) = parent.rename(&temp_name, &parent, &file_name) {
                    let _ = parent.remove_file(&temp_name);
                    return Err(AtomicWriteError::Rename {
                        path: path.display().to_string(),
                        message: err.to_string(),
                    });
                }
                sync_dir(&parent);
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(map_open_error(&err, path)),
        }
    }
    Err(AtomicWriteError::Io(format!(
        "unable to allocate temporary file for {}",
        path.display()
    )))
}

/// Removes `path` if it exists, without following symlinked directories.
///
/// Returns whether a file was removed.
///
/// # Errors
///
/// Returns [`AtomicWriteError`] when the path is unusable or removal fails.
pub fn remove_if_present(path: &Path) -> Result<bool, AtomicWriteError> {
    let Some((parent, file_name)) = open_parent_dir(path, false)? else {
        return Ok(false);
    };
    match parent.remove_file(&file_name) {
        Ok(()) => {
            sync_dir(&parent);
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(AtomicWriteError::Io(format!("{}: {err}", path.display()))),
    }
}

// ============================================================================
// SECTION: Directory Handles
// ============================================================================

/// Opens the directory containing `path` and returns it with the file name.
///
/// `None` when a directory is missing and `create_missing` is false.
fn open_parent_dir(
    path: &Path,
    create_missing: bool,
) -> Result<Option<(Dir, PathBuf)>, AtomicWriteError> {
    let Some(file_name) = path.file_name() else {
        return Err(AtomicWriteError::Path(path.display().to_string()));
    };
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|err| AtomicWriteError::Io(format!("current directory: {err}")))?
            .join(path)
    };
    let (anchor, components) = split_parent(&absolute)?;
    let mut current = Dir::open_ambient_dir(&anchor, ambient_authority())
        .map_err(|err| AtomicWriteError::Io(format!("{}: {err}", anchor.display())))?;
    for name in components {
        match open_or_create_child_dir_nofollow(&current, Path::new(&name), create_missing) {
            Ok(dir) => current = dir,
            Err(err) if err.kind() == ErrorKind::NotFound && !create_missing => return Ok(None),
            Err(err) => return Err(map_open_error(&err, path)),
        }
    }
    Ok(Some((current, PathBuf::from(file_name))))
}

/// Splits the parent of an absolute path into its root and normal components.
///
/// `.` is dropped and `..` removes the preceding component.
fn split_parent(absolute: &Path) -> Result<(PathBuf, Vec<OsString>), AtomicWriteError> {
    let Some(parent) = absolute.parent() else {
        return Err(AtomicWriteError::Path(absolute.display().to_string()));
    };
    let mut anchor = PathBuf::new();
    let mut components = Vec::new();
    for component in parent.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => anchor.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                components.pop();
            }
            Component::Normal(name) => components.push(name.to_os_string()),
        }
    }
    if anchor.as_os_str().is_empty() {
        return Err(AtomicWriteError::Path(absolute.display().to_string()));
    }
    Ok((anchor, components))
}

/// Opens a child directory without following symlinks.
fn open_child_dir_nofollow(parent: &Dir, child: &Path) -> std::io::Result<Dir> {
    let mut options = OpenOptions::new();
    options.read(true);
    options._cap_fs_ext_follow(FollowSymlinks::No);
    let file = parent.open_with(child, &options)?;
    if !file.metadata()?.is_dir() {
        return Err(std::io::Error::new(
            ErrorKind::InvalidInput,
            "path component is not a directory",
        ));
    }
    Ok(Dir::from_std_file(file.into_std()))
}

/// Opens or creates a child directory without following symlinks.
fn open_or_create_child_dir_nofollow(
    parent: &Dir,
    child: &Path,
    create_missing: bool,
) -> std::io::Result<Dir> {
    match open_child_dir_nofollow(parent, child) {
        Err(err) if err.kind() == ErrorKind::NotFound && create_missing => {
            match parent.create_dir(child) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err),
            }
            open_child_dir_nofollow(parent, child)
        }
        other => other,
    }
}

/// Refuses to replace a destination that is a symlink.
fn refuse_symlink(parent: &Dir, file_name: &Path, path: &Path) -> Result<(), AtomicWriteError> {
    match parent.symlink_metadata(file_name) {
        Ok(metadata) if metadata.file_type().is_symlink() => Err(AtomicWriteError::Path(
            format!("{}: destination is a symlink", path.display()),
        )),
        _ => Ok(()),
    }
}

/// Maps directory-walk errors onto writer errors.
fn map_open_error(err: &std::io::Error, path: &Path) -> AtomicWriteError {
    if matches!(
        err.kind(),
        ErrorKind::NotFound
            | ErrorKind::InvalidInput
            | ErrorKind::PermissionDenied
            | ErrorKind::NotADirectory
            | ErrorKind::Unsupported
    ) {
        return AtomicWriteError::Path(format!("{}: {err}", path.display()));
    }
    #[cfg(unix)]
    if err.raw_os_error() == Some(ELOOP) {
        return AtomicWriteError::Path(format!("{}: symlink in path", path.display()));
    }
    AtomicWriteError::Io(format!("{}: {err}", path.display()))
}

/// Builds a deterministic temporary file name for atomic writes.
fn temp_file_name(file_name: &Path, attempt: u32) -> PathBuf {
    let mut temp = OsString::from(".tmp-");
    temp.push(file_name.as_os_str());
    temp.push(format!(".{}.{}", std::process::id(), attempt));
    PathBuf::from(temp)
}

/// Flushes the directory entry for the rename where the platform allows it.
fn sync_dir(dir: &Dir) {
    if let Ok(handle) = dir.try_clone() {
        let _ = handle.into_std_file().sync_all();
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known-good values.")]

    use std::fs;

    use super::*;

    #[test]
    fn writes_new_file_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/doc.json");
        write_atomic(&path, b"{}\n").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}\n");
    }

    #[test]
    fn parent_components_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        write_atomic(&dir.path().join("a/./../doc.json"), b"x").unwrap();
        assert_eq!(fs::read(dir.path().join("doc.json")).unwrap(), b"x");
    }

    #[test]
    fn replaces_existing_content_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, b"old content that is longer").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("doc.json")]);
    }

    #[test]
    fn skips_occupied_temp_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let occupied = dir.path().join(temp_file_name(Path::new("doc.json"), 0));
        fs::write(&occupied, b"someone else").unwrap();
        write_atomic(&path, b"ok").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"ok");
        assert_eq!(fs::read(&occupied).unwrap(), b"someone else");
    }

    #[test]
    fn rename_onto_directory_fails_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();
        let err = write_atomic(&path, b"{}").unwrap_err();
        assert!(matches!(err, AtomicWriteError::Rename { .. }), "got {err}");
        assert!(path.join("keep").exists());
        let temps = fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| {
                entry.as_ref().unwrap().file_name().to_string_lossy().starts_with(".tmp-")
            })
            .count();
        assert_eq!(temps, 0);
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let err = write_atomic(Path::new("/"), b"x").unwrap_err();
        assert!(matches!(err, AtomicWriteError::Path(_)));
    }

    #[test]
    fn file_in_place_of_parent_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain"), b"x").unwrap();
        let err = write_atomic(&dir.path().join("plain/doc.json"), b"{}").unwrap_err();
        assert!(matches!(err, AtomicWriteError::Path(_)), "got {err}");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_parent_directory_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        fs::create_dir(&real).unwrap();
        std::os::unix::fs::symlink(&real, dir.path().join("link")).unwrap();
        let result = write_atomic(&dir.path().join("link/doc.json"), b"{}");
        assert!(result.is_err(), "write through symlinked directory succeeded");
        assert!(!real.join("doc.json").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_destination_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("elsewhere.json");
        fs::write(&target, b"keep").unwrap();
        let path = dir.path().join("doc.json");
        std::os::unix::fs::symlink(&target, &path).unwrap();
        let err = write_atomic(&path, b"{}").unwrap_err();
        assert!(matches!(err, AtomicWriteError::Path(_)), "got {err}");
        assert_eq!(fs::read(&target).unwrap(), b"keep");
        assert!(fs::symlink_metadata(&path).unwrap().file_type().is_symlink());
    }

    #[test]
    fn remove_if_present_reports_what_it_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json.minisig");
        fs::write(&path, b"sig").unwrap();
        assert!(remove_if_present(&path).unwrap());
        assert!(!path.exists());
        assert!(!remove_if_present(&path).unwrap());
        assert!(!remove_if_present(&dir.path().join("missing/doc.json.minisig")).unwrap());
    }
}
