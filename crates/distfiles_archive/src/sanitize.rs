//! Path checks applied to archive entry names and link targets

use crate::error::{ArchiveError, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize an entry name into a path relative to the destination.
///
/// Leading `/`, prefixes and `.` components are dropped. Any `..` component
/// rejects the entry. Returns `Ok(None)` when nothing is left (e.g. `./`).
pub fn normalize_entry_path(path: &Path) -> Result<Option<PathBuf>> {
    let mut result = PathBuf::with_capacity(path.as_os_str().len());

    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                return Err(ArchiveError::unsafe_path(path, "parent directory segment"))
            }
            Component::Normal(part) => result.push(part),
        }
    }

    if result.as_os_str().is_empty() {
        return Ok(None);
    }

    Ok(Some(result))
}

/// Check that a symlink created in `parent` pointing at `target` resolves
/// inside `root`.
///
/// `root` and `parent` must already be canonical. The target is walked one
/// component at a time against the real tree, so links laid down by earlier
/// entries are followed the way the kernel would follow them.
pub fn validate_symlink_target(root: &Path, parent: &Path, target: &Path) -> Result<()> {
    let escapes = || ArchiveError::unsafe_path(target, "symlink target escapes destination");
    let mut current = parent.to_path_buf();

    for component in target.components() {
        match component {
            Component::Prefix(..) | Component::RootDir => {
                return Err(ArchiveError::unsafe_path(target, "absolute symlink target"));
            }
            Component::CurDir => {}
            Component::ParentDir => {
                current.pop();
            }
            Component::Normal(part) => {
                current.push(part);
                if fs_err::symlink_metadata(&current).is_ok() {
                    current = fs_err::canonicalize(&current).map_err(|_| {
                        ArchiveError::unsafe_path(target, "symlink target crosses a dangling link")
                    })?;
                }
            }
        }

        if !current.starts_with(root) {
            return Err(escapes());
        }
    }

    Ok(())
}

/// Verify that the closest existing ancestor of `path` resolves inside `root`.
///
/// `root` must already be canonical. Symlinks created by earlier entries are
/// followed, so an entry cannot be written through a link pointing outside.
pub fn ensure_contained(root: &Path, path: &Path) -> Result<()> {
    let mut existing = path;
    while fs_err::symlink_metadata(existing).is_err() {
        existing = match existing.parent() {
            Some(parent) => parent,
            None => break,
        };
    }

    let resolved = fs_err::canonicalize(existing)?;
    if !resolved.starts_with(root) {
        return Err(ArchiveError::unsafe_path(path, "resolves outside destination"));
    }

    Ok(())
}
