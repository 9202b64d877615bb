//! Decoded view of a single tar record

use crate::error::{ArchiveError, Result};
use filetime::FileTime;
use std::io::Read;
use std::path::PathBuf;
use tar::EntryType;

/// Entry kinds the extractor knows how to materialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
    Symlink,
    HardLink,
}

impl EntryKind {
    /// Map a tar type flag onto a supported kind, `None` for anything else
    /// (fifos, devices, global pax headers, sparse files, ...)
    pub fn from_entry_type(entry_type: EntryType) -> Option<Self> {
        if entry_type.is_dir() {
            Some(Self::Directory)
        } else if entry_type.is_file() {
            Some(Self::RegularFile)
        } else if entry_type.is_symlink() {
            Some(Self::Symlink)
        } else if entry_type.is_hard_link() {
            Some(Self::HardLink)
        } else {
            None
        }
    }
}

/// Metadata of one archive entry, read before its body is consumed
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub kind: EntryKind,
    /// Name as recorded in the archive, not yet sanitized
    pub name: PathBuf,
    /// Permission bits only (`0o777` mask)
    pub mode: u32,
    pub mtime: FileTime,
    /// Target for symlinks and hard links
    pub link_target: Option<PathBuf>,
}

impl ArchiveEntry {
    /// Read the metadata of `entry`. Returns `Ok(None)` for unsupported kinds.
    pub fn from_tar<R: Read>(entry: &tar::Entry<'_, R>) -> Result<Option<Self>> {
        let header = entry.header();
        let Some(kind) = EntryKind::from_entry_type(header.entry_type()) else {
            return Ok(None);
        };

        let name = entry
            .path()
            .map_err(ArchiveError::corrupt_archive)?
            .into_owned();
        let mode = header.mode().map_err(ArchiveError::corrupt_archive)? & 0o777;
        let mtime = header.mtime().map_err(ArchiveError::corrupt_archive)?;
        let mtime = i64::try_from(mtime).map_err(ArchiveError::corrupt_archive)?;

        let link_target = match kind {
            EntryKind::Symlink | EntryKind::HardLink => {
                let target = entry
                    .link_name()
                    .map_err(ArchiveError::corrupt_archive)?
                    .ok_or_else(|| {
                        ArchiveError::corrupt_archive(format!(
                            "link entry {} has no target",
                            name.display()
                        ))
                    })?;
                Some(target.into_owned())
            }
            EntryKind::Directory | EntryKind::RegularFile => None,
        };

        Ok(Some(Self {
            kind,
            name,
            mode,
            mtime: FileTime::from_unix_time(mtime, 0),
            link_target,
        }))
    }
}
