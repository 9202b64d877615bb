//! Main extractor implementation

use crate::{
    entry::{ArchiveEntry, EntryKind},
    error::{ArchiveError, Result},
    format::ArchiveFormat,
    sanitize::{ensure_contained, normalize_entry_path, validate_symlink_target},
};
use filetime::FileTime;
use std::{
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// Upper bound on the buffer reserved up front for a regular file
const PREALLOC_LIMIT: u64 = 1 << 20;

/// Builder for configuring archive extraction
#[derive(Debug, Clone)]
pub struct ExtractorBuilder {
    format: Option<ArchiveFormat>,
    allow_hard_links: bool,
}

impl ExtractorBuilder {
    /// Create a new extractor builder
    pub fn new() -> Self {
        Self {
            format: None,
            allow_hard_links: true,
        }
    }

    /// Set the archive format explicitly (bypassing sniffing)
    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Whether hard link entries are materialized or rejected
    pub fn with_hard_links(mut self, allow: bool) -> Self {
        self.allow_hard_links = allow;
        self
    }

    /// Build the extractor
    pub fn build(self) -> Extractor {
        Extractor {
            format: self.format,
            allow_hard_links: self.allow_hard_links,
        }
    }
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What a successful extraction did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub format: ArchiveFormat,
    /// Entries written to the destination
    pub entries: usize,
    /// Entries of unsupported kinds that were ignored
    pub skipped: usize,
}

/// Archive extractor
#[derive(Debug, Clone)]
pub struct Extractor {
    pub(crate) format: Option<ArchiveFormat>,
    allow_hard_links: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        ExtractorBuilder::new().build()
    }
}

impl Extractor {
    /// Extract a compressed tar stream into `destination`.
    ///
    /// Entries are replayed in stream order. The first failure aborts the
    /// extraction; entries written before it are left in place.
    pub fn extract<R: Read + Seek>(&self, mut reader: R, destination: &Path) -> Result<ExtractSummary> {
        let format = match self.format {
            Some(format) => {
                reader.seek(SeekFrom::Start(0))?;
                format
            }
            None => ArchiveFormat::sniff(&mut reader)?,
        };

        fs_err::create_dir_all(destination)?;
        let root = fs_err::canonicalize(destination)?;

        let mut archive = tar::Archive::new(format.decoder(reader)?);
        let mut directory_times: Vec<(PathBuf, FileTime)> = Vec::new();
        let mut summary = ExtractSummary {
            format,
            entries: 0,
            skipped: 0,
        };

        for entry in archive.entries().map_err(ArchiveError::corrupt_archive)? {
            let mut entry = entry.map_err(ArchiveError::corrupt_archive)?;

            let Some(meta) = ArchiveEntry::from_tar(&entry)? else {
                tracing::trace!(
                    "skipping unsupported entry type {:?}",
                    entry.header().entry_type()
                );
                summary.skipped += 1;
                continue;
            };
            let Some(relative) = normalize_entry_path(&meta.name)? else {
                continue;
            };

            let target = root.join(&relative);
            let parent = target.parent().unwrap_or(&root);
            ensure_contained(&root, parent)?;
            fs_err::create_dir_all(parent)?;

            remove_existing(&target)?;

            match meta.kind {
                EntryKind::Directory => {
                    fs_err::create_dir(&target)?;
                    set_mode(&target, meta.mode)?;
                    // children written later would bump the mtime again
                    directory_times.push((target, meta.mtime));
                }
                EntryKind::RegularFile => {
                    // the header size is untrusted, so it only seeds the buffer
                    let declared = entry.size();
                    let mut data = Vec::with_capacity(declared.min(PREALLOC_LIMIT) as usize);
                    entry
                        .read_to_end(&mut data)
                        .map_err(ArchiveError::corrupt_archive)?;
                    if data.len() as u64 != declared {
                        return Err(ArchiveError::corrupt_archive(format!(
                            "{} is truncated: expected {declared} bytes, found {}",
                            meta.name.display(),
                            data.len()
                        )));
                    }
                    fs_err::write(&target, &data)?;
                    set_mode(&target, meta.mode)?;
                    set_mtime(&target, meta.mtime)?;
                }
                EntryKind::Symlink => {
                    let link_target = link_target(&meta)?;
                    let resolved_parent = fs_err::canonicalize(parent)?;
                    validate_symlink_target(&root, &resolved_parent, link_target)?;
                    symlink(link_target, &target)?;
                }
                EntryKind::HardLink => {
                    if !self.allow_hard_links {
                        return Err(ArchiveError::unsafe_path(&meta.name, "hard links are disabled"));
                    }
                    let link_target = link_target(&meta)?;
                    if link_target.has_root() {
                        return Err(ArchiveError::unsafe_path(link_target, "absolute hard link target"));
                    }
                    let source = normalize_entry_path(link_target)?
                        .map(|source| root.join(source))
                        .ok_or_else(|| ArchiveError::unsafe_path(link_target, "empty hard link target"))?;
                    ensure_contained(&root, &source)?;
                    fs_err::hard_link(&source, &target)?;
                }
            }

            tracing::trace!("extracted {:?} {}", meta.kind, relative.display());
            summary.entries += 1;
        }

        for (path, mtime) in directory_times {
            if let Err(err) = filetime::set_file_mtime(&path, mtime) {
                tracing::warn!("could not restore mtime of {}: {err}", path.display());
            }
        }

        tracing::debug!(
            format = format.name(),
            entries = summary.entries,
            skipped = summary.skipped,
            "extracted archive into {}",
            root.display()
        );

        Ok(summary)
    }
}

fn link_target(entry: &ArchiveEntry) -> Result<&Path> {
    entry
        .link_target
        .as_deref()
        .ok_or_else(|| ArchiveError::corrupt_archive(format!("{} has no link target", entry.name.display())))
}

/// Clear whatever occupies `path` without following symlinks
fn remove_existing(path: &Path) -> Result<()> {
    match fs_err::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs_err::remove_dir_all(path)?,
        Ok(_) => fs_err::remove_file(path)?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn set_mtime(path: &Path, mtime: FileTime) -> Result<()> {
    filetime::set_file_mtime(path, mtime).map_err(|err| {
        ArchiveError::Io(io::Error::new(
            err.kind(),
            format!("failed to set mtime of {}: {err}", path.display()),
        ))
    })
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs_err::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    fs_err::os::unix::fs::symlink(target, link)?;
    Ok(())
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> Result<()> {
    fs_err::os::windows::fs::symlink_file(target, link)?;
    Ok(())
}
