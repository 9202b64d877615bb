//! On-disk artifact layout and the `LATEST` / `LATEST_RELEASE` pointers.
//!
//! ```text
//! <root>/<project>/<project>-<version>/<filename>
//! <root>/<project>/<project>-<version>/<filename>.sha512
//! <root>/<project>/LATEST          -> <project>-<version>
//! <root>/<project>/LATEST_RELEASE  -> <project>-<version>
//! ```

use dashmap::DashMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub const LATEST: &str = "LATEST";
pub const LATEST_RELEASE: &str = "LATEST_RELEASE";
pub const SIDECAR_EXTENSION: &str = "sha512";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create {}", .path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write digest file")]
    Sidecar(#[source] io::Error),

    #[error("failed to rewind upload")]
    Seek(#[source] io::Error),

    #[error("failed to create artifact")]
    FileCreate(#[source] io::Error),

    #[error("failed to copy artifact")]
    FileCopy(#[source] io::Error),

    #[error("failed to flush artifact")]
    FileClose(#[source] io::Error),

    #[error("failed to update {name} pointer")]
    Pointer {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Stable tag reported to the client.
    pub fn tag(&self) -> &'static str {
        match self {
            StoreError::DirectoryCreate { .. } => "DIRECTORY_CREATE",
            StoreError::Sidecar(_) => "SHA512_FILE",
            StoreError::Seek(_) => "SEEK",
            StoreError::FileCreate(_) => "FILE_CREATE",
            StoreError::FileCopy(_) => "FILE_COPY",
            StoreError::FileClose(_) => "FILE_CLOSE",
            StoreError::Pointer { name, .. } => *name,
        }
    }
}

/// Where one uploaded artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub project: String,
    pub version_tag: String,
    pub directory: PathBuf,
    pub artifact: PathBuf,
    pub sidecar: PathBuf,
}

/// `<project>-<version>`, the name of a version directory.
pub fn version_tag(project: &str, version: &str) -> String {
    format!("{project}-{version}")
}

#[derive(Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.root.join(project)
    }

    pub fn location(&self, project: &str, version: &str, filename: &str) -> ArtifactLocation {
        let version_tag = version_tag(project, version);
        let directory = self.project_dir(project).join(&version_tag);
        ArtifactLocation {
            project: project.to_string(),
            artifact: directory.join(filename),
            sidecar: directory.join(format!("{filename}.{SIDECAR_EXTENSION}")),
            directory,
            version_tag,
        }
    }

    /// Serialize writers of one project. The guard must be held across
    /// [`persist`](Self::persist), [`repoint`](Self::repoint) and any
    /// extraction into the version directory.
    pub async fn lock(&self, project: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(project.to_string())
            .or_default()
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Write the digest sidecar and then the artifact itself.
    pub fn persist(
        &self,
        location: &ArtifactLocation,
        content: &mut File,
        digest_line: &str,
    ) -> Result<(), StoreError> {
        fs_err::create_dir_all(&location.directory).map_err(|source| {
            StoreError::DirectoryCreate {
                path: location.directory.clone(),
                source,
            }
        })?;

        fs_err::write(&location.sidecar, digest_line).map_err(StoreError::Sidecar)?;

        content.seek(SeekFrom::Start(0)).map_err(StoreError::Seek)?;
        let mut artifact = fs_err::File::create(&location.artifact).map_err(StoreError::FileCreate)?;
        io::copy(content, &mut artifact).map_err(StoreError::FileCopy)?;
        artifact.flush().map_err(StoreError::FileClose)?;
        artifact.sync_all().map_err(StoreError::FileClose)?;

        tracing::debug!("stored {}", location.artifact.display());
        Ok(())
    }

    /// Point `LATEST`, and `LATEST_RELEASE` when `release` is set, at `version_tag`.
    pub fn repoint(&self, project: &str, version_tag: &str, release: bool) -> Result<(), StoreError> {
        let project_dir = self.project_dir(project);

        swap_pointer(&project_dir, LATEST, version_tag)
            .map_err(|source| StoreError::Pointer { name: LATEST, source })?;

        if release {
            swap_pointer(&project_dir, LATEST_RELEASE, version_tag).map_err(|source| {
                StoreError::Pointer {
                    name: LATEST_RELEASE,
                    source,
                }
            })?;
        }

        Ok(())
    }
}

/// Replace `dir/name` with a symlink to `target` in one rename, so readers
/// never observe a missing pointer.
fn swap_pointer(dir: &Path, name: &str, target: &str) -> io::Result<()> {
    let temporary = tempfile::Builder::new()
        .prefix(&format!(".{name}."))
        .make_in(dir, |path| symlink(target, path))?;

    temporary.persist(dir.join(name)).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> io::Result<()> {
    fs_err::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &str, link: &Path) -> io::Result<()> {
    fs_err::os::windows::fs::symlink_dir(target, link)
}
