//! Server settings, built once at startup and shared by reference.

use std::path::PathBuf;

/// Default ceiling for a whole multipart request body.
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 512 * 1024 * 1024;

/// Default HTTP Basic realm.
pub const DEFAULT_AUTH_REALM: &str = "distfiles";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("storage directory {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Realm announced in `WWW-Authenticate` challenges.
    pub auth_realm: String,
    /// Shared secret; callers send it as the Basic auth username.
    pub auth_token: String,
    /// Root of the `<project>/<project>-<version>/` tree.
    pub storage_dir: PathBuf,
    pub max_upload_size: usize,
}

impl Settings {
    pub fn new(auth_token: impl Into<String>, storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            auth_realm: DEFAULT_AUTH_REALM.to_string(),
            auth_token: auth_token.into(),
            storage_dir: storage_dir.into(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    /// Reject unusable values and create the storage directory if it is absent.
    pub fn prepare(&self) -> Result<(), ConfigError> {
        if self.auth_realm.is_empty() {
            return Err(ConfigError::Empty("auth realm"));
        }
        if self.auth_token.is_empty() {
            return Err(ConfigError::Empty("auth token"));
        }

        match fs_err::metadata(&self.storage_dir) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(ConfigError::NotADirectory(self.storage_dir.clone())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("creating storage directory {}", self.storage_dir.display());
                fs_err::create_dir_all(&self.storage_dir)?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_prepare_creates_storage_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let settings = Settings::new("secret", scratch.path().join("nested/data"));

        settings.prepare().unwrap();

        assert!(scratch.path().join("nested/data").is_dir());
    }

    #[test]
    fn test_prepare_rejects_file_as_storage_dir() {
        let scratch = tempfile::tempdir().unwrap();
        let path = scratch.path().join("data");
        fs_err::write(&path, "not a directory").unwrap();

        assert_matches!(
            Settings::new("secret", &path).prepare(),
            Err(ConfigError::NotADirectory(p)) if p == path
        );
    }

    #[test]
    fn test_prepare_rejects_empty_token() {
        let scratch = tempfile::tempdir().unwrap();
        assert_matches!(
            Settings::new("", scratch.path()).prepare(),
            Err(ConfigError::Empty("auth token"))
        );
    }
}
