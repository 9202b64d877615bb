//! Multipart form decoding and request validation.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;

use crate::digest::DigestLine;
use crate::error::UploadError;
use crate::store::version_tag;

/// Name of the multipart part carrying the artifact.
pub const FILE_FIELD: &str = "file";

/// Largest text field kept in memory.
pub const MAX_FIELD_LEN: usize = 64 * 1024;

/// Shortest accepted artifact filename.
pub const MIN_FILENAME_LEN: usize = 4;

/// A file part spooled to an anonymous temporary file.
#[derive(Debug)]
pub struct UploadedFile {
    /// Filename declared in the part's `Content-Disposition`.
    pub name: String,
    pub content: File,
}

/// Raw multipart fields, before any validation.
#[derive(Debug, Default)]
pub struct UploadForm {
    values: HashMap<String, Vec<String>>,
    files: Vec<UploadedFile>,
}

impl UploadForm {
    /// Drain `multipart`, keeping text fields in memory and spooling `file`
    /// parts into `spool_dir`. Parts that carry a filename under any other
    /// name are dropped.
    pub async fn read(mut multipart: Multipart, spool_dir: &Path) -> Result<Self, UploadError> {
        let mut form = Self::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|err| UploadError::Multipart(err.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let mut value = Vec::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|err| UploadError::Multipart(err.body_text()))?
                {
                    if value.len() + chunk.len() > MAX_FIELD_LEN {
                        return Err(UploadError::Multipart(format!(
                            "field {name:?} is larger than {MAX_FIELD_LEN} bytes"
                        )));
                    }
                    value.extend_from_slice(&chunk);
                }
                let value = String::from_utf8(value).map_err(|_| {
                    UploadError::Multipart(format!("field {name:?} is not valid UTF-8"))
                })?;
                form.push_value(name, value);
                continue;
            };
            if name != FILE_FIELD {
                tracing::debug!("ignoring file part {name:?}");
                continue;
            }

            let spool = tempfile::tempfile_in(spool_dir).map_err(UploadError::Buffer)?;
            let mut spool = tokio::fs::File::from_std(spool);
            while let Some(chunk) = field
                .chunk()
                .await
                .map_err(|err| UploadError::Multipart(err.body_text()))?
            {
                spool.write_all(&chunk).await.map_err(UploadError::Buffer)?;
            }
            spool.flush().await.map_err(UploadError::Buffer)?;

            form.push_file(UploadedFile {
                name: file_name,
                content: spool.into_std().await,
            });
        }

        Ok(form)
    }

    pub fn push_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    pub fn push_file(&mut self, file: UploadedFile) {
        self.files.push(file);
    }

    /// The value of a field that must appear exactly once.
    pub fn single(&self, name: &'static str) -> Result<&str, UploadError> {
        match self.values.get(name).map(Vec::as_slice) {
            Some([value]) => Ok(value.as_str()),
            _ => Err(UploadError::Field(name)),
        }
    }

    /// A boolean flag: set when the field appears once with `1` or `true`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.values.get(name).map(Vec::as_slice),
            Some([value]) if value == "1" || value == "true"
        )
    }

    fn take_file(&mut self) -> Result<UploadedFile, UploadError> {
        match self.files.len() {
            0 => Err(UploadError::MissingFile),
            1 => Ok(self.files.remove(0)),
            _ => Err(UploadError::RepeatedFile),
        }
    }
}

/// A fully validated upload, ready to be verified and stored.
#[derive(Debug)]
pub struct UploadRequest {
    pub project: String,
    pub version: String,
    pub digest: DigestLine,
    pub content: File,
    pub release: bool,
    pub extract: bool,
}

impl UploadRequest {
    /// Check field presence and naming rules, in the order clients see them.
    pub fn from_form(mut form: UploadForm) -> Result<Self, UploadError> {
        let project = form.single("project")?.to_string();
        let version = form.single("version")?.to_string();
        let digest_line = form.single("sha512")?;

        if !is_path_segment(&project) {
            return Err(UploadError::ProjectName(project));
        }
        if !is_path_segment(&version) {
            return Err(UploadError::Version(version));
        }

        let digest = DigestLine::parse(digest_line)?;
        let filename = digest.filename();
        if filename.len() < MIN_FILENAME_LEN {
            return Err(UploadError::FilenameLength(filename.to_string()));
        }
        if filename.contains(['/', '\\']) {
            return Err(UploadError::FilenameSeparator(filename.to_string()));
        }

        let file = form.take_file()?;
        if file.name != filename {
            return Err(UploadError::FilenameMismatch {
                declared: filename.to_string(),
                uploaded: file.name,
            });
        }

        Ok(Self {
            release: form.flag("release"),
            extract: form.flag("extract"),
            project,
            version,
            digest,
            content: file.content,
        })
    }

    pub fn filename(&self) -> &str {
        self.digest.filename()
    }

    pub fn version_tag(&self) -> String {
        version_tag(&self.project, &self.version)
    }
}

/// Project and version names become directory names.
fn is_path_segment(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains(['/', '\\', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    const HELLO_SHA512: &str = "9b71d224bd62f3785d96d46ad3ea3d73319bfbc2890caadae2dff72519673ca72323c3d99ba5c11d7c7acc6e14b8c5da0c4663475c2e5c3adef46f73bcdec043";

    fn form(filename: &str) -> UploadForm {
        let mut form = UploadForm::default();
        form.push_value("project", "demo");
        form.push_value("version", "1.0");
        form.push_value("sha512", format!("{HELLO_SHA512} *{filename}"));
        form.push_file(UploadedFile {
            name: filename.to_string(),
            content: tempfile::tempfile().unwrap(),
        });
        form
    }

    #[test]
    fn test_valid_form() {
        let mut form = form("hello.txt");
        form.push_value("release", "true");
        form.push_value("extract", "0");

        let request = UploadRequest::from_form(form).unwrap();
        assert_eq!(request.project, "demo");
        assert_eq!(request.version, "1.0");
        assert_eq!(request.version_tag(), "demo-1.0");
        assert_eq!(request.filename(), "hello.txt");
        assert!(request.release);
        assert!(!request.extract);
    }

    #[rstest]
    #[case("project")]
    #[case("version")]
    #[case("sha512")]
    fn test_repeated_field(#[case] name: &'static str) {
        let mut form = form("hello.txt");
        form.push_value(name, "again");
        assert_matches!(UploadRequest::from_form(form), Err(UploadError::Field(n)) if n == name);
    }

    #[test]
    fn test_missing_field() {
        let mut form = UploadForm::default();
        form.push_value("project", "demo");
        assert_matches!(
            UploadRequest::from_form(form),
            Err(UploadError::Field("version"))
        );
    }

    #[rstest]
    #[case("..")]
    #[case("a/b")]
    #[case("a\\b")]
    #[case("")]
    fn test_project_must_be_a_path_segment(#[case] project: &str) {
        let mut form = form("hello.txt");
        form.values.insert("project".into(), vec![project.into()]);
        assert_matches!(
            UploadRequest::from_form(form),
            Err(UploadError::ProjectName(_))
        );
    }

    #[test]
    fn test_version_must_be_a_path_segment() {
        let mut form = form("hello.txt");
        form.values.insert("version".into(), vec!["../../etc".into()]);
        assert_matches!(UploadRequest::from_form(form), Err(UploadError::Version(_)));
    }

    #[test]
    fn test_filename_rules() {
        assert_matches!(
            UploadRequest::from_form(form("a.c")),
            Err(UploadError::FilenameLength(_))
        );
        assert_matches!(
            UploadRequest::from_form(form("dir/hello.txt")),
            Err(UploadError::FilenameSeparator(_))
        );
        assert_matches!(
            UploadRequest::from_form(form("dir\\hello.txt")),
            Err(UploadError::FilenameSeparator(_))
        );
    }

    #[test]
    fn test_file_part_rules() {
        let mut missing = form("hello.txt");
        missing.files.clear();
        assert_matches!(UploadRequest::from_form(missing), Err(UploadError::MissingFile));

        let mut repeated = form("hello.txt");
        repeated.push_file(UploadedFile {
            name: "hello.txt".into(),
            content: tempfile::tempfile().unwrap(),
        });
        assert_matches!(
            UploadRequest::from_form(repeated),
            Err(UploadError::RepeatedFile)
        );

        let mut renamed = form("hello.txt");
        renamed.files[0].name = "other.txt".into();
        assert_matches!(
            UploadRequest::from_form(renamed),
            Err(UploadError::FilenameMismatch { declared, uploaded })
                if declared == "hello.txt" && uploaded == "other.txt"
        );
    }

    #[rstest]
    #[case(&["1"], true)]
    #[case(&["true"], true)]
    #[case(&["yes"], false)]
    #[case(&["TRUE"], false)]
    #[case(&["1", "1"], false)]
    #[case(&[], false)]
    fn test_flags(#[case] values: &[&str], #[case] expected: bool) {
        let mut form = UploadForm::default();
        for value in values {
            form.push_value("release", *value);
        }
        assert_eq!(form.flag("release"), expected);
    }
}
