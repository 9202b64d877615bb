//! # Upload errors
//!
//! Every failure maps to an HTTP status and a short, stable tag that clients
//! can match on. The tag is the whole response body; the detail goes to the
//! server log.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use distfiles_archive::ArchiveError;
use thiserror::Error;

use crate::digest::{MalformedDigestLine, VerifyError};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("missing credentials")]
    MissingCredentials,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("field `{0}` is missing or repeated")]
    Field(&'static str),

    #[error("invalid project name {0:?}")]
    ProjectName(String),

    #[error("invalid version {0:?}")]
    Version(String),

    #[error(transparent)]
    DigestLine(#[from] MalformedDigestLine),

    #[error("filename {0:?} is shorter than 4 characters")]
    FilenameLength(String),

    #[error("filename {0:?} contains a path separator")]
    FilenameSeparator(String),

    #[error("no file part in upload")]
    MissingFile,

    #[error("more than one file part in upload")]
    RepeatedFile,

    #[error("uploaded file {uploaded:?} does not match digest line filename {declared:?}")]
    FilenameMismatch { declared: String, uploaded: String },

    #[error("{0}")]
    DigestMismatch(String),

    #[error("failed to hash upload")]
    Hashing(#[source] std::io::Error),

    #[error("failed to buffer upload")]
    Buffer(#[source] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("extraction failed")]
    Extraction(#[from] ArchiveError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<VerifyError> for UploadError {
    fn from(err: VerifyError) -> Self {
        match err {
            mismatch @ VerifyError::Mismatch { .. } => UploadError::DigestMismatch(mismatch.to_string()),
            VerifyError::Io(err) => UploadError::Hashing(err),
        }
    }
}

impl UploadError {
    /// Stable tag sent as the response body.
    pub fn tag(&self) -> &'static str {
        match self {
            UploadError::MissingCredentials => "NOAUTH",
            UploadError::InvalidCredentials => "BADAUTH",
            UploadError::Multipart(_) | UploadError::RepeatedFile => "BADFORM_FILE",
            UploadError::Field(_) => "BADFORM",
            UploadError::ProjectName(_) => "BADFORM_PROJECT",
            UploadError::Version(_) => "BADFORM_VERSION",
            UploadError::DigestLine(_) => "BADFORM_SHA512",
            UploadError::FilenameLength(_) => "BADFORM_FILENAME_LENGTH",
            UploadError::FilenameSeparator(_) => "BADFORM_FILENAME_SLASH",
            UploadError::MissingFile => "BADFORM_NOFILE",
            UploadError::FilenameMismatch { .. } => "BADFORM_SHA512_FILENAME",
            UploadError::DigestMismatch(_) => "BADFORM_SHA512_HASH",
            UploadError::Hashing(_) => "SHA512_SUM",
            UploadError::Buffer(_) => "UPLOAD_BUFFER",
            UploadError::Storage(err) => err.tag(),
            UploadError::Extraction(_) => "EXTRACT",
            UploadError::Task(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MissingCredentials | UploadError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            UploadError::Hashing(_)
            | UploadError::Buffer(_)
            | UploadError::Storage(_)
            | UploadError::Extraction(_)
            | UploadError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Log the failure with its full cause chain.
    fn log(&self) {
        let mut detail = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            detail.push_str(": ");
            detail.push_str(&cause.to_string());
            source = cause.source();
        }

        if self.status().is_server_error() {
            tracing::error!(tag = self.tag(), "upload failed: {detail}");
        } else {
            tracing::warn!(tag = self.tag(), "upload rejected: {detail}");
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        self.log();
        (
            self.status(),
            [(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            )],
            format!("{}\n", self.tag()),
        )
            .into_response()
    }
}
