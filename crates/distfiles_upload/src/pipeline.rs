//! # Upload pipeline
//!
//! ```text
//! Authenticate → ParseForm → ValidateNaming → VerifyIntegrity
//!     → Persist → Repoint → ExtractIfRequested
//! ```
//!
//! Each step either succeeds or ends the request with an [`UploadError`].
//! Nothing is rolled back: a failed extraction leaves the stored artifact and
//! the updated pointers in place.

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::Multipart;
use axum::http::HeaderMap;
use distfiles_archive::{ExtractSummary, Extractor};
use tokio::task;

use crate::auth::authenticate;
use crate::config::Settings;
use crate::digest;
use crate::error::UploadError;
use crate::form::{UploadForm, UploadRequest};
use crate::store::{ArtifactLocation, ArtifactStore};

#[derive(Debug)]
pub struct UploadPipeline {
    settings: Arc<Settings>,
    store: Arc<ArtifactStore>,
    extractor: Extractor,
}

impl UploadPipeline {
    pub fn new(settings: Arc<Settings>) -> Self {
        let store = Arc::new(ArtifactStore::new(&settings.storage_dir));
        Self {
            settings,
            store,
            extractor: Extractor::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run every step for one HTTP request.
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        multipart: Result<Multipart, MultipartRejection>,
    ) -> Result<ArtifactLocation, UploadError> {
        authenticate(headers, &self.settings.auth_token)?;

        let multipart = multipart.map_err(|err| UploadError::Multipart(err.body_text()))?;
        let form = UploadForm::read(multipart, &self.settings.storage_dir).await?;
        let request = UploadRequest::from_form(form)?;

        self.ingest(request).await
    }

    /// Verify, store and optionally unpack an already validated request.
    pub async fn ingest(&self, request: UploadRequest) -> Result<ArtifactLocation, UploadError> {
        let UploadRequest {
            project,
            version,
            digest,
            content,
            release,
            extract,
        } = request;

        let expected = *digest.digest();
        let content = task::spawn_blocking(move || -> Result<File, UploadError> {
            let mut content = content;
            content.seek(SeekFrom::Start(0)).map_err(UploadError::Hashing)?;
            digest::verify(&mut content, &expected)?;
            Ok(content)
        })
        .await??;

        let location = self.store.location(&project, &version, digest.filename());
        let guard = self.store.lock(&project).await;

        // the guard travels with the blocking work so that a dropped request
        // cannot release the project while files are still being written
        let summary = {
            let store = Arc::clone(&self.store);
            let extractor = self.extractor.clone();
            let location = location.clone();
            let digest_line = digest.as_str().to_string();
            task::spawn_blocking(move || -> Result<Option<ExtractSummary>, UploadError> {
                let _guard = guard;
                let mut content = content;
                store.persist(&location, &mut content, &digest_line)?;
                store.repoint(&location.project, &location.version_tag, release)?;
                tracing::info!(
                    project = %location.project,
                    version = %location.version_tag,
                    release,
                    "stored {}",
                    location.artifact.display()
                );

                if !extract {
                    return Ok(None);
                }
                Ok(Some(extractor.extract(content, &location.directory)?))
            })
            .await??
        };

        if let Some(summary) = summary {
            tracing::info!(
                format = summary.format.name(),
                entries = summary.entries,
                "extracted {} into {}",
                digest.filename(),
                location.directory.display()
            );
        }

        Ok(location)
    }
}
