//! Async archive extraction using tokio

use crate::{
    error::{ArchiveError, Result},
    extractor::{ExtractSummary, Extractor, ExtractorBuilder},
    format::ArchiveFormat,
};
use std::io::{Read, Seek};
use std::path::Path;
use tokio::task;

/// Builder for configuring async archive extraction
#[derive(Debug, Clone, Default)]
pub struct AsyncExtractorBuilder {
    inner: ExtractorBuilder,
}

impl AsyncExtractorBuilder {
    /// Create a new async extractor builder
    pub fn new() -> Self {
        Self {
            inner: ExtractorBuilder::new(),
        }
    }

    /// Set the archive format explicitly (bypassing sniffing)
    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.inner = self.inner.with_format(format);
        self
    }

    /// Whether hard link entries are materialized or rejected
    pub fn with_hard_links(mut self, allow: bool) -> Self {
        self.inner = self.inner.with_hard_links(allow);
        self
    }

    /// Build the async extractor
    pub fn build(self) -> AsyncExtractor {
        AsyncExtractor {
            inner: self.inner.build(),
        }
    }
}

/// Async archive extractor
#[derive(Debug, Clone, Default)]
pub struct AsyncExtractor {
    inner: Extractor,
}

impl AsyncExtractor {
    /// Extract a compressed tar stream into `destination` on the blocking pool
    pub async fn extract<R>(&self, reader: R, destination: &Path) -> Result<ExtractSummary>
    where
        R: Read + Seek + Send + 'static,
    {
        let destination = destination.to_owned();
        let inner = self.inner.clone();

        task::spawn_blocking(move || inner.extract(reader, &destination))
            .await
            .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
    }
}
