#![deny(missing_debug_implementations)]

//! Verified uploads of release artifacts.
//!
//! A client POSTs a multipart form with a project, a version, a `sha512sum`
//! line and the file itself. The server checks the token, validates the
//! names, verifies the digest, and stores the file under
//! `<root>/<project>/<project>-<version>/`. The project's `LATEST` symlink
//! (and `LATEST_RELEASE` for releases) is then moved to the new version, and
//! compressed tarballs are optionally unpacked next to the artifact.
//!
//! ```no_run
//! use distfiles_upload::{server, Settings, UploadPipeline};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::new("s3cret", "/srv/distfiles");
//! settings.prepare()?;
//!
//! let pipeline = Arc::new(UploadPipeline::new(Arc::new(settings)));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await?;
//! server::serve(listener, server::router(pipeline)).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod digest;
pub mod error;
pub mod form;
pub mod pipeline;
pub mod server;
pub mod store;

pub use config::{ConfigError, Settings};
pub use digest::DigestLine;
pub use error::UploadError;
pub use pipeline::UploadPipeline;
pub use store::{ArtifactLocation, ArtifactStore};
