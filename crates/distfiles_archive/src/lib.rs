//! Compression sniffing and hardened tar extraction
//!
//! This crate unpacks compressed tarballs uploaded to a distfiles server into
//! a destination directory that may already hold unrelated content.
//!
//! # Features
//!
//! - Format detection from magic bytes: gzip, bzip2, xz and legacy lzma
//! - Directories, regular files, symlinks and hard links, with permission bits
//!   and modification times restored
//! - Entries containing `..`, escaping symlinks and writes through links that
//!   resolve outside the destination are rejected
//! - Both sync and async APIs
//!
//! # Examples
//!
//! ```no_run
//! use distfiles_archive::ExtractorBuilder;
//! use std::path::Path;
//!
//! let extractor = ExtractorBuilder::new().build();
//! let archive = std::fs::File::open("pkg-1.0.tar.xz")?;
//!
//! extractor.extract(archive, Path::new("output_dir"))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod entry;
pub mod error;
pub mod extractor;
pub mod format;
pub mod sanitize;

#[cfg(feature = "tokio")]
pub mod r#async;

pub use entry::{ArchiveEntry, EntryKind};
pub use error::{ArchiveError, Result};
pub use extractor::{ExtractSummary, Extractor, ExtractorBuilder};
pub use format::ArchiveFormat;

#[cfg(feature = "tokio")]
pub use r#async::{AsyncExtractor, AsyncExtractorBuilder};
