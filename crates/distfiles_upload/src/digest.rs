//! SHA-512 digest lines and content verification.
//!
//! A digest line is what `sha512sum` prints: 128 lowercase hex characters, a
//! space, a mode marker (`*` for binary, space for text) and the file name.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha512};
use std::io::{self, Read};

static DIGEST_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9a-f]{128}) (\*| )(.+)$").expect("valid regex"));

/// Size of a SHA-512 digest in bytes.
pub const DIGEST_LEN: usize = 64;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed sha512 digest line")]
pub struct MalformedDigestLine;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("sha512 mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },

    #[error("failed to read content: {0}")]
    Io(#[from] io::Error),
}

/// A parsed digest line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLine {
    line: String,
    digest: [u8; DIGEST_LEN],
    filename: String,
}

impl DigestLine {
    pub fn parse(line: &str) -> Result<Self, MalformedDigestLine> {
        let captures = DIGEST_LINE.captures(line).ok_or(MalformedDigestLine)?;

        let mut digest = [0u8; DIGEST_LEN];
        hex::decode_to_slice(&captures[1], &mut digest).map_err(|_| MalformedDigestLine)?;

        Ok(Self {
            line: line.to_string(),
            digest,
            filename: captures[3].to_string(),
        })
    }

    /// The line exactly as the caller sent it.
    pub fn as_str(&self) -> &str {
        &self.line
    }

    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Hash everything `reader` yields and compare it with `expected`.
pub fn verify<R: Read>(mut reader: R, expected: &[u8]) -> Result<(), VerifyError> {
    let mut hasher = Sha512::new();
    io::copy(&mut reader, &mut hasher)?;
    let actual = hasher.finalize();

    if actual.as_slice() == expected {
        Ok(())
    } else {
        Err(VerifyError::Mismatch {
            expected: hex::encode(expected),
            actual: hex::encode(actual),
        })
    }
}
