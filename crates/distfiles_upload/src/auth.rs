//! # HTTP Basic authentication
//!
//! Only the username carries the token; the password is ignored.

use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;

use crate::error::UploadError;

/// Extract the Basic auth username from `headers`, if any.
pub fn basic_username(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, _password) = decoded.split_once(':')?;
    Some(username.to_string())
}

/// Compare the caller's credential with `token` in constant time.
pub fn authenticate(headers: &HeaderMap, token: &str) -> Result<(), UploadError> {
    let username = basic_username(headers).ok_or(UploadError::MissingCredentials)?;

    if bool::from(username.as_bytes().ct_eq(token.as_bytes())) {
        Ok(())
    } else {
        Err(UploadError::InvalidCredentials)
    }
}

/// `WWW-Authenticate` challenge for `realm`.
pub fn challenge(realm: &str) -> HeaderValue {
    let escaped = realm.replace('\\', "\\\\").replace('"', "\\\"");
    HeaderValue::from_str(&format!("Basic realm=\"{escaped}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("Basic"))
}
