// crates/triage-core/src/core/canonical.rs
// ============================================================================
// Module: Canonical JSON and Hashing
// Description: RFC 8785 JSON canonicalization and SHA-256 content hashing.
// Purpose: Provide the only byte encoding allowed to feed hashes and diffs.
// Dependencies: serde, serde_jcs, serde_json, sha2
// ============================================================================

//! ## Overview
//! Every byte sequence that is hashed into the ledger or written as a lane
//! document goes through this module. Canonical form is RFC 8785 (JCS): object
//! keys sorted, no insignificant whitespace, UTF-8 with non-ASCII characters
//! emitted literally.
//!
//! ASCII-only escaping and the trailing newline are explicit options for file
//! output; the ledger hash chain always uses [`CanonicalOptions::default`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Output options for canonical JSON encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanonicalOptions {
    /// Escape every non-ASCII character as `\uXXXX` (UTF-16 code units).
    pub ascii_only: bool,
    /// Terminate the encoding with a single `\n`.
    pub trailing_newline: bool,
}

impl CanonicalOptions {
    /// Options used for documents written to disk: literal UTF-8 plus newline.
    #[must_use]
    pub const fn for_files(ascii_only: bool) -> Self {
        Self {
            ascii_only,
            trailing_newline: true,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while producing or checking canonical JSON.
#[derive(Debug, Error)]
pub enum CanonicalError {
    /// Value could not be serialized into canonical JSON.
    #[error("failed to canonicalize json: {0}")]
    Serialization(String),
    /// Input bytes are not valid JSON.
    #[error("failed to parse json: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Canonical Encoding
// ============================================================================

/// Returns compact canonical JSON bytes for a serializable value.
///
/// # Errors
///
/// Returns [`CanonicalError::Serialization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CanonicalError> {
    serde_jcs::to_vec(value).map_err(|err| CanonicalError::Serialization(err.to_string()))
}

/// Returns canonical JSON bytes honoring the provided output options.
///
/// # Errors
///
/// Returns [`CanonicalError::Serialization`] when serialization fails.
pub fn canonical_json_bytes_with<T: Serialize + ?Sized>(
    value: &T,
    options: CanonicalOptions,
) -> Result<Vec<u8>, CanonicalError> {
    let bytes = canonical_json_bytes(value)?;
    let mut bytes = if options.ascii_only {
        let text = String::from_utf8(bytes)
            .map_err(|err| CanonicalError::Serialization(err.to_string()))?;
        escape_non_ascii(&text).into_bytes()
    } else {
        bytes
    };
    if options.trailing_newline {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Parses JSON bytes and returns their canonical re-encoding.
///
/// # Errors
///
/// Returns [`CanonicalError`] when parsing or re-encoding fails.
pub fn recanonicalize(bytes: &[u8], options: CanonicalOptions) -> Result<Vec<u8>, CanonicalError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| CanonicalError::Parse(err.to_string()))?;
    canonical_json_bytes_with(&value, options)
}

/// Returns true when `bytes` are already in canonical form for `options`.
///
/// # Errors
///
/// Returns [`CanonicalError`] when the input is not valid JSON.
pub fn is_canonical(bytes: &[u8], options: CanonicalOptions) -> Result<bool, CanonicalError> {
    Ok(recanonicalize(bytes, options)? == bytes)
}

/// Escapes DEL and non-ASCII characters as lowercase `\uXXXX` sequences.
///
/// These characters only occur inside JSON string literals, so escaping them
/// never changes the structure of the document.
fn escape_non_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut units = [0_u16; 2];
    for ch in text.chars() {
        if ch < '\u{7f}' {
            out.push(ch);
            continue;
        }
        for unit in ch.encode_utf16(&mut units).iter() {
            let _ = write!(out, "\\u{unit:04x}");
        }
    }
    out
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Length of a lowercase hex SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Hashes raw bytes with SHA-256 and returns the lowercase hex digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Hashes the canonical encoding of a value.
///
/// # Errors
///
/// Returns [`CanonicalError::Serialization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalError> {
    Ok(sha256_hex(&canonical_json_bytes(value)?))
}

/// Returns true when `value` looks like a lowercase hex SHA-256 digest.
#[must_use]
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == SHA256_HEX_LEN && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn escapes_astral_characters_as_surrogate_pairs() {
        assert_eq!(escape_non_ascii("a\u{1F600}"), "a\\ud83d\\ude00");
        assert_eq!(escape_non_ascii("é"), "\\u00e9");
    }

    #[test]
    fn escapes_delete_but_keeps_printable_ascii() {
        assert_eq!(escape_non_ascii("~\u{7f}"), "~\\u007f");
    }

    #[test]
    fn sha256_of_empty_input_matches_known_vector() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn is_canonical_detects_pretty_printed_input() {
        let pretty = serde_json::to_vec_pretty(&json!({"b": 1, "a": 2})).unwrap();
        assert!(!is_canonical(&pretty, CanonicalOptions::default()).unwrap());
        assert!(is_canonical(br#"{"a":2,"b":1}"#, CanonicalOptions::default()).unwrap());
    }
}
