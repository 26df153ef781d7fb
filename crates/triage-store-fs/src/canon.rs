// crates/triage-store-fs/src/canon.rs
// ============================================================================
// Module: File Canonicalization
// Description: In-place canonical rewriting and checking of JSON files.
// Purpose: Keep hand-edited JSON documents in the same form the pipeline emits.
// Dependencies: triage-core, serde_json
// ============================================================================

//! ## Overview
//! Files are re-encoded with [`canonical_json_bytes_with`] and rewritten
//! atomically only when the bytes differ. A document whose top-level `items`
//! array is longer than the caller's limit is refused before anything is
//! written.

use std::fs;
use std::path::Path;

use serde_json::Value;
use triage_core::CanonicalOptions;
use triage_core::StoreError;
use triage_core::core::canonical::canonical_json_bytes_with;

use crate::atomic::write_atomic;

/// Default cap on the length of a top-level `items` array.
pub const DEFAULT_MAX_ITEMS: usize = 200_000;

/// Reads a file and returns its bytes with the canonical re-encoding.
fn read_canonical(
    path: &Path,
    options: CanonicalOptions,
    max_items: usize,
) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
    let bytes =
        fs::read(path).map_err(|err| StoreError::Io(format!("{}: {err}", path.display())))?;
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
    if let Some(items) = value.get("items").and_then(Value::as_array)
        && items.len() > max_items
    {
        return Err(StoreError::Invalid(format!(
            "{}: items length {} exceeds max_items={max_items}",
            path.display(),
            items.len()
        )));
    }
    let canonical = canonical_json_bytes_with(&value, options)
        .map_err(|err| StoreError::Invalid(format!("{}: {err}", path.display())))?;
    Ok((bytes, canonical))
}

/// Rewrites `path` in canonical form and returns true when it changed.
///
/// # Errors
///
/// Returns [`StoreError`] when the file cannot be read, is not JSON, has more
/// than `max_items` items, or cannot be rewritten.
pub fn canonicalize_file(
    path: &Path,
    options: CanonicalOptions,
    max_items: usize,
) -> Result<bool, StoreError> {
    let (bytes, canonical) = read_canonical(path, options, max_items)?;
    if bytes == canonical {
        return Ok(false);
    }
    write_atomic(path, &canonical)?;
    Ok(true)
}

/// Returns true when `path` is already canonical.
///
/// # Errors
///
/// Returns [`StoreError`] when the file cannot be read, is not JSON, or has
/// more than `max_items` items.
pub fn check_file(
    path: &Path,
    options: CanonicalOptions,
    max_items: usize,
) -> Result<bool, StoreError> {
    let (bytes, canonical) = read_canonical(path, options, max_items)?;
    Ok(bytes == canonical)
}
