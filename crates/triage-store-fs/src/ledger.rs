// crates/triage-store-fs/src/ledger.rs
// ============================================================================
// Module: File Ledger Store
// Description: Append-only JSON-lines ledger file.
// Purpose: Durably append ledger lines without rewriting history.
// Dependencies: triage-core
// ============================================================================

//! ## Overview
//! Each append is a single `write_all` followed by `sync_data`. When the file
//! does not end in `\n` (an earlier append was torn), the new line is
//! prefixed with `\n` so the fragment stays isolated and the replay skips it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use triage_core::LedgerStore;
use triage_core::StoreError;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Ledger store backed by one file.
#[derive(Debug, Clone)]
pub struct FileLedgerStore {
    /// Ledger file path.
    path: PathBuf,
}

impl FileLedgerStore {
    /// Creates a store for `path`; the file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
        }
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Formats an I/O error with the ledger path.
    fn io_error(&self, err: &std::io::Error) -> StoreError {
        StoreError::Io(format!("{}: {err}", self.path.display()))
    }
}

/// Returns true when a non-empty file does not end with a newline.
fn has_torn_tail(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0_u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl LedgerStore for FileLedgerStore {
    fn read_all(&self) -> Result<Vec<u8>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.io_error(&err)),
        }
    }

    fn append_line(&self, line: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|err| self.io_error(&err))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| self.io_error(&err))?;
        let mut buffer = Vec::with_capacity(line.len() + 1);
        if has_torn_tail(&mut file).map_err(|err| self.io_error(&err))? {
            buffer.push(b'\n');
        }
        buffer.extend_from_slice(line);
        file.write_all(&buffer).map_err(|err| self.io_error(&err))?;
        file.sync_data().map_err(|err| self.io_error(&err))
    }
}
