// crates/triage-store-fs/src/snapshot.rs
// ============================================================================
// Module: File Snapshot Sink
// Description: Per-run snapshot documents in the state directory.
// Purpose: Keep a summary of every completed run next to the ledger.
// ============================================================================

//! ## Overview
//! Snapshots are named `run-<YYYYMMDDTHHMMSSZ>.json` and written atomically.

use std::path::Path;
use std::path::PathBuf;

use triage_core::SnapshotSink;
use triage_core::StoreError;
use triage_core::Timestamp;

use crate::atomic::write_atomic;

/// Snapshot sink writing into one directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    /// State directory.
    dir: PathBuf,
}

impl FileSnapshotSink {
    /// Creates a sink for `dir`; the directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Returns the state directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the snapshot path for a run timestamp.
    #[must_use]
    pub fn snapshot_path(&self, ts: &Timestamp) -> PathBuf {
        self.dir.join(format!("run-{}.json", ts.compact()))
    }
}

impl SnapshotSink for FileSnapshotSink {
    fn write_snapshot(&self, ts: &Timestamp, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.snapshot_path(ts);
        write_atomic(&path, bytes)?;
        Ok(path)
    }
}
