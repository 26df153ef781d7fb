// crates/triage-store-fs/src/audit.rs
// ============================================================================
// Module: File Audit Sink
// Description: Monthly JSON-lines audit logs.
// Purpose: Persist run events under `<dir>/<YYYY-MM>.jsonl`.
// Dependencies: triage-core
// ============================================================================

//! ## Overview
//! Events are appended as canonical JSON lines to the file for the month of
//! the event timestamp. The directory is created on the first event, so a
//! run that aborts before recording anything leaves no trace. Write failures
//! are dropped; audit output never fails a run.

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use triage_core::Timestamp;
use triage_core::TriageAuditEvent;
use triage_core::TriageAuditSink;
use triage_core::core::canonical::canonical_json_bytes;

/// Audit sink appending to monthly files.
pub struct FileAuditSink {
    /// Audit directory.
    dir: PathBuf,
    /// Month key and handle of the file currently open.
    current: Mutex<Option<(String, File)>>,
}

impl FileAuditSink {
    /// Creates the sink; the directory is created with the first event.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: Mutex::new(None),
        }
    }

    /// Returns the audit directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the log file for the month of `ts`.
    #[must_use]
    pub fn log_path(&self, ts: &Timestamp) -> PathBuf {
        self.dir.join(format!("{}.jsonl", ts.month_key()))
    }
}

impl TriageAuditSink for FileAuditSink {
    fn record(&self, event: &TriageAuditEvent) {
        let Ok(mut line) = canonical_json_bytes(event) else {
            return;
        };
        line.push(b'\n');
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        let month = event.ts().month_key();
        if current.as_ref().is_none_or(|(open, _)| open != month) {
            *current = fs::create_dir_all(&self.dir)
                .and_then(|()| {
                    OpenOptions::new().create(true).append(true).open(self.log_path(event.ts()))
                })
                .ok()
                .map(|file| (month.to_string(), file));
        }
        if let Some((_, file)) = current.as_mut() {
            let _ = file.write_all(&line);
            let _ = file.flush();
        }
    }
}
