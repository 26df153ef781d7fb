// crates/triage-core/src/runtime/audit.rs
// ============================================================================
// Module: Triage Audit Logging
// Description: Structured audit events emitted by the triage pipeline.
// Purpose: Emit JSON-line run events without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Audit events describe what a run did; they are operational records, not
//! the decision record (that is the ledger). Sinks must never fail a run, so
//! [`TriageAuditSink::record`] has no error channel.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;

use serde::Serialize;

use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Audit event payload, serialized with an `event` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TriageAuditEvent {
    /// Run began after listing and dedup.
    RunStarted {
        /// Run timestamp.
        ts: Timestamp,
        /// Queue location.
        queue: String,
        /// Ids listed by the queue.
        pending: usize,
        /// Ids skipped as already decided or listed twice.
        skipped_seen: usize,
    },
    /// Ledger decisions were re-projected into lanes missing them.
    LanesRepaired {
        /// Run timestamp.
        ts: Timestamp,
        /// Repaired ids in ledger order.
        pending_ids: Vec<PendingId>,
    },
    /// A candidate was decided and ledgered.
    CandidateDecided {
        /// Run timestamp.
        ts: Timestamp,
        /// Queue identifier.
        pending_id: PendingId,
        /// Decision label.
        decision: Lane,
        /// Decision reason label.
        reason: String,
        /// Score.
        score: u8,
        /// Ledger entry hash.
        entry_hash: String,
    },
    /// A candidate was skipped with an error and not ledgered.
    CandidateFailed {
        /// Run timestamp.
        ts: Timestamp,
        /// Queue identifier.
        pending_id: PendingId,
        /// Failure description.
        error: String,
    },
    /// A detached signature was published.
    SignatureWritten {
        /// Run timestamp.
        ts: Timestamp,
        /// Signature path.
        path: String,
        /// Mirror copies of the signature.
        mirrors: Vec<String>,
    },
    /// Signature publication was skipped.
    SignatureSkipped {
        /// Run timestamp.
        ts: Timestamp,
        /// Why signing was skipped.
        reason: String,
    },
    /// Run completed and lanes were flushed.
    RunFinished {
        /// Run timestamp.
        ts: Timestamp,
        /// Candidates decided.
        decided: usize,
        /// Candidates failed.
        failed: usize,
        /// Lane documents rewritten.
        lanes_changed: Vec<String>,
        /// Ledger tip after the run.
        ledger_last_hash: String,
    },
}

impl TriageAuditEvent {
    /// Returns the run timestamp carried by the event.
    #[must_use]
    pub const fn ts(&self) -> &Timestamp {
        match self {
            Self::RunStarted {
                ts, ..
            }
            | Self::LanesRepaired {
                ts, ..
            }
            | Self::CandidateDecided {
                ts, ..
            }
            | Self::CandidateFailed {
                ts, ..
            }
            | Self::SignatureWritten {
                ts, ..
            }
            | Self::SignatureSkipped {
                ts, ..
            }
            | Self::RunFinished {
                ts, ..
            } => ts,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for triage run events.
pub trait TriageAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &TriageAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl TriageAuditSink for StderrAuditSink {
    fn record(&self, event: &TriageAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl TriageAuditSink for NoopAuditSink {
    fn record(&self, _event: &TriageAuditEvent) {}
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct InMemoryAuditSink {
    /// Recorded events.
    events: Mutex<Vec<TriageAuditEvent>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event.
    #[must_use]
    pub fn events(&self) -> Vec<TriageAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl TriageAuditSink for InMemoryAuditSink {
    fn record(&self, event: &TriageAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
