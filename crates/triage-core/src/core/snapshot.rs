// crates/triage-core/src/core/snapshot.rs
// ============================================================================
// Module: Run Snapshots
// Description: Summary record written after every completed run.
// Purpose: Capture what a run saw and decided, alongside the rules it used.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A run snapshot is informational. It is never read back by the pipeline; the
//! ledger stays the authoritative record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::rules::RuleSet;
use crate::core::time::Timestamp;

/// Schema identifier of run snapshots.
pub const RUN_SNAPSHOT_SCHEMA: &str = "triage-run-snapshot/v1";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Decision summary recorded in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSummary {
    /// Queue identifier.
    pub id: PendingId,
    /// Decision label.
    pub decision: Lane,
    /// Lane document name.
    pub lane: String,
    /// Decision reason label.
    pub reason: String,
    /// Score.
    pub score: u8,
}

/// Candidate that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateFailure {
    /// Queue identifier.
    pub id: PendingId,
    /// Failure description.
    pub error: String,
}

/// Run summary written to the state directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Schema identifier.
    pub schema: String,
    /// Run timestamp.
    pub ts: Timestamp,
    /// Queue base location.
    pub queue_base: String,
    /// Number of ids listed by the queue.
    pub pending_count: usize,
    /// Ids skipped because they were already decided or listed twice.
    pub skipped_seen: usize,
    /// Ledger decisions re-projected into lanes at run start.
    pub repaired: usize,
    /// Decisions made in this run, in queue order.
    pub decisions: Vec<DecisionSummary>,
    /// Candidates skipped with an error, in queue order.
    pub errors: Vec<CandidateFailure>,
    /// Item count per lane document after the run.
    pub lane_counts: BTreeMap<String, usize>,
    /// Ledger tip after the run.
    pub ledger_last_hash: String,
    /// Rules the run was evaluated with.
    pub rules: RuleSet,
}
