// crates/triage-core/src/runtime/ledger.rs
// ============================================================================
// Module: Hash-Chained Ledger
// Description: Serialized appends, tolerant replay, and full verification.
// Purpose: Keep an append-only, tamper-evident record of every decision.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! [`Ledger`] owns the chain tip behind a mutex and holds it across hashing,
//! the store append, and the tip update, so two entries can never share a
//! `prev_hash`. The tip only moves after the store reports a durable append.
//!
//! Replay treats lines that fail to parse (a torn tail from an interrupted
//! append, for example) as absent and continues from the last valid hash.
//! [`verify_ledger`] is the strict counterpart: it recomputes every hash from
//! the sentinel and reports every break it finds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;

use crate::core::canonical::CanonicalError;
use crate::core::canonical::canonical_json_bytes;
use crate::core::canonical::is_sha256_hex;
use crate::core::identifiers::PendingId;
use crate::core::ledger::GENESIS_HASH;
use crate::core::ledger::LedgerEntry;
use crate::core::ledger::LedgerPayload;
use crate::interfaces::LedgerStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Payload could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    /// Tip lock was poisoned by a panicking writer.
    #[error("ledger tip lock poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Replay
// ============================================================================

/// Result of replaying stored ledger bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReplay {
    /// Hash of the last valid entry, or [`GENESIS_HASH`].
    pub tip: String,
    /// Valid entries in file order.
    pub entries: Vec<LedgerEntry>,
    /// One-based line numbers that were skipped as malformed.
    pub malformed_lines: Vec<usize>,
}

impl LedgerReplay {
    /// Replays raw ledger bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut entries = Vec::new();
        let mut malformed_lines = Vec::new();
        for (line_no, parsed) in parse_lines(bytes) {
            match parsed {
                Some(entry) => entries.push(entry),
                None => malformed_lines.push(line_no),
            }
        }
        let tip = entries.last().map_or_else(|| GENESIS_HASH.to_string(), |e| e.entry_hash.clone());
        Self {
            tip,
            entries,
            malformed_lines,
        }
    }

    /// Returns every pending id already decided in the ledger.
    #[must_use]
    pub fn seen_ids(&self) -> BTreeSet<PendingId> {
        self.entries.iter().filter_map(LedgerEntry::pending_id).collect()
    }

    /// Returns typed decision payloads in ledger order.
    ///
    /// Entries whose payload does not match the decision schema are skipped.
    #[must_use]
    pub fn decisions(&self) -> Vec<LedgerPayload> {
        self.entries.iter().filter_map(LedgerEntry::decision_payload).collect()
    }
}

/// Splits ledger bytes into one-based numbered lines, parsing each entry.
///
/// Blank lines are ignored. `None` marks a line that is not a well-formed
/// entry.
fn parse_lines(bytes: &[u8]) -> impl Iterator<Item = (usize, Option<LedgerEntry>)> + '_ {
    bytes
        .split(|byte| *byte == b'\n')
        .enumerate()
        .filter(|(_, line)| !line.iter().all(u8::is_ascii_whitespace))
        .map(|(index, line)| (index + 1, parse_entry(line)))
}

/// Parses one ledger line into an entry with well-formed hashes.
fn parse_entry(line: &[u8]) -> Option<LedgerEntry> {
    let entry: LedgerEntry = serde_json::from_slice(line).ok()?;
    if !is_sha256_hex(&entry.entry_hash) || !is_sha256_hex(&entry.prev_hash) {
        return None;
    }
    Some(entry)
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Append-only hash-chained ledger over a [`LedgerStore`].
pub struct Ledger<S: LedgerStore> {
    /// Backing store.
    store: S,
    /// Current chain tip.
    tip: Mutex<String>,
}

impl<S: LedgerStore> Ledger<S> {
    /// Opens the ledger and replays its stored content once.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the store cannot be read. Malformed
    /// content is never an error.
    pub fn open(store: S) -> Result<(Self, LedgerReplay), LedgerError> {
        let bytes = store.read_all()?;
        let replay = LedgerReplay::from_bytes(&bytes);
        let ledger = Self {
            store,
            tip: Mutex::new(replay.tip.clone()),
        };
        Ok((ledger, replay))
    }

    /// Returns the hash of the most recently appended entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Poisoned`] when the tip lock is poisoned.
    pub fn last_hash(&self) -> Result<String, LedgerError> {
        self.tip.lock().map(|tip| tip.clone()).map_err(|_| LedgerError::Poisoned)
    }

    /// Appends a payload and returns the sealed entry.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when sealing or the durable append fails; the
    /// tip is unchanged in that case.
    pub fn append(&self, payload: &LedgerPayload) -> Result<LedgerEntry, LedgerError> {
        let mut tip = self.tip.lock().map_err(|_| LedgerError::Poisoned)?;
        let entry = LedgerEntry::seal(&tip, payload)?;
        let mut line = canonical_json_bytes(&entry)?;
        line.push(b'\n');
        self.store.append_line(&line)?;
        tip.clone_from(&entry.entry_hash);
        drop(tip);
        Ok(entry)
    }
}

// ============================================================================
// SECTION: Verification
// ============================================================================

/// Problem found while verifying a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum LedgerIssue {
    /// Line is not a well-formed entry and was skipped.
    Malformed {
        /// One-based line number.
        line: usize,
    },
    /// `prev_hash` does not link to the previous entry.
    PrevHashMismatch {
        /// One-based line number.
        line: usize,
        /// Hash the entry should have chained from.
        expected: String,
        /// Hash recorded in the entry.
        found: String,
    },
    /// `entry_hash` does not match the recomputed hash.
    EntryHashMismatch {
        /// One-based line number.
        line: usize,
        /// Recomputed hash.
        expected: String,
        /// Hash recorded in the entry.
        found: String,
    },
}

/// Outcome of a full ledger verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerVerification {
    /// Number of well-formed entries.
    pub entries: usize,
    /// Hash of the last well-formed entry, or [`GENESIS_HASH`].
    pub tip: String,
    /// Problems in file order.
    pub issues: Vec<LedgerIssue>,
}

impl LedgerVerification {
    /// Returns true when no hash link or entry hash is broken.
    ///
    /// Malformed lines do not break integrity on their own: they were never
    /// part of the chain.
    #[must_use]
    pub fn is_intact(&self) -> bool {
        self.issues.iter().all(|issue| matches!(issue, LedgerIssue::Malformed { .. }))
    }
}

/// Replays ledger bytes from the sentinel and recomputes every hash.
///
/// # Errors
///
/// Returns [`CanonicalError`] when a payload cannot be canonicalized.
pub fn verify_ledger(bytes: &[u8]) -> Result<LedgerVerification, CanonicalError> {
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut entries = 0;
    let mut issues = Vec::new();
    for (line, parsed) in parse_lines(bytes) {
        let Some(entry) = parsed else {
            issues.push(LedgerIssue::Malformed {
                line,
            });
            continue;
        };
        entries += 1;
        if entry.prev_hash != expected_prev {
            issues.push(LedgerIssue::PrevHashMismatch {
                line,
                expected: expected_prev.clone(),
                found: entry.prev_hash.clone(),
            });
        }
        let recomputed = entry.recompute_hash()?;
        if recomputed != entry.entry_hash {
            issues.push(LedgerIssue::EntryHashMismatch {
                line,
                expected: recomputed,
                found: entry.entry_hash.clone(),
            });
        }
        expected_prev = entry.entry_hash;
    }
    Ok(LedgerVerification {
        entries,
        tip: expected_prev,
        issues,
    })
}
