// crates/triage-core/src/core/ledger.rs
// ============================================================================
// Module: Ledger Records
// Description: Hash-chained ledger entries and decision payloads.
// Purpose: Define the tamper-evident record format and its hash function.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Each ledger line is the canonical encoding of a [`LedgerEntry`]:
//! `entry_hash = sha256(prev_hash || "\n" || canonical(payload))`. The first
//! entry chains from [`GENESIS_HASH`].
//!
//! The entry keeps its payload as a raw JSON value so that verification hashes
//! exactly what was written, while [`LedgerPayload`] gives writers and replay
//! a typed view.
//!
//! Security posture: ledger bytes are untrusted on read and are always
//! re-hashed before being relied on for verification.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::canonical::CanonicalError;
use crate::core::canonical::canonical_json_bytes;
use crate::core::canonical::sha256_hex;
use crate::core::decision::Decision;
use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::identifiers::RuleId;
use crate::core::signals::SignalSet;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// All-zero sentinel used as `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// SECTION: Payload
// ============================================================================

/// Full decision context recorded for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPayload {
    /// Run timestamp.
    pub ts: Timestamp,
    /// Queue identifier of the candidate.
    pub pending_id: PendingId,
    /// Decision label.
    pub decision: Lane,
    /// Lane document the candidate was placed in.
    pub lane: String,
    /// Decision reason label.
    pub reason: String,
    /// Score the decision was made on.
    pub score: u8,
    /// Observed signals.
    #[serde(default)]
    pub signals: SignalSet,
    /// Hard-fail rule that forced rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_fail: Option<RuleId>,
    /// Raw candidate body as received from the queue.
    pub body: Map<String, Value>,
}

impl LedgerPayload {
    /// Builds the payload for a decision.
    #[must_use]
    pub fn from_decision(
        ts: Timestamp,
        pending_id: PendingId,
        decision: &Decision,
        body: Map<String, Value>,
    ) -> Self {
        Self {
            ts,
            pending_id,
            decision: decision.lane,
            lane: decision.lane.document_name().to_string(),
            reason: decision.reason.label(),
            score: decision.score,
            signals: decision.signals.clone(),
            hard_fail: decision.hard_fail.clone(),
            body,
        }
    }
}

// ============================================================================
// SECTION: Entry
// ============================================================================

/// One hash-chained ledger line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Hash of the previous entry, or [`GENESIS_HASH`].
    pub prev_hash: String,
    /// Hash of this entry.
    pub entry_hash: String,
    /// Decision payload as written.
    pub payload: Value,
}

impl LedgerEntry {
    /// Seals a payload onto the chain tip.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] when the payload cannot be canonicalized.
    pub fn seal<T: Serialize + ?Sized>(
        prev_hash: &str,
        payload: &T,
    ) -> Result<Self, CanonicalError> {
        let payload = serde_json::to_value(payload)
            .map_err(|err| CanonicalError::Serialization(err.to_string()))?;
        let entry_hash = compute_entry_hash(prev_hash, &payload)?;
        Ok(Self {
            prev_hash: prev_hash.to_string(),
            entry_hash,
            payload,
        })
    }

    /// Recomputes the entry hash from `prev_hash` and `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] when the payload cannot be canonicalized.
    pub fn recompute_hash(&self) -> Result<String, CanonicalError> {
        compute_entry_hash(&self.prev_hash, &self.payload)
    }

    /// Returns the typed payload, if the payload matches the decision schema.
    #[must_use]
    pub fn decision_payload(&self) -> Option<LedgerPayload> {
        serde_json::from_value(self.payload.clone()).ok()
    }

    /// Returns the `pending_id` recorded in the payload, if any.
    #[must_use]
    pub fn pending_id(&self) -> Option<PendingId> {
        self.payload.get("pending_id").and_then(Value::as_str).map(PendingId::new)
    }
}

/// Computes `sha256(prev_hash || "\n" || canonical(payload))` as lowercase hex.
///
/// # Errors
///
/// Returns [`CanonicalError`] when the payload cannot be canonicalized.
pub fn compute_entry_hash(prev_hash: &str, payload: &Value) -> Result<String, CanonicalError> {
    let canonical = canonical_json_bytes(payload)?;
    let mut material = Vec::with_capacity(prev_hash.len() + 1 + canonical.len());
    material.extend_from_slice(prev_hash.as_bytes());
    material.push(b'\n');
    material.extend_from_slice(&canonical);
    Ok(sha256_hex(&material))
}
