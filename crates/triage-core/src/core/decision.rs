// crates/triage-core/src/core/decision.rs
// ============================================================================
// Module: Decisions and Lanes
// Description: Terminal classification of a candidate and its lane buckets.
// Purpose: Provide the immutable record produced by the decision state machine.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Decision`] is produced once per candidate and never mutated. The
//! [`Lane`] names both the decision (`accept`) and, via
//! [`Lane::document_name`], the lane document it lands in (`accepted`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RuleId;
use crate::core::signals::SignalSet;

// ============================================================================
// SECTION: Lane
// ============================================================================

/// One of three terminal classification buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    /// Candidate is accepted.
    Accept,
    /// Candidate is sandboxed for manual review.
    Sandbox,
    /// Candidate is rejected.
    Reject,
}

impl Lane {
    /// Every lane in publication order.
    pub const ALL: [Self; 3] = [Self::Accept, Self::Sandbox, Self::Reject];

    /// Returns the decision label (`accept`, `sandbox`, `reject`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Sandbox => "sandbox",
            Self::Reject => "reject",
        }
    }

    /// Returns the lane document name (`accepted`, `sandbox`, `rejected`).
    #[must_use]
    pub const fn document_name(self) -> &'static str {
        match self {
            Self::Accept => "accepted",
            Self::Sandbox => "sandbox",
            Self::Reject => "rejected",
        }
    }

    /// Parses a lane document name.
    #[must_use]
    pub fn from_document_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lane| lane.document_name() == name)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Reasons
// ============================================================================

/// Why a candidate landed in its lane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionReason {
    /// A hard-fail rule forced rejection.
    HardFail(RuleId),
    /// Score reached the accept threshold.
    MeetsAcceptThreshold,
    /// Score reached the sandbox threshold.
    MeetsSandboxThreshold,
    /// Score stayed below the sandbox threshold.
    BelowSandboxThreshold,
}

impl DecisionReason {
    /// Returns the stable reason label recorded in the ledger.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::HardFail(rule) => format!("hard_fail:{rule}"),
            Self::MeetsAcceptThreshold => "score_meets_accept_threshold".to_string(),
            Self::MeetsSandboxThreshold => "score_meets_sandbox_threshold".to_string(),
            Self::BelowSandboxThreshold => "score_below_sandbox_threshold".to_string(),
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// ============================================================================
// SECTION: Evaluation and Decision
// ============================================================================

/// Heuristic engine output for a single candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Score clamped to `0..=100`; `0` when a hard-fail matched.
    pub score: u8,
    /// Observed signals.
    pub signals: SignalSet,
    /// First matching hard-fail rule, if any.
    pub hard_fail: Option<RuleId>,
}

/// Immutable lane decision for a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Destination lane.
    pub lane: Lane,
    /// Score the decision was made on.
    pub score: u8,
    /// Signals the score was computed from.
    pub signals: SignalSet,
    /// Hard-fail rule that forced rejection.
    pub hard_fail: Option<RuleId>,
    /// Decision reason.
    pub reason: DecisionReason,
}
