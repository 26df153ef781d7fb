// crates/triage-core/src/runtime/decision.rs
// ============================================================================
// Module: Decision State Machine
// Description: Maps an evaluation and thresholds to a terminal lane.
// Purpose: Keep lane selection pure, total, and inclusive at thresholds.
// ============================================================================

//! Pure lane selection: hard-fail, then accept, then sandbox, then reject.

use crate::core::decision::Decision;
use crate::core::decision::DecisionReason;
use crate::core::decision::Evaluation;
use crate::core::decision::Lane;
use crate::core::rules::Thresholds;

/// Decides the lane for an evaluation.
///
/// A hard-fail always rejects. Otherwise thresholds are inclusive and the
/// higher lane wins a tie, so equal thresholds make sandbox unreachable.
#[must_use]
pub fn decide(evaluation: Evaluation, thresholds: Thresholds) -> Decision {
    let Evaluation {
        score,
        signals,
        hard_fail,
    } = evaluation;
    let (lane, reason) = match &hard_fail {
        Some(rule) => (Lane::Reject, DecisionReason::HardFail(rule.clone())),
        None if score >= thresholds.min_score_to_accept => {
            (Lane::Accept, DecisionReason::MeetsAcceptThreshold)
        }
        None if score >= thresholds.min_score_to_sandbox => {
            (Lane::Sandbox, DecisionReason::MeetsSandboxThreshold)
        }
        None => (Lane::Reject, DecisionReason::BelowSandboxThreshold),
    };
    Decision {
        lane,
        score,
        signals,
        hard_fail,
        reason,
    }
}
