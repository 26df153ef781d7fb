// crates/triage-core/src/core/mod.rs
// ============================================================================
// Module: Triage Core Types
// Description: Data model for candidates, rules, decisions, ledger, and lanes.
// Purpose: Group the pure, I/O-free types shared by every triage crate.
// Dependencies: serde, serde_json, serde_jcs, sha2, time, url
// ============================================================================

//! ## Overview
//! Core types carry no I/O. Runtime components and collaborators build on
//! them; everything that is hashed or published is defined here.

pub mod candidate;
pub mod canonical;
pub mod decision;
pub mod identifiers;
pub mod lanes;
pub mod ledger;
pub mod rules;
pub mod signals;
pub mod snapshot;
pub mod time;

pub use candidate::Candidate;
pub use candidate::CandidateError;
pub use candidate::CandidateKind;
pub use candidate::CandidateRecord;
pub use canonical::CanonicalError;
pub use canonical::CanonicalOptions;
pub use decision::Decision;
pub use decision::DecisionReason;
pub use decision::Evaluation;
pub use decision::Lane;
pub use identifiers::PendingId;
pub use identifiers::RuleId;
pub use lanes::LaneDocument;
pub use lanes::LaneItem;
pub use ledger::GENESIS_HASH;
pub use ledger::LedgerEntry;
pub use ledger::LedgerPayload;
pub use rules::Allowlist;
pub use rules::HardFailRule;
pub use rules::RuleError;
pub use rules::RuleOperator;
pub use rules::RuleSet;
pub use rules::SoftRule;
pub use rules::Thresholds;
pub use rules::UrlField;
pub use signals::ProbeTarget;
pub use signals::Signal;
pub use signals::SignalSet;
pub use snapshot::CandidateFailure;
pub use snapshot::DecisionSummary;
pub use snapshot::RunSnapshot;
pub use time::Timestamp;
pub use time::TimestampError;
