// crates/triage-core/src/lib.rs
// ============================================================================
// Module: Triage Core
// Description: Decision-and-ledger core of the candidate triage pipeline.
// Purpose: Score, decide, ledger, and place candidates deterministically.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, time, url
// ============================================================================

//! ## Overview
//! Triage core classifies externally submitted candidates into three lanes
//! (accepted, sandbox, rejected) and commits every decision to a hash-chained
//! ledger before any lane document changes. Lane documents are a rebuildable
//! projection of that ledger.
//!
//! The crate is backend-agnostic: queue access, probing, storage, signing, and
//! audit output are collaborator traits implemented elsewhere.
//!
//! Security posture: queue content and stored ledger bytes are untrusted
//! inputs; intake validation and hash verification run before either is used.

pub mod core;
pub mod interfaces;
pub mod runtime;

pub use crate::core::Allowlist;
pub use crate::core::Candidate;
pub use crate::core::CandidateError;
pub use crate::core::CandidateFailure;
pub use crate::core::CandidateKind;
pub use crate::core::CandidateRecord;
pub use crate::core::CanonicalError;
pub use crate::core::CanonicalOptions;
pub use crate::core::Decision;
pub use crate::core::DecisionReason;
pub use crate::core::DecisionSummary;
pub use crate::core::Evaluation;
pub use crate::core::GENESIS_HASH;
pub use crate::core::HardFailRule;
pub use crate::core::Lane;
pub use crate::core::LaneDocument;
pub use crate::core::LaneItem;
pub use crate::core::LedgerEntry;
pub use crate::core::LedgerPayload;
pub use crate::core::PendingId;
pub use crate::core::ProbeTarget;
pub use crate::core::RuleError;
pub use crate::core::RuleId;
pub use crate::core::RuleOperator;
pub use crate::core::RuleSet;
pub use crate::core::RunSnapshot;
pub use crate::core::Signal;
pub use crate::core::SignalSet;
pub use crate::core::SoftRule;
pub use crate::core::Thresholds;
pub use crate::core::Timestamp;
pub use crate::core::TimestampError;
pub use crate::core::UrlField;
pub use crate::interfaces::ArtifactSigner;
pub use crate::interfaces::EndpointProbe;
pub use crate::interfaces::LaneRepository;
pub use crate::interfaces::LedgerStore;
pub use crate::interfaces::ProbeError;
pub use crate::interfaces::PublishedLane;
pub use crate::interfaces::QueueError;
pub use crate::interfaces::SignerError;
pub use crate::interfaces::SnapshotSink;
pub use crate::interfaces::StoreError;
pub use crate::interfaces::SubmissionQueue;
pub use crate::runtime::HeuristicEngine;
pub use crate::runtime::InMemoryAuditSink;
pub use crate::runtime::InMemoryLaneRepository;
pub use crate::runtime::InMemoryLedgerStore;
pub use crate::runtime::InMemoryProbe;
pub use crate::runtime::InMemorySnapshotSink;
pub use crate::runtime::InMemorySubmissionQueue;
pub use crate::runtime::LaneError;
pub use crate::runtime::LaneStore;
pub use crate::runtime::Ledger;
pub use crate::runtime::LedgerError;
pub use crate::runtime::LedgerIssue;
pub use crate::runtime::LedgerReplay;
pub use crate::runtime::LedgerVerification;
pub use crate::runtime::NoopAuditSink;
pub use crate::runtime::PipelineError;
pub use crate::runtime::PipelineOptions;
pub use crate::runtime::RunOutcome;
pub use crate::runtime::SeenIndex;
pub use crate::runtime::SignatureOutcome;
pub use crate::runtime::StderrAuditSink;
pub use crate::runtime::TriageAuditEvent;
pub use crate::runtime::TriageAuditSink;
pub use crate::runtime::TriageCollaborators;
pub use crate::runtime::TriagePipeline;
pub use crate::runtime::decide;
pub use crate::runtime::project_lanes;
pub use crate::runtime::verify_ledger;
