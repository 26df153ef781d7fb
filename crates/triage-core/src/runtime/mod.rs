// crates/triage-core/src/runtime/mod.rs
// ============================================================================
// Module: Triage Runtime
// Description: Heuristic engine, decision machine, ledger, lanes, and pipeline.
// Purpose: Execute triage runs deterministically over abstract collaborators.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Runtime components are deterministic given their inputs. Side effects
//! happen only through the collaborator traits in [`crate::interfaces`].

pub mod audit;
pub mod decision;
pub mod heuristics;
pub mod lanes;
pub mod ledger;
pub mod pipeline;
pub mod store;

pub use audit::InMemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::TriageAuditEvent;
pub use audit::TriageAuditSink;
pub use decision::decide;
pub use heuristics::HeuristicEngine;
pub use lanes::LaneError;
pub use lanes::LaneStore;
pub use lanes::SeenIndex;
pub use lanes::project_lanes;
pub use ledger::Ledger;
pub use ledger::LedgerError;
pub use ledger::LedgerIssue;
pub use ledger::LedgerReplay;
pub use ledger::LedgerVerification;
pub use ledger::verify_ledger;
pub use pipeline::PipelineError;
pub use pipeline::PipelineOptions;
pub use pipeline::RunOutcome;
pub use pipeline::SignatureOutcome;
pub use pipeline::TriageCollaborators;
pub use pipeline::TriagePipeline;
pub use store::InMemoryLaneRepository;
pub use store::InMemoryLedgerStore;
pub use store::InMemoryProbe;
pub use store::InMemorySnapshotSink;
pub use store::InMemorySubmissionQueue;
