// crates/triage-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Triage Run Orchestrator
// Description: One batch: list, dedup, evaluate, decide, ledger, lanes, flush.
// Purpose: Sequence collaborators so no decision is visible before it is ledgered.
// Dependencies: std::thread
// ============================================================================

//! ## Overview
//! A run proceeds in phases:
//! 1. Replay the ledger and load the lanes (fail closed on duplicate ids).
//! 2. List the queue. A list failure aborts before any write.
//! 3. Skip ids already decided or listed twice; repair lanes that lack a
//!    ledgered decision.
//! 4. Fetch and evaluate fresh candidates on a bounded pool of scoped worker
//!    threads. Results are kept in queue order.
//! 5. On the calling thread, in queue order: decide, append to the ledger,
//!    then record in the lane store.
//! 6. Flush changed lanes (primary and mirrors from the same bytes), write the
//!    run snapshot, then sign the accepted lane on a best-effort basis.
//!
//! Detail and intake failures are audited as `candidate_failed` and never
//! consume a ledger entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use thiserror::Error;

use crate::core::candidate::Candidate;
use crate::core::canonical::CanonicalError;
use crate::core::canonical::CanonicalOptions;
use crate::core::canonical::canonical_json_bytes_with;
use crate::core::decision::Evaluation;
use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::lanes::LaneDocument;
use crate::core::lanes::lane_item;
use crate::core::ledger::LedgerPayload;
use crate::core::rules::RuleError;
use crate::core::rules::RuleSet;
use crate::core::snapshot::CandidateFailure;
use crate::core::snapshot::DecisionSummary;
use crate::core::snapshot::RUN_SNAPSHOT_SCHEMA;
use crate::core::snapshot::RunSnapshot;
use crate::core::time::Timestamp;
use crate::interfaces::ArtifactSigner;
use crate::interfaces::EndpointProbe;
use crate::interfaces::LaneRepository;
use crate::interfaces::LedgerStore;
use crate::interfaces::PublishedLane;
use crate::interfaces::QueueError;
use crate::interfaces::SnapshotSink;
use crate::interfaces::StoreError;
use crate::interfaces::SubmissionQueue;
use crate::runtime::audit::TriageAuditEvent;
use crate::runtime::audit::TriageAuditSink;
use crate::runtime::decision::decide;
use crate::runtime::heuristics::HeuristicEngine;
use crate::runtime::lanes::LaneError;
use crate::runtime::lanes::LaneStore;
use crate::runtime::ledger::Ledger;
use crate::runtime::ledger::LedgerError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on evaluation worker threads.
pub const MAX_WORKERS: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Run-aborting pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Rule configuration is malformed.
    #[error(transparent)]
    Rules(#[from] RuleError),
    /// The queue could not be listed; nothing was written.
    #[error("queue list failed: {0}")]
    QueueList(QueueError),
    /// Ledger read or append failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Lane documents are inconsistent.
    #[error(transparent)]
    Lanes(#[from] LaneError),
    /// A lane, snapshot, or mirror write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// A document could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    /// An evaluation worker panicked.
    #[error("evaluation worker failed: {0}")]
    Worker(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Run-level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Evaluation worker threads (clamped to `1..=MAX_WORKERS`).
    pub workers: usize,
    /// Escape non-ASCII characters in published documents.
    pub ascii_only: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            ascii_only: false,
        }
    }
}

/// Collaborators a run is wired to.
#[derive(Clone, Copy)]
pub struct TriageCollaborators<'a> {
    /// Submission queue.
    pub queue: &'a dyn SubmissionQueue,
    /// Endpoint probe.
    pub probe: &'a dyn EndpointProbe,
    /// Ledger backing store.
    pub ledger: &'a dyn LedgerStore,
    /// Lane repository.
    pub lanes: &'a dyn LaneRepository,
    /// Run snapshot sink.
    pub snapshots: &'a dyn SnapshotSink,
    /// Optional signer for the accepted lane.
    pub signer: Option<&'a dyn ArtifactSigner>,
    /// Audit sink.
    pub audit: &'a dyn TriageAuditSink,
}

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// What happened to the accepted-lane signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// Accepted lane did not change, so nothing was signed.
    NotNeeded,
    /// Signature written and mirrored.
    Written {
        /// Signature path.
        path: PathBuf,
        /// Mirror copies.
        mirrors: Vec<PathBuf>,
    },
    /// Signing was skipped.
    Skipped(String),
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Run summary as written to the snapshot sink.
    pub snapshot: RunSnapshot,
    /// Snapshot location.
    pub snapshot_path: PathBuf,
    /// Ids re-projected from the ledger into lanes.
    pub repaired: Vec<PendingId>,
    /// Lanes rewritten this run with their locations.
    pub published: Vec<(Lane, PublishedLane)>,
    /// Accepted-lane signature outcome.
    pub signature: SignatureOutcome,
}

/// Per-candidate worker result, tagged with its queue position.
type WorkerResult = (usize, Result<(Candidate, Evaluation), String>);

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Triage run orchestrator.
pub struct TriagePipeline<'a> {
    /// Validated rules.
    rules: &'a RuleSet,
    /// Collaborators.
    collaborators: TriageCollaborators<'a>,
    /// Run options.
    options: PipelineOptions,
}

impl<'a> TriagePipeline<'a> {
    /// Creates a pipeline after validating the rules.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Rules`] when the rule set is malformed.
    pub fn new(
        rules: &'a RuleSet,
        collaborators: TriageCollaborators<'a>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        rules.validate()?;
        Ok(Self {
            rules,
            collaborators,
            options,
        })
    }

    /// Runs one batch at timestamp `ts`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the run aborts. A queue list failure
    /// aborts before any write; later failures leave already-appended ledger
    /// entries in place for the next run to repair.
    pub fn run(&self, ts: &Timestamp) -> Result<RunOutcome, PipelineError> {
        let c = self.collaborators;
        let (ledger, replay) = Ledger::open(c.ledger)?;
        let mut lanes = LaneStore::from_documents(self.load_lanes()?, ts)?;
        let listed = c.queue.list_pending().map_err(PipelineError::QueueList)?;

        let ledger_seen = replay.seen_ids();
        let mut queued = BTreeSet::new();
        let fresh: Vec<PendingId> = listed
            .iter()
            .filter(|id| !ledger_seen.contains(*id) && !lanes.seen().contains(id))
            .filter(|id| queued.insert((*id).clone()))
            .cloned()
            .collect();
        let skipped_seen = listed.len() - fresh.len();
        c.audit.record(&TriageAuditEvent::RunStarted {
            ts: ts.clone(),
            queue: c.queue.describe(),
            pending: listed.len(),
            skipped_seen,
        });

        let mut repaired = Vec::new();
        for payload in replay.decisions() {
            if lanes.record(payload.decision, lane_item(&payload.pending_id, &payload.body))? {
                repaired.push(payload.pending_id);
            }
        }
        if !repaired.is_empty() {
            c.audit.record(&TriageAuditEvent::LanesRepaired {
                ts: ts.clone(),
                pending_ids: repaired.clone(),
            });
        }

        let engine = HeuristicEngine::new(self.rules, c.probe)?;
        let results = self.evaluate_all(&engine, &fresh)?;

        let mut decisions = Vec::new();
        let mut errors = Vec::new();
        for (id, result) in fresh.into_iter().zip(results) {
            let (candidate, evaluation) = match result {
                Ok(evaluated) => evaluated,
                Err(error) => {
                    c.audit.record(&TriageAuditEvent::CandidateFailed {
                        ts: ts.clone(),
                        pending_id: id.clone(),
                        error: error.clone(),
                    });
                    errors.push(CandidateFailure {
                        id,
                        error,
                    });
                    continue;
                }
            };
            let decision = decide(evaluation, self.rules.thresholds);
            let payload =
                LedgerPayload::from_decision(ts.clone(), id.clone(), &decision, candidate.body);
            let entry = ledger.append(&payload)?;
            c.audit.record(&TriageAuditEvent::CandidateDecided {
                ts: ts.clone(),
                pending_id: id.clone(),
                decision: decision.lane,
                reason: payload.reason.clone(),
                score: decision.score,
                entry_hash: entry.entry_hash,
            });
            lanes.record(decision.lane, lane_item(&id, &payload.body))?;
            decisions.push(DecisionSummary {
                id,
                decision: decision.lane,
                lane: payload.lane,
                reason: payload.reason,
                score: decision.score,
            });
        }

        let published = self.publish_lanes(&mut lanes, ts)?;
        let ledger_last_hash = ledger.last_hash()?;
        let snapshot = RunSnapshot {
            schema: RUN_SNAPSHOT_SCHEMA.to_string(),
            ts: ts.clone(),
            queue_base: c.queue.describe(),
            pending_count: listed.len(),
            skipped_seen,
            repaired: repaired.len(),
            decisions,
            errors,
            lane_counts: lanes.counts(),
            ledger_last_hash: ledger_last_hash.clone(),
            rules: self.rules.clone(),
        };
        let snapshot_bytes = canonical_json_bytes_with(&snapshot, self.file_options())?;
        let snapshot_path = c.snapshots.write_snapshot(ts, &snapshot_bytes)?;

        let signature = match published.iter().find(|(lane, _)| *lane == Lane::Accept) {
            Some((_, accepted)) => self.sign_accepted(accepted, ts),
            None => SignatureOutcome::NotNeeded,
        };

        c.audit.record(&TriageAuditEvent::RunFinished {
            ts: ts.clone(),
            decided: snapshot.decisions.len(),
            failed: snapshot.errors.len(),
            lanes_changed: published
                .iter()
                .map(|(lane, _)| lane.document_name().to_string())
                .collect(),
            ledger_last_hash,
        });
        Ok(RunOutcome {
            snapshot,
            snapshot_path,
            repaired,
            published,
            signature,
        })
    }

    /// Output options for published files.
    const fn file_options(&self) -> CanonicalOptions {
        CanonicalOptions::for_files(self.options.ascii_only)
    }

    /// Loads every existing lane document.
    fn load_lanes(&self) -> Result<Vec<LaneDocument>, StoreError> {
        let mut documents = Vec::new();
        for lane in Lane::ALL {
            if let Some(document) = self.collaborators.lanes.load(lane)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Fetches and evaluates candidates on scoped workers, in queue order.
    fn evaluate_all(
        &self,
        engine: &HeuristicEngine<'_, dyn EndpointProbe + 'a>,
        ids: &[PendingId],
    ) -> Result<Vec<Result<(Candidate, Evaluation), String>>, PipelineError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let workers = self.options.workers.clamp(1, MAX_WORKERS).min(ids.len());
        let queue = self.collaborators.queue;
        let cursor = AtomicUsize::new(0);
        let mut collected: Vec<WorkerResult> = thread::scope(|scope| {
            let handles: Vec<_> = (0 .. workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut local = Vec::new();
                        loop {
                            let index = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(id) = ids.get(index) else {
                                break;
                            };
                            local.push((index, evaluate_one(queue, engine, id)));
                        }
                        local
                    })
                })
                .collect();
            let mut merged = Vec::with_capacity(ids.len());
            let mut panicked = 0_usize;
            for handle in handles {
                match handle.join() {
                    Ok(local) => merged.extend(local),
                    Err(_) => panicked += 1,
                }
            }
            if panicked > 0 {
                return Err(PipelineError::Worker(format!("{panicked} worker thread(s) panicked")));
            }
            Ok(merged)
        })?;
        collected.sort_by_key(|(index, _)| *index);
        Ok(collected.into_iter().map(|(_, result)| result).collect())
    }

    /// Encodes and publishes every changed lane.
    fn publish_lanes(
        &self,
        lanes: &mut LaneStore,
        ts: &Timestamp,
    ) -> Result<Vec<(Lane, PublishedLane)>, PipelineError> {
        let options = self.file_options();
        let mut published = Vec::new();
        for (lane, document) in lanes.finalize(ts) {
            let bytes = canonical_json_bytes_with(document, options)?;
            published.push((lane, self.collaborators.lanes.publish(lane, &bytes)?));
        }
        Ok(published)
    }

    /// Signs the accepted lane and mirrors the signature; never fails the run.
    ///
    /// Signatures of the previous document are removed from the primary and
    /// every mirror first, so a skipped or failed signing leaves none behind.
    fn sign_accepted(&self, accepted: &PublishedLane, ts: &Timestamp) -> SignatureOutcome {
        let c = self.collaborators;
        let outcome = match c.signer {
            None => SignatureOutcome::Skipped("no signer configured".to_string()),
            Some(signer) => match c.lanes.remove_artifact(&signer.signature_path(&accepted.primary)) {
                Err(err) => SignatureOutcome::Skipped(format!("stale signature removal failed: {err}")),
                Ok(_) if !signer.available() => {
                    SignatureOutcome::Skipped("signer unavailable".to_string())
                }
                Ok(_) => match signer.sign(&accepted.primary) {
                    Err(err) => SignatureOutcome::Skipped(err.to_string()),
                    Ok(path) => match c.lanes.mirror_artifact(&path) {
                        Ok(mirrors) => SignatureOutcome::Written {
                            path,
                            mirrors,
                        },
                        Err(err) => {
                            SignatureOutcome::Skipped(format!("signature mirror failed: {err}"))
                        }
                    },
                },
            },
        };
        let event = match &outcome {
            SignatureOutcome::Written {
                path,
                mirrors,
            } => TriageAuditEvent::SignatureWritten {
                ts: ts.clone(),
                path: path.display().to_string(),
                mirrors: mirrors.iter().map(|m| m.display().to_string()).collect(),
            },
            SignatureOutcome::Skipped(reason) => TriageAuditEvent::SignatureSkipped {
                ts: ts.clone(),
                reason: reason.clone(),
            },
            SignatureOutcome::NotNeeded => return outcome,
        };
        c.audit.record(&event);
        outcome
    }
}

/// Fetches, validates, and evaluates one candidate.
fn evaluate_one(
    queue: &dyn SubmissionQueue,
    engine: &HeuristicEngine<'_, dyn EndpointProbe + '_>,
    id: &PendingId,
) -> Result<(Candidate, Evaluation), String> {
    let body = queue.fetch(id).map_err(|err| err.to_string())?;
    let candidate = Candidate::from_body(id.clone(), body).map_err(|err| err.to_string())?;
    let evaluation = engine.evaluate(&candidate.record);
    Ok((candidate, evaluation))
}
