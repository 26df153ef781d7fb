// crates/triage-core/src/interfaces/mod.rs
// ============================================================================
// Module: Triage Interfaces
// Description: Backend-agnostic collaborators for queue, probes, and storage.
// Purpose: Define the contract surfaces used by the triage runtime.
// Dependencies: serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! The runtime never touches the network or the filesystem directly. Every
//! side effect goes through one of these traits so the pipeline can run
//! against in-memory fakes in tests and against HTTP and file backends in
//! production.
//!
//! Collaborators used from worker threads ([`SubmissionQueue`] and
//! [`EndpointProbe`]) must be `Send + Sync`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::lanes::LaneDocument;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Submission Queue
// ============================================================================

/// Submission queue errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Transport failed (connection, timeout, TLS).
    #[error("queue transport error: {0}")]
    Transport(String),
    /// Queue answered with a non-success status.
    #[error("queue returned status {0}")]
    Status(u16),
    /// Queue answered but reported the item as unavailable.
    #[error("queue rejected request: {0}")]
    Rejected(String),
    /// Queue response did not match the expected shape.
    #[error("queue response invalid: {0}")]
    Invalid(String),
}

/// Remote queue of externally submitted candidates.
pub trait SubmissionQueue: Send + Sync {
    /// Returns a human-readable location of the queue for run snapshots.
    fn describe(&self) -> String;

    /// Lists pending candidate identifiers in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the list cannot be fetched.
    fn list_pending(&self) -> Result<Vec<PendingId>, QueueError>;

    /// Fetches the detail body of one pending candidate.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the detail cannot be fetched.
    fn fetch(&self, id: &PendingId) -> Result<Value, QueueError>;
}

// ============================================================================
// SECTION: Endpoint Probe
// ============================================================================

/// Probe errors; always degraded to a `false` signal by the engine.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Transport failed (connection, timeout, TLS).
    #[error("probe transport error: {0}")]
    Transport(String),
    /// Target URL is not permitted for probing.
    #[error("probe target not allowed: {0}")]
    NotAllowed(String),
}

/// Bounded network probe against a single URL.
pub trait EndpointProbe: Send + Sync {
    /// Returns `Ok(true)` when the endpoint answered with a success status.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError`] when the endpoint could not be reached.
    fn probe(&self, url: &Url) -> Result<bool, ProbeError>;
}

// ============================================================================
// SECTION: Storage
// ============================================================================

/// Storage errors raised by ledger, lane, and snapshot backends.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure; the affected artifact may need re-verification.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored content is malformed.
    #[error("store data corrupt: {0}")]
    Corrupt(String),
    /// Store rejected the request.
    #[error("store invalid: {0}")]
    Invalid(String),
}

/// Append-only byte store backing the ledger.
pub trait LedgerStore: Send + Sync {
    /// Reads the complete stored ledger bytes (empty when absent).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the ledger cannot be read.
    fn read_all(&self) -> Result<Vec<u8>, StoreError>;

    /// Durably appends one newline-terminated line.
    ///
    /// Implementations isolate a torn tail by writing a leading `\n` when the
    /// existing content does not end with one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the line cannot be appended.
    fn append_line(&self, line: &[u8]) -> Result<(), StoreError>;
}

impl<T: LedgerStore + ?Sized> LedgerStore for &T {
    fn read_all(&self) -> Result<Vec<u8>, StoreError> {
        (**self).read_all()
    }

    fn append_line(&self, line: &[u8]) -> Result<(), StoreError> {
        (**self).append_line(line)
    }
}

/// Locations a lane document was published to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLane {
    /// Primary document path.
    pub primary: PathBuf,
    /// Mirror copies, byte-identical to the primary.
    pub mirrors: Vec<PathBuf>,
}

/// Repository of published lane documents.
pub trait LaneRepository: Send + Sync {
    /// Loads the current document of a lane, `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the document exists but cannot be read.
    fn load(&self, lane: Lane) -> Result<Option<LaneDocument>, StoreError>;

    /// Atomically writes the encoded document to the primary and every mirror.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any write fails.
    fn publish(&self, lane: Lane, bytes: &[u8]) -> Result<PublishedLane, StoreError>;

    /// Copies a sidecar artifact (e.g. a signature) next to every mirror copy.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when any copy fails.
    fn mirror_artifact(&self, artifact: &Path) -> Result<Vec<PathBuf>, StoreError>;

    /// Removes a sidecar artifact and its copy in every mirror, returning the
    /// paths that existed. Missing copies are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when an existing copy cannot be removed.
    fn remove_artifact(&self, artifact: &Path) -> Result<Vec<PathBuf>, StoreError>;
}

/// Sink for run snapshots.
pub trait SnapshotSink: Send + Sync {
    /// Persists an encoded snapshot for the run at `ts`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the snapshot cannot be written.
    fn write_snapshot(&self, ts: &Timestamp, bytes: &[u8]) -> Result<PathBuf, StoreError>;
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Signing errors.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Signing tool or key is not available.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// Signing tool ran and failed.
    #[error("signing failed: {0}")]
    Failed(String),
}

/// Capability-checked external signer producing detached signatures.
pub trait ArtifactSigner: Send + Sync {
    /// Returns true when the signer can be invoked.
    fn available(&self) -> bool;

    /// Returns the detached signature path `sign` would produce for `path`.
    fn signature_path(&self, path: &Path) -> PathBuf;

    /// Signs `path` and returns the detached signature path.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError`] when signing fails.
    fn sign(&self, path: &Path) -> Result<PathBuf, SignerError>;
}
