// crates/triage-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Collaborators
// Description: Queue, probe, ledger, lane, and snapshot backends held in memory.
// Purpose: Run the pipeline deterministically without network or disk.
// Dependencies: serde_json, url
// ============================================================================

//! ## Overview
//! These collaborators back tests and dry runs. They honor the same contracts
//! as the HTTP and filesystem backends, including torn-tail isolation in the
//! ledger store and byte-identical mirror copies in the lane repository.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use url::Url;

use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::lanes::LaneDocument;
use crate::core::time::Timestamp;
use crate::interfaces::EndpointProbe;
use crate::interfaces::LaneRepository;
use crate::interfaces::LedgerStore;
use crate::interfaces::ProbeError;
use crate::interfaces::PublishedLane;
use crate::interfaces::QueueError;
use crate::interfaces::SnapshotSink;
use crate::interfaces::StoreError;
use crate::interfaces::SubmissionQueue;

/// Maps a poisoned lock to a store error.
fn poisoned(what: &str) -> StoreError {
    StoreError::Io(format!("{what} lock poisoned"))
}

// ============================================================================
// SECTION: Queue
// ============================================================================

/// Submission queue serving a fixed snapshot.
#[derive(Debug, Clone, Default)]
pub struct InMemorySubmissionQueue {
    /// Listed ids in queue order.
    pending: Vec<PendingId>,
    /// Detail bodies by id.
    details: BTreeMap<PendingId, Value>,
    /// Makes `list_pending` fail.
    fail_list: bool,
}

impl InMemorySubmissionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists an id and serves `body` as its detail.
    #[must_use]
    pub fn with_item(mut self, id: &str, body: Value) -> Self {
        let id = PendingId::new(id);
        self.pending.push(id.clone());
        self.details.insert(id, body);
        self
    }

    /// Lists an id whose detail call fails.
    #[must_use]
    pub fn with_missing_detail(mut self, id: &str) -> Self {
        self.pending.push(PendingId::new(id));
        self
    }

    /// Makes the list call fail.
    #[must_use]
    pub const fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }
}

impl SubmissionQueue for InMemorySubmissionQueue {
    fn describe(&self) -> String {
        "memory://queue".to_string()
    }

    fn list_pending(&self) -> Result<Vec<PendingId>, QueueError> {
        if self.fail_list {
            return Err(QueueError::Transport("list unavailable".to_string()));
        }
        Ok(self.pending.clone())
    }

    fn fetch(&self, id: &PendingId) -> Result<Value, QueueError> {
        self.details
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::Rejected(format!("pending id not found: {id}")))
    }
}

// ============================================================================
// SECTION: Probe
// ============================================================================

/// Probe answering from a fixed set of reachable URLs and recording calls.
#[derive(Debug, Default)]
pub struct InMemoryProbe {
    /// URLs that answer with success.
    reachable: BTreeSet<String>,
    /// URLs probed, in call order.
    calls: Mutex<Vec<String>>,
}

impl InMemoryProbe {
    /// Creates a probe for which every URL is unreachable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a URL as reachable.
    #[must_use]
    pub fn with_reachable(mut self, url: &str) -> Self {
        self.reachable.insert(url.to_string());
        self
    }

    /// Returns every probed URL in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl EndpointProbe for InMemoryProbe {
    fn probe(&self, url: &Url) -> Result<bool, ProbeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        Ok(self.reachable.contains(url.as_str()))
    }
}

// ============================================================================
// SECTION: Ledger Store
// ============================================================================

/// Ledger bytes held in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    /// Ledger content.
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl InMemoryLedgerStore {
    /// Creates an empty ledger store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with existing ledger bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(bytes.to_vec())),
        }
    }

    /// Returns the current ledger bytes.
    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.bytes.lock().map(|bytes| bytes.clone()).unwrap_or_default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn read_all(&self) -> Result<Vec<u8>, StoreError> {
        self.bytes.lock().map(|bytes| bytes.clone()).map_err(|_| poisoned("ledger"))
    }

    fn append_line(&self, line: &[u8]) -> Result<(), StoreError> {
        let mut bytes = self.bytes.lock().map_err(|_| poisoned("ledger"))?;
        if bytes.last().is_some_and(|last| *last != b'\n') {
            bytes.push(b'\n');
        }
        bytes.extend_from_slice(line);
        drop(bytes);
        Ok(())
    }
}

// ============================================================================
// SECTION: Lane Repository
// ============================================================================

/// Published files keyed by virtual path.
pub type FileMap = BTreeMap<PathBuf, Vec<u8>>;

/// Lane repository writing to virtual paths; clones share the same files.
#[derive(Debug, Clone)]
pub struct InMemoryLaneRepository {
    /// Primary directory.
    primary: PathBuf,
    /// Mirror directories.
    mirrors: Vec<PathBuf>,
    /// Published files.
    files: Arc<Mutex<FileMap>>,
}

impl Default for InMemoryLaneRepository {
    fn default() -> Self {
        Self::new(&["mirror"])
    }
}

impl InMemoryLaneRepository {
    /// Creates a repository with the given mirror directory names.
    #[must_use]
    pub fn new(mirrors: &[&str]) -> Self {
        Self {
            primary: PathBuf::from("lanes"),
            mirrors: mirrors.iter().map(PathBuf::from).collect(),
            files: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Stores raw bytes as the primary document of a lane.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file map lock is poisoned.
    pub fn seed(&self, lane: Lane, bytes: &[u8]) -> Result<(), StoreError> {
        self.insert_file(&lane_path(&self.primary, lane), bytes)
    }

    /// Stores raw bytes at a virtual path, e.g. a signature produced for a lane.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file map lock is poisoned.
    pub fn insert_file(&self, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        self.files.lock().map_err(|_| poisoned("lanes"))?.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    /// Returns the bytes stored at a virtual path.
    #[must_use]
    pub fn file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().ok().and_then(|files| files.get(path).cloned())
    }

    /// Returns the primary bytes of a lane.
    #[must_use]
    pub fn primary_bytes(&self, lane: Lane) -> Option<Vec<u8>> {
        self.file(&lane_path(&self.primary, lane))
    }

    /// Returns a copy of every stored file.
    #[must_use]
    pub fn files(&self) -> FileMap {
        self.files.lock().map(|files| files.clone()).unwrap_or_default()
    }
}

/// Returns the path of a lane document within a directory.
fn lane_path(dir: &Path, lane: Lane) -> PathBuf {
    dir.join(format!("{}.json", lane.document_name()))
}

impl LaneRepository for InMemoryLaneRepository {
    fn load(&self, lane: Lane) -> Result<Option<LaneDocument>, StoreError> {
        let Some(bytes) = self.primary_bytes(lane) else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", lane.document_name())))
    }

    fn publish(&self, lane: Lane, bytes: &[u8]) -> Result<PublishedLane, StoreError> {
        let primary = lane_path(&self.primary, lane);
        let mirrors: Vec<PathBuf> =
            self.mirrors.iter().map(|dir| lane_path(dir, lane)).collect();
        let mut files = self.files.lock().map_err(|_| poisoned("lanes"))?;
        files.insert(primary.clone(), bytes.to_vec());
        for mirror in &mirrors {
            files.insert(mirror.clone(), bytes.to_vec());
        }
        drop(files);
        Ok(PublishedLane {
            primary,
            mirrors,
        })
    }

    fn mirror_artifact(&self, artifact: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = self.files.lock().map_err(|_| poisoned("lanes"))?;
        let bytes = files
            .get(artifact)
            .cloned()
            .ok_or_else(|| StoreError::Invalid(format!("unknown artifact {}", artifact.display())))?;
        let name = artifact
            .file_name()
            .ok_or_else(|| StoreError::Invalid("artifact has no file name".to_string()))?;
        let mut copies = Vec::with_capacity(self.mirrors.len());
        for dir in &self.mirrors {
            let copy = dir.join(name);
            files.insert(copy.clone(), bytes.clone());
            copies.push(copy);
        }
        drop(files);
        Ok(copies)
    }

    fn remove_artifact(&self, artifact: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let name = artifact
            .file_name()
            .ok_or_else(|| StoreError::Invalid("artifact has no file name".to_string()))?;
        let mut files = self.files.lock().map_err(|_| poisoned("lanes"))?;
        let targets = std::iter::once(artifact.to_path_buf())
            .chain(self.mirrors.iter().map(|dir| dir.join(name)));
        let removed: Vec<PathBuf> = targets.filter(|target| files.remove(target).is_some()).collect();
        drop(files);
        Ok(removed)
    }
}

// ============================================================================
// SECTION: Snapshot Sink
// ============================================================================

/// Snapshot sink keeping encoded snapshots in memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotSink {
    /// Snapshots keyed by run timestamp.
    snapshots: Mutex<BTreeMap<Timestamp, Vec<u8>>>,
}

impl InMemorySnapshotSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored snapshot in timestamp order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<(Timestamp, Vec<u8>)> {
        self.snapshots
            .lock()
            .map(|snapshots| snapshots.iter().map(|(ts, b)| (ts.clone(), b.clone())).collect())
            .unwrap_or_default()
    }
}

impl SnapshotSink for InMemorySnapshotSink {
    fn write_snapshot(&self, ts: &Timestamp, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        self.snapshots.lock().map_err(|_| poisoned("snapshots"))?.insert(ts.clone(), bytes.to_vec());
        Ok(PathBuf::from(format!("state/run-{}.json", ts.compact())))
    }
}
