// crates/triage-store-fs/src/lib.rs
// ============================================================================
// Module: Triage Filesystem Store
// Description: Filesystem-backed ledger, lane, snapshot, and audit collaborators.
// Purpose: Persist triage state with atomic, durable file operations.
// Dependencies: triage-core, cap-std, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every document this crate writes goes through [`write_atomic`]: readers
//! observe either the previous content or the new content, never a prefix.
//! The ledger is the exception; it is append-only and fsynced per line, and a
//! torn tail from an interrupted append is isolated on its own line.

pub mod atomic;
pub mod audit;
pub mod canon;
pub mod lanes;
pub mod ledger;
pub mod snapshot;

pub use atomic::AtomicWriteError;
pub use atomic::remove_if_present;
pub use atomic::write_atomic;
pub use audit::FileAuditSink;
pub use canon::DEFAULT_MAX_ITEMS;
pub use canon::canonicalize_file;
pub use canon::check_file;
pub use lanes::FileLaneRepository;
pub use ledger::FileLedgerStore;
pub use snapshot::FileSnapshotSink;
