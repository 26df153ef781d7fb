// crates/triage-store-fs/src/lanes.rs
// ============================================================================
// Module: File Lane Repository
// Description: Lane documents in a primary directory plus mirror directories.
// Purpose: Publish byte-identical lane copies with atomic writes.
// Dependencies: triage-core, serde_json
// ============================================================================

//! ## Overview
//! Documents live at `<dir>/<lane>.json`. Only the primary copy is read back;
//! mirrors are written from the same bytes on every publish, so they cannot
//! drift from the primary unless edited out of band.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use triage_core::Lane;
use triage_core::LaneDocument;
use triage_core::LaneRepository;
use triage_core::PublishedLane;
use triage_core::StoreError;

use crate::atomic::remove_if_present;
use crate::atomic::write_atomic;

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Lane repository rooted at a primary directory.
#[derive(Debug, Clone)]
pub struct FileLaneRepository {
    /// Primary lane directory.
    primary: PathBuf,
    /// Mirror directories receiving verbatim copies.
    mirrors: Vec<PathBuf>,
}

impl FileLaneRepository {
    /// Creates a repository.
    #[must_use]
    pub const fn new(primary: PathBuf, mirrors: Vec<PathBuf>) -> Self {
        Self {
            primary,
            mirrors,
        }
    }

    /// Returns the primary document path of a lane.
    #[must_use]
    pub fn document_path(&self, lane: Lane) -> PathBuf {
        lane_path(&self.primary, lane)
    }

    /// Returns the mirror directories.
    #[must_use]
    pub fn mirrors(&self) -> &[PathBuf] {
        &self.mirrors
    }
}

/// Returns the path of a lane document within a directory.
fn lane_path(dir: &Path, lane: Lane) -> PathBuf {
    dir.join(format!("{}.json", lane.document_name()))
}

impl LaneRepository for FileLaneRepository {
    fn load(&self, lane: Lane) -> Result<Option<LaneDocument>, StoreError> {
        let path = self.document_path(lane);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::Io(format!("{}: {err}", path.display()))),
        };
        let document: LaneDocument = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
        if document.lane != lane.document_name() {
            return Err(StoreError::Corrupt(format!(
                "{}: lane field is '{}', expected '{}'",
                path.display(),
                document.lane,
                lane.document_name()
            )));
        }
        Ok(Some(document))
    }

    fn publish(&self, lane: Lane, bytes: &[u8]) -> Result<PublishedLane, StoreError> {
        let primary = self.document_path(lane);
        write_atomic(&primary, bytes)?;
        let mut mirrors = Vec::with_capacity(self.mirrors.len());
        for dir in &self.mirrors {
            let mirror = lane_path(dir, lane);
            write_atomic(&mirror, bytes)?;
            mirrors.push(mirror);
        }
        Ok(PublishedLane {
            primary,
            mirrors,
        })
    }

    fn mirror_artifact(&self, artifact: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let name = artifact.file_name().ok_or_else(|| {
            StoreError::Invalid(format!("artifact has no file name: {}", artifact.display()))
        })?;
        let bytes = fs::read(artifact)
            .map_err(|err| StoreError::Io(format!("{}: {err}", artifact.display())))?;
        let mut copies = Vec::with_capacity(self.mirrors.len());
        for dir in &self.mirrors {
            let copy = dir.join(name);
            write_atomic(&copy, &bytes)?;
            copies.push(copy);
        }
        Ok(copies)
    }

    fn remove_artifact(&self, artifact: &Path) -> Result<Vec<PathBuf>, StoreError> {
        let name = artifact.file_name().ok_or_else(|| {
            StoreError::Invalid(format!("artifact has no file name: {}", artifact.display()))
        })?;
        let mut removed = Vec::new();
        let targets = std::iter::once(artifact.to_path_buf())
            .chain(self.mirrors.iter().map(|dir| dir.join(name)));
        for target in targets {
            if remove_if_present(&target)? {
                removed.push(target);
            }
        }
        Ok(removed)
    }
}
