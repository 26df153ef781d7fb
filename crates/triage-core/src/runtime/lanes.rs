// crates/triage-core/src/runtime/lanes.rs
// ============================================================================
// Module: Lane Store
// Description: Idempotent, cross-lane-unique membership over lane documents.
// Purpose: Apply decisions to the published lanes without ever moving items.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The [`SeenIndex`] is built once from the existing documents and owned by the
//! [`LaneStore`]; there is no other shared "seen" state. Recording an id that
//! is already indexed is a no-op, so re-running a batch never changes a lane.
//!
//! Lane documents are a projection of the ledger: [`project_lanes`] rebuilds
//! all three from decision payloads alone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::lanes::LaneDocument;
use crate::core::lanes::LaneItem;
use crate::core::lanes::item_pending_id;
use crate::core::lanes::lane_item;
use crate::core::ledger::LedgerPayload;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lane store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaneError {
    /// An id appears more than once across the existing lane documents.
    #[error("pending id {id} appears in both {first} and {second}")]
    DuplicateIdentity {
        /// Duplicated id.
        id: String,
        /// Lane the id was first seen in.
        first: String,
        /// Lane the duplicate was found in.
        second: String,
    },
    /// A document names a lane outside the fixed set.
    #[error("unknown lane document: {0}")]
    UnknownLane(String),
    /// Two documents claim the same lane.
    #[error("lane document provided twice: {0}")]
    DuplicateLane(String),
    /// An item to record carries no `added_from_pending`.
    #[error("lane item has no pending id")]
    MissingIdentity,
}

// ============================================================================
// SECTION: Seen Index
// ============================================================================

/// Identity index from pending id to the lane holding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenIndex(BTreeMap<PendingId, Lane>);

impl SeenIndex {
    /// Builds the index from lane documents, failing on any duplicate id.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::DuplicateIdentity`] when an id is already present
    /// more than once.
    pub fn from_documents<'a>(
        documents: impl IntoIterator<Item = (Lane, &'a LaneDocument)>,
    ) -> Result<Self, LaneError> {
        let mut index = BTreeMap::new();
        for (lane, document) in documents {
            for id in document.pending_ids() {
                if let Some(first) = index.get(&id) {
                    return Err(duplicate(&id, *first, lane));
                }
                index.insert(id, lane);
            }
        }
        Ok(Self(index))
    }

    /// Returns true when the id is already placed in a lane.
    #[must_use]
    pub fn contains(&self, id: &PendingId) -> bool {
        self.0.contains_key(id)
    }

    /// Returns the lane holding the id.
    #[must_use]
    pub fn lane_of(&self, id: &PendingId) -> Option<Lane> {
        self.0.get(id).copied()
    }

    /// Returns the number of indexed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no id is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds a duplicate-identity error.
fn duplicate(id: &PendingId, first: Lane, second: Lane) -> LaneError {
    LaneError::DuplicateIdentity {
        id: id.to_string(),
        first: first.document_name().to_string(),
        second: second.document_name().to_string(),
    }
}

// ============================================================================
// SECTION: Lane Store
// ============================================================================

/// In-memory working copy of the three lane documents.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneStore {
    /// One document per lane.
    documents: BTreeMap<Lane, LaneDocument>,
    /// Identity index over every document.
    seen: SeenIndex,
    /// Lanes modified since load.
    changed: BTreeSet<Lane>,
}

impl LaneStore {
    /// Builds a store from existing documents; absent lanes start empty.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError`] when a document names an unknown lane, a lane is
    /// supplied twice, or the documents already violate cross-lane uniqueness.
    pub fn from_documents(
        documents: impl IntoIterator<Item = LaneDocument>,
        created_at: &Timestamp,
    ) -> Result<Self, LaneError> {
        let mut by_lane = BTreeMap::new();
        for document in documents {
            let lane = Lane::from_document_name(&document.lane)
                .ok_or_else(|| LaneError::UnknownLane(document.lane.clone()))?;
            if by_lane.insert(lane, document).is_some() {
                return Err(LaneError::DuplicateLane(lane.document_name().to_string()));
            }
        }
        for lane in Lane::ALL {
            by_lane.entry(lane).or_insert_with(|| LaneDocument::empty(lane, created_at.clone()));
        }
        let seen = SeenIndex::from_documents(by_lane.iter().map(|(lane, doc)| (*lane, doc)))?;
        Ok(Self {
            documents: by_lane,
            seen,
            changed: BTreeSet::new(),
        })
    }

    /// Places an item in a lane unless its id is already placed anywhere.
    ///
    /// Returns `true` when the lane changed.
    ///
    /// # Errors
    ///
    /// Returns [`LaneError::MissingIdentity`] when the item has no pending id.
    pub fn record(&mut self, lane: Lane, item: LaneItem) -> Result<bool, LaneError> {
        let id = item_pending_id(&item).ok_or(LaneError::MissingIdentity)?;
        if self.seen.contains(&id) {
            return Ok(false);
        }
        let Some(document) = self.documents.get_mut(&lane) else {
            return Err(LaneError::UnknownLane(lane.document_name().to_string()));
        };
        document.items.push(item);
        self.seen.0.insert(id, lane);
        self.changed.insert(lane);
        Ok(true)
    }

    /// Returns the identity index.
    #[must_use]
    pub const fn seen(&self) -> &SeenIndex {
        &self.seen
    }

    /// Returns the document of a lane.
    #[must_use]
    pub fn document(&self, lane: Lane) -> Option<&LaneDocument> {
        self.documents.get(&lane)
    }

    /// Returns lanes modified since load, in publication order.
    #[must_use]
    pub fn changed_lanes(&self) -> Vec<Lane> {
        self.changed.iter().copied().collect()
    }

    /// Bumps `updated_at` on every changed lane and returns them for publishing.
    pub fn finalize(&mut self, ts: &Timestamp) -> Vec<(Lane, &LaneDocument)> {
        for lane in &self.changed {
            if let Some(document) = self.documents.get_mut(lane) {
                document.updated_at = ts.clone();
            }
        }
        self.documents
            .iter()
            .filter(|(lane, _)| self.changed.contains(*lane))
            .map(|(lane, document)| (*lane, document))
            .collect()
    }

    /// Returns item counts keyed by lane document name.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.documents
            .iter()
            .map(|(lane, document)| (lane.document_name().to_string(), document.items.len()))
            .collect()
    }

    /// Consumes the store and returns the documents in publication order.
    #[must_use]
    pub fn into_documents(self) -> Vec<(Lane, LaneDocument)> {
        self.documents.into_iter().collect()
    }
}

// ============================================================================
// SECTION: Projection
// ============================================================================

/// Rebuilds all three lanes purely from ledger decisions.
///
/// The first decision per pending id wins; later duplicates are ignored.
///
/// # Errors
///
/// Returns [`LaneError`] when a decision cannot be placed.
pub fn project_lanes(decisions: &[LedgerPayload], ts: &Timestamp) -> Result<LaneStore, LaneError> {
    let mut store = LaneStore::from_documents(Vec::new(), ts)?;
    for payload in decisions {
        store.record(payload.decision, lane_item(&payload.pending_id, &payload.body))?;
    }
    store.finalize(ts);
    Ok(store)
}
