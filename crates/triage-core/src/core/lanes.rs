// crates/triage-core/src/core/lanes.rs
// ============================================================================
// Module: Lane Documents
// Description: Published accepted/sandbox/rejected documents.
// Purpose: Define the on-disk lane schema and the item identity key.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! A lane document is a projection of the ledger: `{schema, version,
//! updated_at, lane, items}`. Each item is the raw candidate body with an
//! added `added_from_pending` key carrying the queue identifier.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::decision::Lane;
use crate::core::identifiers::PendingId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema identifier of lane documents.
pub const LANE_SCHEMA: &str = "triage-lane/v1";
/// Schema version of lane documents.
pub const LANE_VERSION: &str = "1.0";
/// Item key carrying the originating queue identifier.
pub const PENDING_KEY: &str = "added_from_pending";

// ============================================================================
// SECTION: Items
// ============================================================================

/// Lane item: candidate body plus `added_from_pending`.
pub type LaneItem = Map<String, Value>;

/// Builds a lane item from a candidate body.
#[must_use]
pub fn lane_item(pending_id: &PendingId, body: &Map<String, Value>) -> LaneItem {
    let mut item = body.clone();
    item.insert(PENDING_KEY.to_string(), Value::String(pending_id.as_str().to_string()));
    item
}

/// Returns the queue identifier recorded on a lane item.
#[must_use]
pub fn item_pending_id(item: &LaneItem) -> Option<PendingId> {
    item.get(PENDING_KEY).and_then(Value::as_str).map(PendingId::new)
}

// ============================================================================
// SECTION: Document
// ============================================================================

/// Published lane document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneDocument {
    /// Schema identifier.
    pub schema: String,
    /// Schema version.
    pub version: String,
    /// Time of the last content change.
    pub updated_at: Timestamp,
    /// Lane document name.
    pub lane: String,
    /// Lane items in insertion order.
    #[serde(default)]
    pub items: Vec<LaneItem>,
}

impl LaneDocument {
    /// Creates an empty document for a lane.
    #[must_use]
    pub fn empty(lane: Lane, updated_at: Timestamp) -> Self {
        Self {
            schema: LANE_SCHEMA.to_string(),
            version: LANE_VERSION.to_string(),
            updated_at,
            lane: lane.document_name().to_string(),
            items: Vec::new(),
        }
    }

    /// Iterates the queue identifiers of all items that carry one.
    pub fn pending_ids(&self) -> impl Iterator<Item = PendingId> + '_ {
        self.items.iter().filter_map(item_pending_id)
    }
}
