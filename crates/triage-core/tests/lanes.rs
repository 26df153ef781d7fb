// crates/triage-core/tests/lanes.rs
// ============================================================================
// Module: Lane Store Tests
// Description: Idempotent membership, cross-lane uniqueness, and projection.
// ============================================================================
//! ## Overview
//! Ensures recording is idempotent per pending id, duplicate ids in existing
//! documents fail closed, and lanes can be rebuilt from ledger decisions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::Map;
use serde_json::json;
use triage_core::Lane;
use triage_core::LaneDocument;
use triage_core::LaneError;
use triage_core::LaneStore;
use triage_core::LedgerPayload;
use triage_core::PendingId;
use triage_core::SignalSet;
use triage_core::Timestamp;
use triage_core::core::lanes::PENDING_KEY;
use triage_core::core::lanes::lane_item;
use triage_core::project_lanes;

fn ts(value: &str) -> Timestamp {
    Timestamp::parse(value).unwrap()
}

fn body(url: &str) -> Map<String, serde_json::Value> {
    let mut body = Map::new();
    body.insert("url".to_string(), json!(url));
    body
}

fn document(lane: Lane, ids: &[&str]) -> LaneDocument {
    let mut document = LaneDocument::empty(lane, ts("2026-01-01T00:00:00Z"));
    for id in ids {
        document.items.push(lane_item(&PendingId::new(*id), &body("https://x.example")));
    }
    document
}

#[test]
fn record_is_idempotent_across_lanes() {
    let now = ts("2026-02-01T00:00:00Z");
    let mut store = LaneStore::from_documents(vec![document(Lane::Accept, &["a"])], &now).unwrap();

    let item = lane_item(&PendingId::new("a"), &body("https://a.example"));
    assert!(!store.record(Lane::Reject, item).unwrap());
    assert!(store.changed_lanes().is_empty());

    let fresh = lane_item(&PendingId::new("b"), &body("https://b.example"));
    assert!(store.record(Lane::Sandbox, fresh.clone()).unwrap());
    assert!(!store.record(Lane::Sandbox, fresh).unwrap());
    assert_eq!(store.changed_lanes(), vec![Lane::Sandbox]);
    assert_eq!(store.seen().lane_of(&PendingId::new("b")), Some(Lane::Sandbox));
    assert_eq!(store.document(Lane::Sandbox).unwrap().items.len(), 1);
    assert_eq!(store.document(Lane::Sandbox).unwrap().items[0][PENDING_KEY], json!("b"));
}

#[test]
fn finalize_bumps_only_changed_lanes() {
    let created = ts("2026-01-01T00:00:00Z");
    let now = ts("2026-02-01T00:00:00Z");
    let mut store = LaneStore::from_documents(
        vec![document(Lane::Accept, &["a"]), document(Lane::Reject, &["r"])],
        &created,
    )
    .unwrap();
    store.record(Lane::Accept, lane_item(&PendingId::new("n"), &body("https://n.example"))).unwrap();

    let changed: Vec<Lane> = store.finalize(&now).into_iter().map(|(lane, _)| lane).collect();
    assert_eq!(changed, vec![Lane::Accept]);
    assert_eq!(store.document(Lane::Accept).unwrap().updated_at, now);
    assert_eq!(store.document(Lane::Reject).unwrap().updated_at, created);
    assert_eq!(store.counts()["accepted"], 2);
    assert_eq!(store.counts()["sandbox"], 0);
}

#[test]
fn existing_duplicates_fail_closed() {
    let now = ts("2026-02-01T00:00:00Z");
    let err = LaneStore::from_documents(
        vec![document(Lane::Accept, &["a"]), document(Lane::Reject, &["a"])],
        &now,
    )
    .unwrap_err();
    assert_eq!(err, LaneError::DuplicateIdentity {
        id: "a".to_string(),
        first: "accepted".to_string(),
        second: "rejected".to_string(),
    });

    let err = LaneStore::from_documents(vec![document(Lane::Sandbox, &["s", "s"])], &now)
        .unwrap_err();
    assert!(matches!(err, LaneError::DuplicateIdentity { .. }));
}

#[test]
fn unknown_and_repeated_lanes_are_rejected() {
    let now = ts("2026-02-01T00:00:00Z");
    let mut odd = document(Lane::Accept, &[]);
    odd.lane = "stable".to_string();
    assert_eq!(
        LaneStore::from_documents(vec![odd], &now).unwrap_err(),
        LaneError::UnknownLane("stable".to_string())
    );
    assert!(matches!(
        LaneStore::from_documents(vec![document(Lane::Accept, &[]), document(Lane::Accept, &[])], &now),
        Err(LaneError::DuplicateLane(_))
    ));
}

#[test]
fn items_without_identity_cannot_be_recorded() {
    let now = ts("2026-02-01T00:00:00Z");
    let mut store = LaneStore::from_documents(Vec::new(), &now).unwrap();
    assert_eq!(store.record(Lane::Accept, body("https://a.example")), Err(LaneError::MissingIdentity));
}

#[test]
fn projection_rebuilds_lanes_from_ledger_decisions() {
    let now = ts("2026-03-01T00:00:00Z");
    let decision = |id: &str, lane: Lane| LedgerPayload {
        ts: ts("2026-02-01T00:00:00Z"),
        pending_id: PendingId::new(id),
        decision: lane,
        lane: lane.document_name().to_string(),
        reason: "score_meets_accept_threshold".to_string(),
        score: 80,
        signals: SignalSet::new(),
        hard_fail: None,
        body: body(&format!("https://{id}.example")),
    };
    let decisions =
        vec![decision("a", Lane::Accept), decision("r", Lane::Reject), decision("a", Lane::Reject)];

    let store = project_lanes(&decisions, &now).unwrap();
    assert_eq!(store.seen().len(), 2);
    assert_eq!(store.seen().lane_of(&PendingId::new("a")), Some(Lane::Accept));
    let documents = store.into_documents();
    assert_eq!(documents.len(), 3);
    let (lane, accepted) = &documents[0];
    assert_eq!(*lane, Lane::Accept);
    assert_eq!(accepted.items, vec![lane_item(&PendingId::new("a"), &body("https://a.example"))]);
    assert_eq!(accepted.updated_at, now);
}
