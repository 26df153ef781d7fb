// crates/triage-core/tests/ledger.rs
// ============================================================================
// Module: Ledger Tests
// Description: Hash chaining, torn-tail recovery, and tamper detection.
// Purpose: Validate the append-only, tamper-evident ledger contract.
// ============================================================================

//! Ledger unit tests.

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

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use triage_core::GENESIS_HASH;
use triage_core::InMemoryLedgerStore;
use triage_core::Lane;
use triage_core::Ledger;
use triage_core::LedgerEntry;
use triage_core::LedgerIssue;
use triage_core::LedgerPayload;
use triage_core::PendingId;
use triage_core::SignalSet;
use triage_core::Timestamp;
use triage_core::core::canonical::canonical_json_bytes;
use triage_core::core::canonical::sha256_hex;
use triage_core::core::ledger::compute_entry_hash;
use triage_core::verify_ledger;

fn payload(id: &str) -> LedgerPayload {
    let mut body = Map::new();
    body.insert("url".to_string(), json!(format!("https://{id}.example")));
    LedgerPayload {
        ts: Timestamp::parse("2026-01-10T18:10:26Z").unwrap(),
        pending_id: PendingId::new(id),
        decision: Lane::Sandbox,
        lane: "sandbox".to_string(),
        reason: "score_meets_sandbox_threshold".to_string(),
        score: 50,
        signals: SignalSet::new(),
        hard_fail: None,
        body,
    }
}

fn lines(bytes: &[u8]) -> Vec<Value> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn empty_ledger_starts_at_sentinel() {
    let store = InMemoryLedgerStore::new();
    let (ledger, replay) = Ledger::open(&store).unwrap();
    assert_eq!(ledger.last_hash().unwrap(), GENESIS_HASH);
    assert!(replay.entries.is_empty());
}

#[test]
fn entries_chain_from_sentinel() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    let first = ledger.append(&payload("a")).unwrap();
    let second = ledger.append(&payload("b")).unwrap();

    assert_eq!(first.prev_hash, GENESIS_HASH);
    assert_eq!(second.prev_hash, first.entry_hash);
    assert_eq!(ledger.last_hash().unwrap(), second.entry_hash);

    let stored = lines(&store.contents());
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1]["prev_hash"], json!(first.entry_hash));
}

#[test]
fn entry_hash_is_sha256_of_prev_newline_canonical_payload() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    let entry = ledger.append(&payload("a")).unwrap();

    let mut material = GENESIS_HASH.as_bytes().to_vec();
    material.push(b'\n');
    material.extend(canonical_json_bytes(&entry.payload).unwrap());
    assert_eq!(entry.entry_hash, sha256_hex(&material));
    assert_eq!(entry.entry_hash, compute_entry_hash(GENESIS_HASH, &entry.payload).unwrap());
}

#[test]
fn ledger_lines_are_canonical() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    let entry = ledger.append(&payload("a")).unwrap();
    let mut expected = canonical_json_bytes(&entry).unwrap();
    expected.push(b'\n');
    assert_eq!(store.contents(), expected);
    assert!(!store.contents().windows(2).any(|w| w == b": "));
}

#[test]
fn reopen_resumes_from_stored_tip() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    let first = ledger.append(&payload("a")).unwrap();
    drop(ledger);

    let (reopened, replay) = Ledger::open(&store).unwrap();
    assert_eq!(reopened.last_hash().unwrap(), first.entry_hash);
    assert_eq!(replay.seen_ids(), BTreeSet::from([PendingId::new("a")]));
    assert_eq!(replay.decisions()[0].pending_id, PendingId::new("a"));
}

#[test]
fn torn_tail_is_treated_as_absent() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    let first = ledger.append(&payload("a")).unwrap();
    let mut bytes = store.contents();
    bytes.extend_from_slice(br#"{"entry_hash":"abc","payl"#);
    let torn = InMemoryLedgerStore::from_bytes(&bytes);

    let (ledger, replay) = Ledger::open(&torn).unwrap();
    assert_eq!(ledger.last_hash().unwrap(), first.entry_hash);
    assert_eq!(replay.malformed_lines, vec![2]);

    let second = ledger.append(&payload("b")).unwrap();
    assert_eq!(second.prev_hash, first.entry_hash);
    let contents = String::from_utf8(torn.contents()).unwrap();
    let last = contents.lines().last().unwrap();
    let parsed: LedgerEntry = serde_json::from_str(last).unwrap();
    assert_eq!(parsed, second);

    let verification = verify_ledger(&torn.contents()).unwrap();
    assert!(verification.is_intact());
    assert_eq!(verification.entries, 2);
    assert_eq!(verification.issues, vec![LedgerIssue::Malformed {
        line: 2
    }]);
}

#[test]
fn only_torn_line_falls_back_to_sentinel() {
    let store = InMemoryLedgerStore::from_bytes(b"{\"prev_hash\":\"00");
    let (ledger, _) = Ledger::open(&store).unwrap();
    assert_eq!(ledger.last_hash().unwrap(), GENESIS_HASH);
}

#[test]
fn verification_detects_payload_tampering() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    ledger.append(&payload("a")).unwrap();
    ledger.append(&payload("b")).unwrap();
    ledger.append(&payload("c")).unwrap();

    let original = String::from_utf8(store.contents()).unwrap();
    assert!(verify_ledger(original.as_bytes()).unwrap().is_intact());

    let tampered = original.replacen("\"score\":50", "\"score\":99", 1);
    let verification = verify_ledger(tampered.as_bytes()).unwrap();
    assert!(!verification.is_intact());
    assert!(matches!(verification.issues[0], LedgerIssue::EntryHashMismatch { line: 1, .. }));
}

#[test]
fn verification_detects_removed_entry() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(&store).unwrap();
    ledger.append(&payload("a")).unwrap();
    ledger.append(&payload("b")).unwrap();
    ledger.append(&payload("c")).unwrap();

    let original = String::from_utf8(store.contents()).unwrap();
    let without_middle: Vec<&str> =
        original.lines().enumerate().filter(|(i, _)| *i != 1).map(|(_, l)| l).collect();
    let verification = verify_ledger(without_middle.join("\n").as_bytes()).unwrap();
    assert!(matches!(verification.issues.as_slice(), [LedgerIssue::PrevHashMismatch { line: 2, .. }]));
}

#[test]
fn concurrent_appends_never_share_prev_hash() {
    let store = InMemoryLedgerStore::new();
    let (ledger, _) = Ledger::open(store.clone()).unwrap();
    let ledger = Arc::new(ledger);
    let handles: Vec<_> = (0 .. 8)
        .map(|worker| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for n in 0 .. 10 {
                    ledger.append(&payload(&format!("w{worker}-{n}"))).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let verification = verify_ledger(&store.contents()).unwrap();
    assert_eq!(verification.entries, 80);
    assert!(verification.issues.is_empty());
    let prevs: BTreeSet<String> = lines(&store.contents())
        .iter()
        .map(|line| line["prev_hash"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(prevs.len(), 80);
}
