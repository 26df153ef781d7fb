// crates/triage-core/tests/heuristics.rs
// ============================================================================
// Module: Heuristic Engine and Decision Tests
// Description: Signals, hard-fail precedence, scoring, and lane thresholds.
// ============================================================================
//! ## Overview
//! Exercises the heuristic engine against an in-memory probe and checks the
//! decision state machine's inclusive thresholds.

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

use serde_json::json;
use triage_core::Allowlist;
use triage_core::Candidate;
use triage_core::DecisionReason;
use triage_core::Evaluation;
use triage_core::HardFailRule;
use triage_core::HeuristicEngine;
use triage_core::InMemoryProbe;
use triage_core::Lane;
use triage_core::PendingId;
use triage_core::RuleId;
use triage_core::RuleOperator;
use triage_core::RuleSet;
use triage_core::Signal;
use triage_core::SignalSet;
use triage_core::SoftRule;
use triage_core::Thresholds;
use triage_core::UrlField;
use triage_core::decide;

fn candidate(body: serde_json::Value) -> Candidate {
    Candidate::from_body(PendingId::new("p-1"), body).unwrap()
}

fn base_rules() -> RuleSet {
    RuleSet {
        thresholds: Thresholds {
            min_score_to_accept: 70,
            min_score_to_sandbox: 40,
        },
        allowlist: Allowlist {
            hosts: BTreeSet::from(["example.org".to_string()]),
            repo_prefixes: vec!["https://github.com/trusted-org/".to_string()],
            host_bonus: 20,
            repo_bonus: 15,
        },
        hard_fail: vec![HardFailRule {
            id: RuleId::new("no-onion"),
            field: UrlField::Host,
            operator: RuleOperator::Suffix(".onion".to_string()),
        }],
        soft: vec![
            SoftRule {
                signal: Signal::WellKnownReachable,
                delta: 30,
            },
            SoftRule {
                signal: Signal::RepoKnownProvider,
                delta: 25,
            },
        ],
    }
}

fn evaluation(score: u8, hard_fail: Option<&str>) -> Evaluation {
    Evaluation {
        score,
        signals: SignalSet::new(),
        hard_fail: hard_fail.map(RuleId::new),
    }
}

#[test]
fn example_candidate_scores_fifty() {
    let rules = base_rules();
    let probe = InMemoryProbe::new().with_reachable("https://example.org/.well-known/x");
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let record = candidate(json!({
        "url": "https://example.org",
        "wellKnown": "https://example.org/.well-known/x"
    }))
    .record;

    let evaluation = engine.evaluate(&record);
    assert_eq!(evaluation.score, 50);
    assert!(evaluation.hard_fail.is_none());
    assert!(evaluation.signals.is_true(Signal::WellKnownReachable));
    assert!(!evaluation.signals.is_true(Signal::RepoKnownProvider));
    assert!(!evaluation.signals.is_true(Signal::PublicKeyPresent));
    assert_eq!(
        probe.calls(),
        vec![
            "https://example.org/.well-known/x",
            "https://example.org/.well-known/minisign.pub",
            "https://example.org/.well-known/sha256.json",
            "https://example.org/.well-known/security.txt",
        ]
    );
}

#[test]
fn probe_signals_are_recorded_false_without_well_known() {
    let rules = base_rules();
    let probe = InMemoryProbe::new();
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let evaluation = engine.evaluate(&candidate(json!({"url": "http://other.example"})).record);
    assert!(probe.calls().is_empty());
    assert!(evaluation.signals.contains(Signal::SecurityContactPresent));
    assert!(!evaluation.signals.is_true(Signal::UrlHttps));
    assert_eq!(evaluation.score, 0);
}

#[test]
fn hard_fail_short_circuits_before_probing() {
    let mut rules = base_rules();
    rules.allowlist.hosts.insert("mirror.onion".to_string());
    rules.allowlist.host_bonus = 100;
    let probe = InMemoryProbe::new().with_reachable("https://mirror.onion/.well-known/");
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let evaluation = engine.evaluate(
        &candidate(json!({
            "url": "https://mirror.onion",
            "wellKnown": "https://mirror.onion/.well-known/",
            "repo": "https://github.com/trusted-org/tool"
        }))
        .record,
    );
    assert_eq!(evaluation.hard_fail, Some(RuleId::new("no-onion")));
    assert_eq!(evaluation.score, 0);
    assert!(probe.calls().is_empty());
    assert!(evaluation.signals.is_true(Signal::RepoKnownProvider));
    assert!(!evaluation.signals.contains(Signal::WellKnownReachable));

    let decision = decide(evaluation, rules.thresholds);
    assert_eq!(decision.lane, Lane::Reject);
    assert_eq!(decision.reason.label(), "hard_fail:no-onion");
}

#[test]
fn first_declared_hard_fail_wins() {
    let mut rules = base_rules();
    rules.hard_fail.insert(
        0,
        HardFailRule {
            id: RuleId::new("plain-http"),
            field: UrlField::Scheme,
            operator: RuleOperator::Equals("HTTP".to_string()),
        },
    );
    let probe = InMemoryProbe::new();
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let evaluation = engine.evaluate(&candidate(json!({"url": "http://x.onion"})).record);
    assert_eq!(evaluation.hard_fail, Some(RuleId::new("plain-http")));
}

#[test]
fn scores_clamp_to_range() {
    let mut rules = base_rules();
    rules.soft = vec![
        SoftRule {
            signal: Signal::UrlHttps,
            delta: 90,
        },
        SoftRule {
            signal: Signal::HasRepo,
            delta: 90,
        },
    ];
    let probe = InMemoryProbe::new();
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let high = engine.evaluate(
        &candidate(json!({"url": "https://example.org", "repo": "https://github.com/trusted-org/a"}))
            .record,
    );
    assert_eq!(high.score, 100);

    rules.soft = vec![SoftRule {
        signal: Signal::UrlHttps,
        delta: -500,
    }];
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let low = engine.evaluate(&candidate(json!({"url": "https://example.org"})).record);
    assert_eq!(low.score, 0);
}

#[test]
fn repo_prefix_bonus_requires_prefix_match() {
    let mut rules = base_rules();
    rules.soft.clear();
    rules.allowlist.host_bonus = 0;
    let probe = InMemoryProbe::new();
    let engine = HeuristicEngine::new(&rules, &probe).unwrap();
    let trusted = engine.evaluate(
        &candidate(json!({"url": "https://a.test", "repo": "https://github.com/trusted-org/tool"}))
            .record,
    );
    let other = engine.evaluate(
        &candidate(json!({"url": "https://a.test", "repo": "https://github.com/someone/tool"}))
            .record,
    );
    assert_eq!(trusted.score, 15);
    assert_eq!(other.score, 0);
}

#[test]
fn engine_rejects_inverted_thresholds() {
    let mut rules = base_rules();
    rules.thresholds.min_score_to_accept = 10;
    let probe = InMemoryProbe::new();
    assert!(HeuristicEngine::new(&rules, &probe).is_err());
}

#[test]
fn thresholds_are_inclusive() {
    let thresholds = Thresholds {
        min_score_to_accept: 70,
        min_score_to_sandbox: 40,
    };
    assert_eq!(decide(evaluation(70, None), thresholds).lane, Lane::Accept);
    assert_eq!(decide(evaluation(69, None), thresholds).lane, Lane::Sandbox);
    assert_eq!(decide(evaluation(40, None), thresholds).lane, Lane::Sandbox);
    let below = decide(evaluation(39, None), thresholds);
    assert_eq!(below.lane, Lane::Reject);
    assert_eq!(below.reason, DecisionReason::BelowSandboxThreshold);
}

#[test]
fn equal_thresholds_make_sandbox_unreachable() {
    let thresholds = Thresholds {
        min_score_to_accept: 50,
        min_score_to_sandbox: 50,
    };
    assert_eq!(decide(evaluation(50, None), thresholds).lane, Lane::Accept);
    assert_eq!(decide(evaluation(49, None), thresholds).lane, Lane::Reject);
}

#[test]
fn hard_fail_rejects_even_with_top_score() {
    let decision = decide(evaluation(100, Some("blocked")), Thresholds::default());
    assert_eq!(decision.lane, Lane::Reject);
    assert_eq!(decision.hard_fail, Some(RuleId::new("blocked")));
    assert_eq!(decision.reason.to_string(), "hard_fail:blocked");
}
