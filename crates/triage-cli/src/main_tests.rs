// crates/triage-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing and collaborator wiring.
// Purpose: Ensure config maps onto collaborators and output renders stably.
// Dependencies: triage-cli main helpers
// ============================================================================

//! ## Overview
//! Covers the pieces of the entry point that do not need a live queue:
//! argument parsing, timestamp handling, config-to-collaborator mapping, and
//! the text renderers.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use clap::CommandFactory;
use clap::Parser;
use triage_config::TriageConfig;
use triage_core::GENESIS_HASH;
use triage_core::LedgerIssue;
use triage_core::LedgerVerification;

use super::Cli;
use super::Commands;
use super::LaneRebuildOutput;
use super::LedgerCommand;
use super::OutputFormat;
use super::build_signer;
use super::probe_config;
use super::render_rebuild_text;
use super::render_verification_text;
use super::resolve_timestamp;

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn canon_requires_files() {
    assert!(Cli::try_parse_from(["triage", "canon", "--check"]).is_err());
    assert!(Cli::try_parse_from(["triage", "canon", "--check", "a.json", "b.json"]).is_ok());
}

#[test]
fn ledger_verify_defaults_to_text() {
    let cli = Cli::try_parse_from(["triage", "ledger", "verify", "--config", "x.toml"]).unwrap();
    let Some(Commands::Ledger {
        command: LedgerCommand::Verify(command),
    }) = cli.command
    else {
        panic!("expected ledger verify");
    };
    assert_eq!(command.format, OutputFormat::Text);
    assert_eq!(command.config.config, Some(PathBuf::from("x.toml")));
}

#[test]
fn timestamp_override_must_be_canonical() {
    assert_eq!(
        resolve_timestamp(Some("2026-01-02T03:04:05Z")).unwrap().as_str(),
        "2026-01-02T03:04:05Z"
    );
    assert!(resolve_timestamp(Some("2026-01-02T03:04:05.5Z")).is_err());
    assert!(resolve_timestamp(Some("yesterday")).is_err());
    assert!(resolve_timestamp(None).unwrap().as_str().ends_with('Z'));
}

// ============================================================================
// SECTION: Wiring
// ============================================================================

#[test]
fn probe_settings_map_onto_http_probe() {
    let config = TriageConfig::from_toml(
        "[probes]\ntimeout_ms = 1500\nallow_http = true\nallow_private_networks = true\n",
    )
    .unwrap();
    let probe = probe_config(&config);
    assert_eq!(probe.timeout_ms, 1_500);
    assert!(probe.allow_http);
    assert!(probe.allow_private_networks);
}

#[test]
fn signer_only_built_when_enabled() {
    let disabled = TriageConfig::from_toml("[signing]\nkey_path = \"keys/minisign.key\"\n").unwrap();
    assert!(build_signer(&disabled).is_none());
    let enabled = TriageConfig::from_toml(
        "[storage]\nroot = \"/srv/site\"\n\n[signing]\nenabled = true\nkey_path = \"keys/minisign.key\"\n",
    )
    .unwrap();
    assert!(build_signer(&enabled).is_some());
    assert_eq!(enabled.storage.resolve("keys/minisign.key"), Path::new("/srv/site/keys/minisign.key"));
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

#[test]
fn verification_text_lists_every_issue() {
    let verification = LedgerVerification {
        entries: 2,
        tip: "b".repeat(64),
        issues: vec![
            LedgerIssue::Malformed {
                line: 2,
            },
            LedgerIssue::PrevHashMismatch {
                line: 3,
                expected: "a".repeat(64),
                found: GENESIS_HASH.to_string(),
            },
        ],
    };
    let text = render_verification_text(Path::new("ledger.jsonl"), &verification);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "ledger: ledger.jsonl");
    assert_eq!(lines[3], "status: broken");
    assert_eq!(lines[4], "line 2: malformed, skipped");
    assert!(lines[5].starts_with("line 3: prev_hash mismatch"));
}

#[test]
fn rebuild_text_reports_dry_run() {
    let outputs = vec![
        LaneRebuildOutput {
            lane: "accepted".to_string(),
            items: 1,
            changed: false,
            written: false,
        },
        LaneRebuildOutput {
            lane: "sandbox".to_string(),
            items: 2,
            changed: true,
            written: false,
        },
    ];
    assert_eq!(
        render_rebuild_text(&outputs, true),
        "accepted: 1 items, unchanged\nsandbox: 2 items, would rewrite"
    );
}
