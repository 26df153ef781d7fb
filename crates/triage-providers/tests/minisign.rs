// crates/triage-providers/tests/minisign.rs
// ============================================================================
// Module: Minisign Signer Tests
// Description: Capability checks and invocation of the external signer.
// Purpose: Ensure signing degrades to "unavailable" instead of failing runs.
// ============================================================================

//! ## Overview
//! A shell script stands in for the signing tool so the argument contract and
//! failure handling can be exercised without a real key.

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

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use triage_core::ArtifactSigner;
use triage_core::SignerError;
use triage_providers::MinisignConfig;
use triage_providers::MinisignSigner;
use triage_providers::signature_path;

/// Writes an executable shell script.
#[cfg(unix)]
fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut permissions = fs::metadata(&path).unwrap().permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).unwrap();
    path
}

/// Fake tool: answers `-v`, and for `-S` writes the message path into `-x`.
#[cfg(unix)]
const FAKE_MINISIGN: &str = r#"
if [ "$1" = "-v" ]; then exit 0; fi
sig=""; msg=""
while [ $# -gt 0 ]; do
  case "$1" in
    -x) sig="$2"; shift ;;
    -m) msg="$2"; shift ;;
  esac
  shift
done
printf 'untrusted comment: fake\n%s\n' "$msg" > "$sig"
"#;

#[test]
fn signature_path_appends_extension() {
    assert_eq!(
        signature_path(Path::new("dumps/accepted.json")),
        PathBuf::from("dumps/accepted.json.minisig")
    );
}

#[test]
fn missing_key_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let signer = MinisignSigner::new(MinisignConfig {
        command: "minisign".to_string(),
        key_path: dir.path().join("absent.key"),
        passphrase_env: None,
    });
    assert!(!signer.available());
    let result = signer.sign(&dir.path().join("accepted.json"));
    assert!(matches!(result, Err(SignerError::Unavailable(_))), "got {result:?}");
}

#[test]
fn missing_command_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let key = dir.path().join("minisign.key");
    fs::write(&key, "key").unwrap();
    let signer = MinisignSigner::new(MinisignConfig {
        command: dir.path().join("no-such-tool").display().to_string(),
        key_path: key,
        passphrase_env: None,
    });
    assert!(!signer.available());
}

#[cfg(unix)]
#[test]
fn fake_tool_writes_detached_signature() {
    let dir = tempfile::tempdir().unwrap();
    let key = dir.path().join("minisign.key");
    fs::write(&key, "key").unwrap();
    let tool = write_script(dir.path(), "fake-minisign", FAKE_MINISIGN);
    let target = dir.path().join("accepted.json");
    fs::write(&target, "{}\n").unwrap();
    fs::write(signature_path(&target), "stale").unwrap();
    let signer = MinisignSigner::new(MinisignConfig {
        command: tool.display().to_string(),
        key_path: key,
        passphrase_env: None,
    });
    assert!(signer.available());
    let signature = signer.sign(&target).unwrap();
    assert_eq!(signature, signature_path(&target));
    let content = fs::read_to_string(&signature).unwrap();
    assert!(content.contains("accepted.json"));
    assert!(!content.contains("stale"));
}

#[cfg(unix)]
#[test]
fn failing_tool_reports_stderr_and_leaves_no_signature() {
    let dir = tempfile::tempdir().unwrap();
    let key = dir.path().join("minisign.key");
    fs::write(&key, "key").unwrap();
    let tool = write_script(
        dir.path(),
        "broken-minisign",
        "if [ \"$1\" = \"-v\" ]; then exit 0; fi\necho 'wrong password' >&2\nexit 2",
    );
    let target = dir.path().join("accepted.json");
    fs::write(&target, "{}\n").unwrap();
    fs::write(signature_path(&target), "stale").unwrap();
    let signer = MinisignSigner::new(MinisignConfig {
        command: tool.display().to_string(),
        key_path: key,
        passphrase_env: None,
    });
    match signer.sign(&target) {
        Err(SignerError::Failed(message)) => assert!(message.contains("wrong password")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!signature_path(&target).exists());
}
