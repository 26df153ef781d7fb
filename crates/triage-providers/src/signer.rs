// crates/triage-providers/src/signer.rs
// ============================================================================
// Module: Minisign Signer
// Description: Detached signatures produced by an external minisign binary.
// Purpose: Sign the accepted lane when the tool and key are present.
// Dependencies: triage-core
// ============================================================================

//! ## Overview
//! [`MinisignSigner`] is capability-checked: [`ArtifactSigner::available`]
//! reports false when the key file is missing or the executable cannot be
//! spawned, and the run records a skipped signature instead of failing.
//! Signatures are written next to the input as `<file>.minisig`; a stale
//! signature is removed first so a failed run never leaves a mismatched one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

use triage_core::ArtifactSigner;
use triage_core::SignerError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Extension appended to signed files.
pub const SIGNATURE_EXTENSION: &str = "minisig";
/// Maximum stderr characters kept in a failure message.
const MAX_STDERR_CHARS: usize = 512;

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Configuration for the minisign signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinisignConfig {
    /// Executable name or path.
    pub command: String,
    /// Secret key file.
    pub key_path: PathBuf,
    /// Environment variable whose value is fed to the tool as the passphrase.
    pub passphrase_env: Option<String>,
}

/// Signer invoking `minisign -S`.
#[derive(Debug, Clone)]
pub struct MinisignSigner {
    /// Signer configuration.
    config: MinisignConfig,
}

impl MinisignSigner {
    /// Creates a signer.
    #[must_use]
    pub const fn new(config: MinisignConfig) -> Self {
        Self {
            config,
        }
    }

    /// Reads the configured passphrase, if any.
    fn passphrase(&self) -> Option<String> {
        self.config.passphrase_env.as_ref().and_then(|name| env::var(name).ok())
    }
}

/// Returns the detached signature path for a file.
#[must_use]
pub fn signature_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(SIGNATURE_EXTENSION);
    PathBuf::from(name)
}

impl ArtifactSigner for MinisignSigner {
    fn available(&self) -> bool {
        if !self.config.key_path.is_file() {
            return false;
        }
        Command::new(&self.config.command)
            .arg("-v")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    fn signature_path(&self, path: &Path) -> PathBuf {
        signature_path(path)
    }

    fn sign(&self, path: &Path) -> Result<PathBuf, SignerError> {
        if !self.config.key_path.is_file() {
            return Err(SignerError::Unavailable(format!(
                "signing key not found: {}",
                self.config.key_path.display()
            )));
        }
        let signature = signature_path(path);
        match fs::remove_file(&signature) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(SignerError::Failed(format!("stale signature: {err}"))),
        }
        let passphrase = self.passphrase();
        let mut cmd = Command::new(&self.config.command);
        cmd.arg("-S")
            .arg("-s")
            .arg(&self.config.key_path)
            .arg("-m")
            .arg(path)
            .arg("-x")
            .arg(&signature)
            .stdin(if passphrase.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let mut child = cmd
            .spawn()
            .map_err(|err| SignerError::Unavailable(format!("failed to spawn signer: {err}")))?;
        let mut feed_error = None;
        if let Some(passphrase) = passphrase
            && let Some(mut stdin) = child.stdin.take()
        {
            feed_error = stdin.write_all(format!("{passphrase}\n").as_bytes()).err();
        }
        let output = child
            .wait_with_output()
            .map_err(|err| SignerError::Failed(format!("signer did not finish: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut message: String = stderr.trim().chars().take(MAX_STDERR_CHARS).collect();
            if let Some(err) = feed_error {
                message.push_str(&format!(" (passphrase not delivered: {err})"));
            }
            return Err(SignerError::Failed(format!(
                "signer exited with {}: {message}",
                output.status
            )));
        }
        if !signature.is_file() {
            return Err(SignerError::Failed("signer produced no signature".to_string()));
        }
        Ok(signature)
    }
}
