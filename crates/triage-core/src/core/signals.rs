// crates/triage-core/src/core/signals.rs
// ============================================================================
// Module: Signals
// Description: Named boolean observations about a candidate.
// Purpose: Decouple what was observed from how much it is worth.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! Signals are the only inputs soft scoring rules may reference. The set is a
//! closed enumeration so a rule that names an unknown signal fails at config
//! load time instead of silently scoring zero.
//!
//! Probe signals are derived from a fixed set of conventional artifacts
//! resolved against the candidate's `wellKnown` directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use url::Url;

// ============================================================================
// SECTION: Signal
// ============================================================================

/// Named boolean fact derived about a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Candidate URL uses `https`.
    UrlHttps,
    /// Body carries a non-empty title.
    HasTitle,
    /// Body carries a non-empty description.
    HasDescription,
    /// Body carries a non-empty topics list.
    HasTopics,
    /// Body carries a non-empty languages list.
    HasLanguages,
    /// Body names a repository.
    HasRepo,
    /// Repository is hosted by a known provider.
    RepoKnownProvider,
    /// `wellKnown` endpoint answered with a success status.
    WellKnownReachable,
    /// Public-key artifact is served next to `wellKnown`.
    PublicKeyPresent,
    /// Hash-inventory artifact is served next to `wellKnown`.
    HashInventoryPresent,
    /// Security-contact file is served next to `wellKnown`.
    SecurityContactPresent,
}

/// Repository hosts treated as known providers.
pub const KNOWN_REPO_HOSTS: &[&str] = &["github.com", "gitlab.com", "codeberg.org", "bitbucket.org"];

// ============================================================================
// SECTION: Probe Targets
// ============================================================================

/// Conventional endpoints probed for each candidate with a `wellKnown` URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTarget {
    /// The `wellKnown` URL itself.
    WellKnown,
    /// Public signing key (`minisign.pub`).
    PublicKey,
    /// Hash inventory (`sha256.json`).
    HashInventory,
    /// Security contact (`security.txt`).
    SecurityContact,
}

impl ProbeTarget {
    /// Every probe target, in evaluation order.
    pub const ALL: [Self; 4] =
        [Self::WellKnown, Self::PublicKey, Self::HashInventory, Self::SecurityContact];

    /// Returns the signal this probe sets.
    #[must_use]
    pub const fn signal(self) -> Signal {
        match self {
            Self::WellKnown => Signal::WellKnownReachable,
            Self::PublicKey => Signal::PublicKeyPresent,
            Self::HashInventory => Signal::HashInventoryPresent,
            Self::SecurityContact => Signal::SecurityContactPresent,
        }
    }

    /// Returns the artifact file name relative to the `wellKnown` directory.
    #[must_use]
    pub const fn artifact(self) -> Option<&'static str> {
        match self {
            Self::WellKnown => None,
            Self::PublicKey => Some("minisign.pub"),
            Self::HashInventory => Some("sha256.json"),
            Self::SecurityContact => Some("security.txt"),
        }
    }

    /// Resolves the probe URL for a `wellKnown` endpoint.
    #[must_use]
    pub fn resolve(self, well_known: &Url) -> Option<Url> {
        let Some(artifact) = self.artifact() else {
            return Some(well_known.clone());
        };
        well_known_directory(well_known).join(artifact).ok()
    }
}

/// Returns the directory URL that conventional artifacts live in.
///
/// A path ending in `/.well-known` is treated as the directory itself.
fn well_known_directory(well_known: &Url) -> Url {
    let mut base = well_known.clone();
    if base.path().ends_with("/.well-known") {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.set_query(None);
    base.set_fragment(None);
    base
}

// ============================================================================
// SECTION: Signal Set
// ============================================================================

/// Mapping from signal to observed value, computed once per candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalSet(BTreeMap<Signal, bool>);

impl SignalSet {
    /// Creates an empty signal set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a signal value.
    pub fn set(&mut self, signal: Signal, value: bool) {
        self.0.insert(signal, value);
    }

    /// Returns the recorded value of a signal, `false` when unobserved.
    #[must_use]
    pub fn is_true(&self, signal: Signal) -> bool {
        self.0.get(&signal).copied().unwrap_or(false)
    }

    /// Returns true when the signal was observed (true or false).
    #[must_use]
    pub fn contains(&self, signal: Signal) -> bool {
        self.0.contains_key(&signal)
    }

    /// Iterates recorded signals in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (Signal, bool)> + '_ {
        self.0.iter().map(|(signal, value)| (*signal, *value))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use super::*;

    fn resolve(base: &str, target: ProbeTarget) -> String {
        target.resolve(&Url::parse(base).unwrap()).unwrap().to_string()
    }

    #[test]
    fn artifacts_resolve_next_to_well_known_file() {
        assert_eq!(
            resolve("https://example.org/.well-known/x", ProbeTarget::PublicKey),
            "https://example.org/.well-known/minisign.pub"
        );
        assert_eq!(
            resolve("https://example.org/.well-known/x", ProbeTarget::WellKnown),
            "https://example.org/.well-known/x"
        );
    }

    #[test]
    fn artifacts_resolve_inside_bare_well_known_directory() {
        assert_eq!(
            resolve("https://example.org/.well-known", ProbeTarget::HashInventory),
            "https://example.org/.well-known/sha256.json"
        );
        assert_eq!(
            resolve("https://example.org/.well-known/?q=1", ProbeTarget::SecurityContact),
            "https://example.org/.well-known/security.txt"
        );
    }

    #[test]
    fn signal_set_serializes_with_snake_case_keys() {
        let mut set = SignalSet::new();
        set.set(Signal::WellKnownReachable, true);
        set.set(Signal::UrlHttps, false);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"url_https":false,"well_known_reachable":true}"#);
    }
}
