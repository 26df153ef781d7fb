// crates/triage-core/src/runtime/heuristics.rs
// ============================================================================
// Module: Heuristic Engine
// Description: Signal collection, hard-fail matching, and score computation.
// Purpose: Turn a validated candidate record into a deterministic evaluation.
// Dependencies: url
// ============================================================================

//! ## Overview
//! Evaluation order is fixed:
//! 1. Static signals from the record's fields.
//! 2. Hard-fail rules in declared order. A match short-circuits: no probes are
//!    issued and the score is 0.
//! 3. Probe signals against conventional artifacts next to `wellKnown`.
//! 4. Score = soft deltas for true signals + allowlist bonuses, clamped to
//!    `0..=100`.
//!
//! Probe failures are never engine errors: they read as `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::candidate::CandidateRecord;
use crate::core::decision::Evaluation;
use crate::core::rules::HardFailRule;
use crate::core::rules::MAX_SCORE;
use crate::core::rules::MIN_SCORE;
use crate::core::rules::RuleError;
use crate::core::rules::RuleSet;
use crate::core::signals::KNOWN_REPO_HOSTS;
use crate::core::signals::ProbeTarget;
use crate::core::signals::Signal;
use crate::core::signals::SignalSet;
use crate::interfaces::EndpointProbe;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Heuristic engine bound to a validated rule set and a probe.
pub struct HeuristicEngine<'a, P: EndpointProbe + ?Sized> {
    /// Validated rules.
    rules: &'a RuleSet,
    /// Network probe.
    probe: &'a P,
}

impl<'a, P: EndpointProbe + ?Sized> HeuristicEngine<'a, P> {
    /// Creates an engine after validating the rule set.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the rule set is malformed.
    pub fn new(rules: &'a RuleSet, probe: &'a P) -> Result<Self, RuleError> {
        rules.validate()?;
        Ok(Self {
            rules,
            probe,
        })
    }

    /// Returns the rule set the engine evaluates with.
    #[must_use]
    pub const fn rules(&self) -> &'a RuleSet {
        self.rules
    }

    /// Evaluates a candidate record.
    #[must_use]
    pub fn evaluate(&self, record: &CandidateRecord) -> Evaluation {
        let mut signals = static_signals(record);
        if let Some(rule) = first_hard_fail(self.rules, record) {
            return Evaluation {
                score: MIN_SCORE,
                signals,
                hard_fail: Some(rule.id.clone()),
            };
        }
        self.collect_probe_signals(record, &mut signals);
        let score = score(self.rules, record, &signals);
        Evaluation {
            score,
            signals,
            hard_fail: None,
        }
    }

    /// Probes every conventional target; all probe signals are recorded.
    fn collect_probe_signals(&self, record: &CandidateRecord, signals: &mut SignalSet) {
        for target in ProbeTarget::ALL {
            let reachable = record
                .well_known
                .as_ref()
                .and_then(|well_known| target.resolve(well_known))
                .is_some_and(|url| matches!(self.probe.probe(&url), Ok(true)));
            signals.set(target.signal(), reachable);
        }
    }
}

// ============================================================================
// SECTION: Pure Helpers
// ============================================================================

/// Computes signals that need no network access.
#[must_use]
pub fn static_signals(record: &CandidateRecord) -> SignalSet {
    let mut signals = SignalSet::new();
    signals.set(Signal::UrlHttps, record.url.scheme() == "https");
    signals.set(Signal::HasTitle, record.has_title);
    signals.set(Signal::HasDescription, record.has_description);
    signals.set(Signal::HasTopics, record.has_topics);
    signals.set(Signal::HasLanguages, record.has_languages);
    signals.set(Signal::HasRepo, record.repo.is_some());
    let known_provider = record
        .repo
        .as_ref()
        .and_then(|repo| repo.host_str())
        .is_some_and(|host| KNOWN_REPO_HOSTS.iter().any(|known| host.eq_ignore_ascii_case(known)));
    signals.set(Signal::RepoKnownProvider, known_provider);
    signals
}

/// Returns the first hard-fail rule matching the candidate URL.
#[must_use]
pub fn first_hard_fail<'r>(rules: &'r RuleSet, record: &CandidateRecord) -> Option<&'r HardFailRule> {
    rules.hard_fail.iter().find(|rule| rule.matches(&record.url))
}

/// Sums soft deltas and allowlist bonuses, clamped to the score range.
#[must_use]
pub fn score(rules: &RuleSet, record: &CandidateRecord, signals: &SignalSet) -> u8 {
    let mut total: i64 = rules
        .soft
        .iter()
        .filter(|rule| signals.is_true(rule.signal))
        .map(|rule| i64::from(rule.delta))
        .sum();
    if record.host().is_some_and(|host| rules.allowlist.allows_host(host)) {
        total += i64::from(rules.allowlist.host_bonus);
    }
    if record.repo.as_ref().is_some_and(|repo| rules.allowlist.allows_repo(repo.as_str())) {
        total += i64::from(rules.allowlist.repo_bonus);
    }
    let clamped = total.clamp(i64::from(MIN_SCORE), i64::from(MAX_SCORE));
    u8::try_from(clamped).unwrap_or(MAX_SCORE)
}
