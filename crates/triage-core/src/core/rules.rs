// crates/triage-core/src/core/rules.rs
// ============================================================================
// Module: Rule Configuration
// Description: Hard-fail rules, soft scoring rules, allowlist, and thresholds.
// Purpose: Define the deterministic rule set consumed by the heuristic engine.
// Dependencies: serde, url
// ============================================================================

//! ## Overview
//! The rule set is loaded once per run. Rule operators are a closed tagged
//! variant: each is a pure predicate over a URL field value, so an unknown
//! operator is a deserialization error rather than a silent no-op.
//!
//! Hard-fail rules are matched in declared order; the first match wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::core::identifiers::RuleId;
use crate::core::signals::Signal;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lowest possible score.
pub const MIN_SCORE: u8 = 0;
/// Highest possible score.
pub const MAX_SCORE: u8 = 100;
/// Maximum number of hard-fail rules.
pub const MAX_HARD_FAIL_RULES: usize = 256;
/// Maximum number of soft rules.
pub const MAX_SOFT_RULES: usize = 256;
/// Maximum number of allowlist entries (hosts plus prefixes).
pub const MAX_ALLOWLIST_ENTRIES: usize = 4096;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// URL component a hard-fail rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlField {
    /// Lowercase host name (empty when the URL has none).
    Host,
    /// Lowercase scheme.
    Scheme,
}

impl UrlField {
    /// Extracts the field value from a URL.
    #[must_use]
    pub fn extract(self, url: &Url) -> &str {
        match self {
            Self::Host => url.host_str().unwrap_or(""),
            Self::Scheme => url.scheme(),
        }
    }
}

/// Closed set of rule operators; comparisons are ASCII case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    /// Field equals the value.
    Equals(String),
    /// Field contains the value.
    Contains(String),
    /// Field starts with the value.
    Prefix(String),
    /// Field ends with the value.
    Suffix(String),
}

impl RuleOperator {
    /// Returns the operand.
    #[must_use]
    pub fn operand(&self) -> &str {
        match self {
            Self::Equals(value) | Self::Contains(value) | Self::Prefix(value) | Self::Suffix(value) => {
                value
            }
        }
    }

    /// Evaluates the operator against a field value.
    #[must_use]
    pub fn matches(&self, field_value: &str) -> bool {
        let observed = field_value.to_ascii_lowercase();
        let expected = self.operand().to_ascii_lowercase();
        match self {
            Self::Equals(_) => observed == expected,
            Self::Contains(_) => observed.contains(&expected),
            Self::Prefix(_) => observed.starts_with(&expected),
            Self::Suffix(_) => observed.ends_with(&expected),
        }
    }
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// Rule that forces rejection regardless of score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardFailRule {
    /// Rule identifier recorded as the rejection reason.
    pub id: RuleId,
    /// URL field inspected.
    pub field: UrlField,
    /// Predicate applied to the field.
    pub operator: RuleOperator,
}

impl HardFailRule {
    /// Returns true when the rule matches the URL.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        self.operator.matches(self.field.extract(url))
    }
}

/// Rule that adds `delta` to the score when `signal` is true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoftRule {
    /// Signal the rule depends on.
    pub signal: Signal,
    /// Score delta, may be negative.
    pub delta: i32,
}

/// Hosts and repository prefixes that grant bonus score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Allowlist {
    /// Candidate URL hosts granted `host_bonus`.
    #[serde(default)]
    pub hosts: BTreeSet<String>,
    /// Repository URL prefixes granted `repo_bonus`.
    #[serde(default)]
    pub repo_prefixes: Vec<String>,
    /// Bonus for an allowlisted host.
    #[serde(default)]
    pub host_bonus: i32,
    /// Bonus for an allowlisted repository prefix.
    #[serde(default)]
    pub repo_bonus: i32,
}

impl Allowlist {
    /// Returns true when the host is allowlisted.
    #[must_use]
    pub fn allows_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(&host))
    }

    /// Returns true when the repository URL starts with an allowed prefix.
    #[must_use]
    pub fn allows_repo(&self, repo: &str) -> bool {
        self.repo_prefixes.iter().any(|prefix| repo.starts_with(prefix.as_str()))
    }
}

/// Inclusive lane thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    /// Minimum score placed in the accepted lane.
    pub min_score_to_accept: u8,
    /// Minimum score placed in the sandbox lane.
    pub min_score_to_sandbox: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_score_to_accept: 70,
            min_score_to_sandbox: 40,
        }
    }
}

/// Complete rule configuration for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSet {
    /// Lane thresholds.
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Allowlist bonuses.
    #[serde(default)]
    pub allowlist: Allowlist,
    /// Hard-fail rules in match order.
    #[serde(default)]
    pub hard_fail: Vec<HardFailRule>,
    /// Soft scoring rules.
    #[serde(default)]
    pub soft: Vec<SoftRule>,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Rule configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// Threshold outside the score range or inverted.
    #[error("invalid thresholds: {0}")]
    Thresholds(String),
    /// Hard-fail rule is malformed.
    #[error("invalid hard-fail rule {id}: {reason}")]
    HardFail {
        /// Rule identifier.
        id: String,
        /// Failure description.
        reason: String,
    },
    /// Allowlist is malformed.
    #[error("invalid allowlist: {0}")]
    Allowlist(String),
    /// Too many rules configured.
    #[error("rule limit exceeded: {0}")]
    Limit(String),
}

impl RuleSet {
    /// Validates the rule set for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the rule set is invalid.
    pub fn validate(&self) -> Result<(), RuleError> {
        let thresholds = self.thresholds;
        if thresholds.min_score_to_accept > MAX_SCORE || thresholds.min_score_to_sandbox > MAX_SCORE
        {
            return Err(RuleError::Thresholds(format!("thresholds must be within 0..={MAX_SCORE}")));
        }
        if thresholds.min_score_to_accept < thresholds.min_score_to_sandbox {
            return Err(RuleError::Thresholds(
                "min_score_to_accept must be >= min_score_to_sandbox".to_string(),
            ));
        }
        if self.hard_fail.len() > MAX_HARD_FAIL_RULES {
            return Err(RuleError::Limit("too many hard_fail rules".to_string()));
        }
        if self.soft.len() > MAX_SOFT_RULES {
            return Err(RuleError::Limit("too many soft rules".to_string()));
        }
        let mut ids = BTreeSet::new();
        for rule in &self.hard_fail {
            let id = rule.id.as_str();
            if id.trim().is_empty() {
                return Err(RuleError::HardFail {
                    id: id.to_string(),
                    reason: "id must be non-empty".to_string(),
                });
            }
            if !ids.insert(id) {
                return Err(RuleError::HardFail {
                    id: id.to_string(),
                    reason: "duplicate id".to_string(),
                });
            }
            if rule.operator.operand().is_empty() {
                return Err(RuleError::HardFail {
                    id: id.to_string(),
                    reason: "operand must be non-empty".to_string(),
                });
            }
        }
        let allowlist = &self.allowlist;
        if allowlist.hosts.len() + allowlist.repo_prefixes.len() > MAX_ALLOWLIST_ENTRIES {
            return Err(RuleError::Limit("too many allowlist entries".to_string()));
        }
        if allowlist.hosts.iter().any(|host| host.trim().is_empty()) {
            return Err(RuleError::Allowlist("hosts must be non-empty".to_string()));
        }
        if allowlist.repo_prefixes.iter().any(|prefix| prefix.trim().is_empty()) {
            return Err(RuleError::Allowlist("repo_prefixes must be non-empty".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
