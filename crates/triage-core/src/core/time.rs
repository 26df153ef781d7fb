// crates/triage-core/src/core/time.rs
// ============================================================================
// Module: Triage Time Model
// Description: Second-precision UTC timestamps for ledger and lane records.
// Purpose: Keep recorded times stable and replayable across runs.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The core never reads wall-clock time. Hosts supply a [`Timestamp`] per run,
//! which keeps every decision in a batch on the same instant and lets tests pin
//! time for byte-identical output.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when constructing timestamps.
#[derive(Debug, Error)]
pub enum TimestampError {
    /// Input was not an RFC 3339 UTC timestamp with second precision.
    #[error("invalid timestamp: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// UTC timestamp rendered as `YYYY-MM-DDTHH:MM:SSZ`.
///
/// # Invariants
/// - Always UTC, always second precision, always `Z`-suffixed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(String);

impl Timestamp {
    /// Builds a timestamp from a date-time, truncating sub-second precision.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the value cannot be formatted.
    pub fn from_datetime(value: OffsetDateTime) -> Result<Self, TimestampError> {
        let utc = value
            .to_offset(UtcOffset::UTC)
            .replace_nanosecond(0)
            .map_err(|err| TimestampError::Invalid(err.to_string()))?;
        let text = utc.format(&Rfc3339).map_err(|err| TimestampError::Invalid(err.to_string()))?;
        Ok(Self(text))
    }

    /// Parses a `YYYY-MM-DDTHH:MM:SSZ` string.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError`] when the string is not in canonical form.
    pub fn parse(value: &str) -> Result<Self, TimestampError> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| TimestampError::Invalid(err.to_string()))?;
        let canonical = Self::from_datetime(parsed)?;
        if canonical.0 != value {
            return Err(TimestampError::Invalid(format!(
                "{value} is not second-precision UTC"
            )));
        }
        Ok(canonical)
    }

    /// Returns the timestamp string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `YYYY-MM` month key used to bucket audit logs.
    #[must_use]
    pub fn month_key(&self) -> &str {
        self.0.get(.. 7).unwrap_or(&self.0)
    }

    /// Returns the timestamp without separators, e.g. `20261019T120000Z`.
    #[must_use]
    pub fn compact(&self) -> String {
        self.0.chars().filter(|ch| *ch != '-' && *ch != ':').collect()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TimestampError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
