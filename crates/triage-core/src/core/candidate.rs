// crates/triage-core/src/core/candidate.rs
// ============================================================================
// Module: Candidate Records
// Description: Typed view over externally submitted candidate bodies.
// Purpose: Validate intake once and keep the raw body for replay.
// Dependencies: serde, serde_json, url
// ============================================================================

//! ## Overview
//! A [`Candidate`] couples the queue identity, a validated [`CandidateRecord`]
//! and the raw detail body exactly as received. Scoring reads the typed record;
//! the ledger and lane documents carry the raw body so a replay sees the same
//! input the engine saw.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::core::identifiers::PendingId;

// ============================================================================
// SECTION: Kind
// ============================================================================

/// Fixed enumeration of candidate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Publisher of content.
    Publisher,
    /// Dataset.
    Dataset,
    /// Tool or service.
    Tool,
    /// Website.
    Site,
    /// Syndication feed.
    Feed,
    /// Source repository.
    Repo,
}

impl CandidateKind {
    /// Parses a kind label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "publisher" => Some(Self::Publisher),
            "dataset" => Some(Self::Dataset),
            "tool" => Some(Self::Tool),
            "site" => Some(Self::Site),
            "feed" => Some(Self::Feed),
            "repo" => Some(Self::Repo),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Intake validation failures for a candidate body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    /// Detail body is not a JSON object.
    #[error("candidate body must be a json object")]
    NotAnObject,
    /// Required `url` field is absent or empty.
    #[error("candidate url is missing")]
    MissingUrl,
    /// A URI field is not an absolute URI.
    #[error("candidate field {field} is not an absolute uri: {value}")]
    InvalidUri {
        /// Field name as it appears in the body.
        field: &'static str,
        /// Offending value.
        value: String,
    },
    /// A field has the wrong JSON type.
    #[error("candidate field {0} must be a string")]
    NotAString(&'static str),
    /// `kind` is outside the fixed enumeration.
    #[error("candidate kind is not recognized: {0}")]
    UnknownKind(String),
}

// ============================================================================
// SECTION: Record
// ============================================================================

/// Validated, typed view of a candidate body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Absolute URI of the candidate.
    pub url: Url,
    /// Optional discovery endpoint for trust artifacts.
    pub well_known: Option<Url>,
    /// Optional source repository.
    pub repo: Option<Url>,
    /// Optional kind.
    pub kind: Option<CandidateKind>,
    /// Non-empty `title`.
    pub has_title: bool,
    /// Non-empty `description`.
    pub has_description: bool,
    /// Non-empty `topics` list.
    pub has_topics: bool,
    /// Non-empty `languages` list.
    pub has_languages: bool,
}

impl CandidateRecord {
    /// Validates a raw body into a typed record.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError`] when the body fails intake validation.
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, CandidateError> {
        let url = match optional_string(body, "url")? {
            Some(value) => parse_absolute("url", value)?,
            None => return Err(CandidateError::MissingUrl),
        };
        let well_known =
            optional_string(body, "wellKnown")?.map(|v| parse_absolute("wellKnown", v)).transpose()?;
        let repo = optional_string(body, "repo")?.map(|v| parse_absolute("repo", v)).transpose()?;
        let kind = match optional_string(body, "kind")? {
            Some(label) => Some(
                CandidateKind::from_label(label)
                    .ok_or_else(|| CandidateError::UnknownKind(label.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            url,
            well_known,
            repo,
            kind,
            has_title: non_empty(body.get("title")),
            has_description: non_empty(body.get("description")),
            has_topics: non_empty(body.get("topics")),
            has_languages: non_empty(body.get("languages")),
        })
    }

    /// Returns the lowercase host of the candidate URL, if any.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}

// ============================================================================
// SECTION: Candidate
// ============================================================================

/// A candidate under triage: identity, typed record, and raw body.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Originating queue identifier.
    pub id: PendingId,
    /// Validated typed view.
    pub record: CandidateRecord,
    /// Raw body exactly as received from the queue.
    pub body: Map<String, Value>,
}

impl Candidate {
    /// Validates a detail body for the given queue identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError`] when the body is not a valid candidate.
    pub fn from_body(id: PendingId, body: Value) -> Result<Self, CandidateError> {
        let Value::Object(body) = body else {
            return Err(CandidateError::NotAnObject);
        };
        let record = CandidateRecord::from_body(&body)?;
        Ok(Self {
            id,
            record,
            body,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an optional string field; blank strings and `null` count as absent.
fn optional_string<'a>(
    body: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, CandidateError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            let trimmed = value.trim();
            Ok(if trimmed.is_empty() { None } else { Some(trimmed) })
        }
        Some(_) => Err(CandidateError::NotAString(field)),
    }
}

/// Parses an absolute URI.
fn parse_absolute(field: &'static str, value: &str) -> Result<Url, CandidateError> {
    Url::parse(value).map_err(|_| CandidateError::InvalidUri {
        field,
        value: value.to_string(),
    })
}

/// Returns true for non-empty strings, arrays, and objects.
fn non_empty(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Bool(_) | Value::Number(_)) => true,
        Some(Value::Null) | None => false,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_minimal_body() {
        let candidate =
            Candidate::from_body(PendingId::new("p1"), json!({"url": "https://example.org"}))
                .unwrap();
        assert_eq!(candidate.record.host(), Some("example.org"));
        assert!(candidate.record.kind.is_none());
        assert!(!candidate.record.has_title);
    }

    #[test]
    fn rejects_relative_url() {
        let err = Candidate::from_body(PendingId::new("p1"), json!({"url": "/relative"}))
            .unwrap_err();
        assert!(matches!(err, CandidateError::InvalidUri { field: "url", .. }));
    }

    #[test]
    fn rejects_unknown_kind_and_non_object() {
        let err = Candidate::from_body(
            PendingId::new("p1"),
            json!({"url": "https://example.org", "kind": "casino"}),
        )
        .unwrap_err();
        assert_eq!(err, CandidateError::UnknownKind("casino".to_string()));
        let err = Candidate::from_body(PendingId::new("p1"), json!(["x"])).unwrap_err();
        assert_eq!(err, CandidateError::NotAnObject);
    }

    #[test]
    fn blank_optional_fields_count_as_absent() {
        let candidate = Candidate::from_body(
            PendingId::new("p1"),
            json!({"url": "https://example.org", "wellKnown": " ", "kind": "", "topics": []}),
        )
        .unwrap();
        assert!(candidate.record.well_known.is_none());
        assert!(candidate.record.kind.is_none());
        assert!(!candidate.record.has_topics);
    }
}
