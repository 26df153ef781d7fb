// crates/triage-core/tests/canonical.rs
// ============================================================================
// Module: Canonical JSON Tests
// Description: Verifies canonical encoding, output options, and round-trips.
// ============================================================================
//! ## Overview
//! Ensures canonical bytes depend only on value content, that ASCII escaping
//! and the trailing newline are explicit options, and that canonicalization
//! is a fixed point for arbitrary nested JSON.

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

use proptest::prelude::*;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use triage_core::CanonicalOptions;
use triage_core::core::canonical::canonical_json_bytes;
use triage_core::core::canonical::canonical_json_bytes_with;
use triage_core::core::canonical::hash_canonical_json;
use triage_core::core::canonical::is_canonical;
use triage_core::core::canonical::is_sha256_hex;
use triage_core::core::canonical::recanonicalize;

#[test]
fn key_insertion_order_does_not_change_bytes() {
    let mut forward = Map::new();
    forward.insert("zeta".to_string(), json!(1));
    forward.insert("alpha".to_string(), json!({"b": [1, 2], "a": null}));
    let mut backward = Map::new();
    backward.insert("alpha".to_string(), json!({"a": null, "b": [1, 2]}));
    backward.insert("zeta".to_string(), json!(1));

    let left = canonical_json_bytes(&Value::Object(forward)).unwrap();
    let right = canonical_json_bytes(&Value::Object(backward)).unwrap();
    assert_eq!(left, right);
    assert_eq!(left, br#"{"alpha":{"a":null,"b":[1,2]},"zeta":1}"#.to_vec());
}

#[test]
fn non_ascii_is_literal_by_default_and_escaped_on_request() {
    let value = json!({"name": "café ☕"});
    let literal = canonical_json_bytes(&value).unwrap();
    assert_eq!(String::from_utf8(literal).unwrap(), "{\"name\":\"café ☕\"}");

    let ascii = canonical_json_bytes_with(
        &value,
        CanonicalOptions {
            ascii_only: true,
            trailing_newline: false,
        },
    )
    .unwrap();
    assert_eq!(String::from_utf8(ascii).unwrap(), "{\"name\":\"caf\\u00e9 \\u2615\"}");
}

#[test]
fn ascii_mode_escapes_delete() {
    let value = json!({"text": "a\u{7f}b~"});
    let ascii = canonical_json_bytes_with(&value, CanonicalOptions::for_files(true)).unwrap();
    assert_eq!(String::from_utf8(ascii).unwrap(), "{\"text\":\"a\\u007fb~\"}\n");
    let literal = canonical_json_bytes(&value).unwrap();
    assert_eq!(literal, "{\"text\":\"a\u{7f}b~\"}".as_bytes());
}

#[test]
fn file_options_append_exactly_one_newline() {
    let bytes = canonical_json_bytes_with(&json!([1]), CanonicalOptions::for_files(false)).unwrap();
    assert_eq!(bytes, b"[1]\n".to_vec());
    assert!(is_canonical(&bytes, CanonicalOptions::for_files(false)).unwrap());
    assert!(!is_canonical(b"[1]\n\n", CanonicalOptions::for_files(false)).unwrap());
}

#[test]
fn recanonicalize_rejects_invalid_json() {
    assert!(recanonicalize(b"{not json", CanonicalOptions::default()).is_err());
}

#[test]
fn hash_is_stable_across_key_order() {
    let first = hash_canonical_json(&json!({"a": 1, "b": 2})).unwrap();
    let second = hash_canonical_json(&json!({"b": 2, "a": 1})).unwrap();
    assert_eq!(first, second);
    assert!(is_sha256_hex(&first));
}

fn json_value_strategy(max_depth: u32) -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|v| Value::Number(v.into())),
        (-1_000_000_i32 .. 1_000_000)
            .prop_map(|v| serde_json::Number::from_f64(f64::from(v) / 4.0).map_or(Value::Null, Value::Number)),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(max_depth, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0 .. 4).prop_map(Value::Array),
            prop::collection::btree_map(".{0,6}", inner, 0 .. 4).prop_map(|map| {
                let mut object = Map::new();
                for (key, value) in map {
                    object.insert(key, value);
                }
                Value::Object(object)
            }),
        ]
    })
}

proptest! {
    #[test]
    fn canonicalization_is_a_fixed_point(value in json_value_strategy(4)) {
        let once = canonical_json_bytes(&value).unwrap();
        let parsed: Value = serde_json::from_slice(&once).unwrap();
        let twice = canonical_json_bytes(&parsed).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn ascii_output_is_ascii_and_parses_to_same_value(value in json_value_strategy(3)) {
        let options = CanonicalOptions { ascii_only: true, trailing_newline: true };
        let bytes = canonical_json_bytes_with(&value, options).unwrap();
        prop_assert!(bytes.is_ascii());
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        prop_assert_eq!(
            canonical_json_bytes(&parsed).unwrap(),
            canonical_json_bytes(&value).unwrap()
        );
    }
}
