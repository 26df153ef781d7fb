// crates/triage-config/src/lib.rs
// ============================================================================
// Module: Triage Config Library
// Description: Canonical config model and fail-closed validation.
// Purpose: Single source of truth for triage.toml semantics.
// Dependencies: triage-core, serde, toml
// ============================================================================

//! ## Overview
//! `triage-config` defines the configuration model for the triage runner.
//! Config inputs are untrusted: loading enforces path, size, and encoding
//! limits before parsing, and every section is validated before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
