// crates/triage-providers/src/lib.rs
// ============================================================================
// Module: Triage Providers
// Description: Network and process collaborators for the triage pipeline.
// Purpose: Implement the queue, probe, and signer interfaces against the world.
// Dependencies: triage-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Implementations of the triage-core collaborator traits that reach outside
//! the process: [`HttpSubmissionQueue`], [`HttpEndpointProbe`], and
//! [`MinisignSigner`]. Every outbound request is bounded in time and size and
//! never follows redirects.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod http;
pub mod probe;
pub mod queue;
pub mod signer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use probe::HttpEndpointProbe;
pub use probe::MAX_ADDRESSES_PER_HOST;
pub use probe::HttpProbeConfig;
pub use queue::HttpQueueConfig;
pub use queue::HttpSubmissionQueue;
pub use queue::QueueAuth;
pub use signer::MinisignConfig;
pub use signer::MinisignSigner;
pub use signer::signature_path;
