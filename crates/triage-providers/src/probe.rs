// crates/triage-providers/src/probe.rs
// ============================================================================
// Module: HTTP Endpoint Probe
// Description: Bounded GET probes against candidate-supplied URLs.
// Purpose: Turn endpoint reachability into boolean signals without risk.
// Dependencies: triage-core, reqwest, url
// ============================================================================

//! ## Overview
//! Candidate URLs are untrusted. Probes refuse cleartext unless allowed,
//! refuse private and link-local peers unless allowed, pin the connection to
//! the address that passed the policy check, and never follow redirects. Only
//! the status line matters: the body is never read.
//!
//! A domain is tried on at most [`MAX_ADDRESSES_PER_HOST`] of its resolved
//! addresses, and the pinned client for each address is built once and
//! reused for the life of the probe.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::sync::Mutex;

use reqwest::blocking::Client;
use triage_core::EndpointProbe;
use triage_core::ProbeError;
use url::Url;

use crate::http::ResolvedHost;
use crate::http::build_client;
use crate::http::check_url;
use crate::http::resolve_host;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Resolved addresses attempted per URL before giving up.
pub const MAX_ADDRESSES_PER_HOST: usize = 2;

/// Configuration for the endpoint probe.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `allow_private_networks = false` blocks private/link-local/loopback peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpProbeConfig {
    /// Allow cleartext HTTP.
    pub allow_http: bool,
    /// Allow probing private/link-local/loopback addresses.
    pub allow_private_networks: bool,
    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpProbeConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            allow_private_networks: false,
            timeout_ms: 8_000,
            user_agent: "triage/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Probe
// ============================================================================

/// Endpoint probe issuing one bounded GET per URL.
pub struct HttpEndpointProbe {
    /// Probe configuration.
    config: HttpProbeConfig,
    /// Client for literal-address targets.
    client: Client,
    /// Clients pinned to a resolved address, keyed by host and peer.
    pinned: Mutex<HashMap<(String, SocketAddr), Client>>,
}

impl HttpEndpointProbe {
    /// Creates a probe.
    ///
    /// # Errors
    ///
    /// Returns [`ProbeError::Transport`] when the HTTP client cannot be built.
    pub fn new(config: HttpProbeConfig) -> Result<Self, ProbeError> {
        let client = build_client(config.timeout_ms, &config.user_agent, None)
            .map_err(ProbeError::Transport)?;
        Ok(Self {
            config,
            client,
            pinned: Mutex::new(HashMap::new()),
        })
    }

    /// Returns a client pinned to `ip` for domain targets, building it once.
    fn client_for(&self, resolved: &ResolvedHost, ip: IpAddr) -> Result<Client, String> {
        if !resolved.is_domain {
            return Ok(self.client.clone());
        }
        let socket_addr = SocketAddr::new(ip, resolved.port);
        let key = (resolved.host.clone(), socket_addr);
        let mut pinned =
            self.pinned.lock().map_err(|_| "probe client cache poisoned".to_string())?;
        if let Some(client) = pinned.get(&key) {
            return Ok(client.clone());
        }
        let client = build_client(
            self.config.timeout_ms,
            &self.config.user_agent,
            Some((resolved.host.as_str(), socket_addr)),
        )?;
        pinned.insert(key, client.clone());
        drop(pinned);
        Ok(client)
    }
}

/// Returns the resolved addresses a probe will try, in resolution order.
fn addresses_to_try(resolved: &ResolvedHost) -> &[IpAddr] {
    &resolved.ips[.. resolved.ips.len().min(MAX_ADDRESSES_PER_HOST)]
}

impl EndpointProbe for HttpEndpointProbe {
    fn probe(&self, url: &Url) -> Result<bool, ProbeError> {
        check_url(url, self.config.allow_http).map_err(ProbeError::NotAllowed)?;
        let resolved = resolve_host(url, self.config.allow_private_networks)
            .map_err(ProbeError::NotAllowed)?;
        let mut last_error = "http request failed".to_string();
        for ip in addresses_to_try(&resolved) {
            let client = match self.client_for(&resolved, *ip) {
                Ok(client) => client,
                Err(err) => {
                    last_error = err;
                    continue;
                }
            };
            match client.get(url.as_str()).send() {
                Ok(response) => return Ok(response.status().is_success()),
                Err(err) if err.is_timeout() => last_error = "http request timed out".to_string(),
                Err(_) => last_error = "http request failed".to_string(),
            }
        }
        Err(ProbeError::Transport(last_error))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known-good values.")]

    use super::*;

    /// Domain metadata for `example.org` with the given peers.
    fn domain(ips: Vec<IpAddr>) -> ResolvedHost {
        ResolvedHost {
            host: "example.org".to_string(),
            port: 443,
            ips,
            is_domain: true,
        }
    }

    #[test]
    fn only_the_first_addresses_are_tried() {
        let ips: Vec<IpAddr> =
            ["93.184.216.34", "93.184.216.35", "93.184.216.36"].map(|ip| ip.parse().unwrap()).into();
        let resolved = domain(ips.clone());
        assert_eq!(addresses_to_try(&resolved), &ips[.. MAX_ADDRESSES_PER_HOST]);

        let single = domain(vec![ips[0]]);
        assert_eq!(addresses_to_try(&single), &ips[.. 1]);
    }

    #[test]
    fn pinned_clients_are_reused_per_address() {
        let probe = HttpEndpointProbe::new(HttpProbeConfig::default()).unwrap();
        let first: IpAddr = "93.184.216.34".parse().unwrap();
        let second: IpAddr = "93.184.216.35".parse().unwrap();
        let resolved = domain(vec![first, second]);

        probe.client_for(&resolved, first).unwrap();
        probe.client_for(&resolved, first).unwrap();
        assert_eq!(probe.pinned.lock().unwrap().len(), 1);

        probe.client_for(&resolved, second).unwrap();
        assert_eq!(probe.pinned.lock().unwrap().len(), 2);
    }

    #[test]
    fn literal_addresses_share_the_unpinned_client() {
        let probe = HttpEndpointProbe::new(HttpProbeConfig::default()).unwrap();
        let ip: IpAddr = "93.184.216.34".parse().unwrap();
        let resolved = ResolvedHost {
            host: "93.184.216.34".to_string(),
            port: 443,
            ips: vec![ip],
            is_domain: false,
        };
        probe.client_for(&resolved, ip).unwrap();
        assert!(probe.pinned.lock().unwrap().is_empty());
    }
}
