// crates/triage-providers/src/http.rs
// ============================================================================
// Module: HTTP Plumbing
// Description: Shared client construction and response guards.
// Purpose: Keep every outbound request bounded, redirect-free, and fail-closed.
// Dependencies: reqwest, url
// ============================================================================

//! ## Overview
//! Helpers shared by the endpoint probe and the queue client: scheme checks,
//! address policy with DNS pinning, and size-limited body reads. Redirects are
//! never followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Client
// ============================================================================

/// Builds a blocking client with an optional pinned resolution.
pub(crate) fn build_client(
    timeout_ms: u64,
    user_agent: &str,
    resolve: Option<(&str, SocketAddr)>,
) -> Result<Client, String> {
    let mut builder = Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(user_agent.to_string())
        .redirect(Policy::none());
    if let Some((host, socket_addr)) = resolve {
        builder = builder.resolve(host, socket_addr);
    }
    builder.build().map_err(|_| "http client build failed".to_string())
}

/// Rejects unsupported schemes and embedded credentials.
pub(crate) fn check_url(url: &Url, allow_http: bool) -> Result<(), String> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        other => return Err(format!("unsupported url scheme {other}")),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err("url credentials are not allowed".to_string());
    }
    if url.host_str().is_none() {
        return Err("url host required".to_string());
    }
    Ok(())
}

// ============================================================================
// SECTION: Address Policy
// ============================================================================

/// Resolved host metadata for pinned outbound requests.
///
/// # Invariants
/// - `ips` is non-empty and deduplicated.
pub(crate) struct ResolvedHost {
    /// Host string as used for resolution (brackets stripped).
    pub(crate) host: String,
    /// Effective request port.
    pub(crate) port: u16,
    /// Resolved peer IPs.
    pub(crate) ips: Vec<IpAddr>,
    /// True when the host is a DNS name rather than a literal address.
    pub(crate) is_domain: bool,
}

/// Resolves the URL host and enforces the private-address policy on every peer.
pub(crate) fn resolve_host(url: &Url, allow_private_networks: bool) -> Result<ResolvedHost, String> {
    let host = url.host_str().ok_or_else(|| "url host required".to_string())?;
    let host = host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);
    let port = url.port_or_known_default().ok_or_else(|| "url port required".to_string())?;
    let mut ips = if let Ok(ip) = host.parse::<IpAddr>() {
        vec![ip]
    } else {
        (host, port)
            .to_socket_addrs()
            .map(|iter| iter.map(|addr| addr.ip()).collect::<Vec<IpAddr>>())
            .map_err(|_| "url host resolution failed".to_string())?
    };
    if ips.is_empty() {
        return Err("url host has no resolved addresses".to_string());
    }
    if !allow_private_networks && ips.iter().any(is_private_or_link_local) {
        return Err(format!("url host resolves to private or link-local address: {host}"));
    }
    let mut unique = Vec::with_capacity(ips.len());
    for ip in ips.drain(..) {
        if !unique.contains(&ip) {
            unique.push(ip);
        }
    }
    Ok(ResolvedHost {
        host: host.to_string(),
        port,
        is_domain: host.parse::<IpAddr>().is_err(),
        ips: unique,
    })
}

/// Returns true when an IP is private, loopback, link-local, or otherwise local.
#[allow(
    clippy::option_if_let_else,
    reason = "Option::map_or is not const-callable on current toolchain."
)]
const fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_private()
                || addr.is_loopback()
                || addr.is_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
                || addr.is_broadcast()
        }
        IpAddr::V6(addr) => {
            let mapped_private = if let Some(mapped) = addr.to_ipv4_mapped() {
                mapped.is_private()
                    || mapped.is_loopback()
                    || mapped.is_link_local()
                    || mapped.is_unspecified()
            } else {
                false
            };
            mapped_private
                || addr.is_loopback()
                || addr.is_unique_local()
                || addr.is_unicast_link_local()
                || addr.is_unspecified()
                || addr.is_multicast()
        }
    }
}

// ============================================================================
// SECTION: Responses
// ============================================================================

/// Reads the response body while enforcing a byte limit.
pub(crate) fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, String> {
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| "response size limit exceeds u64".to_string())?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err("http response exceeds size limit".to_string());
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|_| "failed to read response".to_string())?;
    if buf.len() > max_bytes {
        return Err("http response exceeds size limit".to_string());
    }
    if let Some(expected) = expected_len {
        let expected =
            usize::try_from(expected).map_err(|_| "invalid response length".to_string())?;
        if buf.len() < expected {
            return Err("http response truncated".to_string());
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known-good values.")]

    use super::*;

    #[test]
    fn check_url_rejects_credentials_and_schemes() {
        assert!(check_url(&Url::parse("https://example.org/x").unwrap(), false).is_ok());
        assert!(check_url(&Url::parse("http://example.org/x").unwrap(), false).is_err());
        assert!(check_url(&Url::parse("http://example.org/x").unwrap(), true).is_ok());
        assert!(check_url(&Url::parse("https://u:p@example.org/").unwrap(), false).is_err());
        assert!(check_url(&Url::parse("ftp://example.org/").unwrap(), true).is_err());
    }

    #[test]
    fn loopback_literal_blocked_without_opt_in() {
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        assert!(resolve_host(&url, false).is_err());
        let resolved = resolve_host(&url, true).unwrap();
        assert!(!resolved.is_domain);
        assert_eq!(resolved.port, 9);
    }

    #[test]
    fn ipv6_literal_brackets_are_stripped() {
        let url = Url::parse("https://[::1]/").unwrap();
        let resolved = resolve_host(&url, true).unwrap();
        assert_eq!(resolved.host, "::1");
        assert_eq!(resolved.ips.len(), 1);
    }
}
