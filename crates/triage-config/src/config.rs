// crates/triage-config/src/config.rs
// ============================================================================
// Module: Triage Configuration
// Description: Configuration loading and validation for the triage runner.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: triage-core, serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a run never starts against a
//! half-understood config.
//!
//! Storage paths are relative to `storage.root` unless absolute. Secrets never
//! live in the file; the queue token and signing passphrase are named by
//! environment variable only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;
use triage_core::RuleSet;
use triage_core::runtime::pipeline::MAX_WORKERS;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "triage.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TRIAGE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Minimum HTTP timeout in milliseconds.
pub(crate) const MIN_TIMEOUT_MS: u64 = 100;
/// Maximum HTTP timeout in milliseconds.
pub(crate) const MAX_TIMEOUT_MS: u64 = 120_000;
/// Maximum accepted queue response size in bytes.
pub(crate) const MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum number of lane mirror directories.
pub(crate) const MAX_MIRROR_DIRS: usize = 16;
/// Maximum length of header names, user agents, and env var names.
pub(crate) const MAX_TOKEN_FIELD_LENGTH: usize = 256;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Triage runner configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriageConfig {
    /// Run gate and worker settings.
    #[serde(default)]
    pub run: RunConfig,
    /// Submission queue client settings.
    #[serde(default)]
    pub queue: QueueConfig,
    /// Endpoint probe settings.
    #[serde(default)]
    pub probes: ProbeConfig,
    /// Filesystem layout.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Published document encoding.
    #[serde(default)]
    pub output: OutputConfig,
    /// Accepted-lane signing.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Heuristic rule set.
    #[serde(default)]
    pub rules: RuleSet,
}

impl TriageConfig {
    /// Loads configuration using the default resolution rules.
    ///
    /// Resolution order is the explicit path, then `TRIAGE_CONFIG`, then
    /// `triage.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.run.validate()?;
        self.queue.validate(self.run.enabled)?;
        self.probes.validate()?;
        self.storage.validate()?;
        self.signing.validate()?;
        self.rules.validate().map_err(|err| ConfigError::Invalid(format!("rules: {err}")))?;
        Ok(())
    }
}

/// Run gate and concurrency.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Runs are opt-in; a disabled run exits without touching anything.
    #[serde(default)]
    pub enabled: bool,
    /// Evaluation worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            workers: default_workers(),
        }
    }
}

impl RunConfig {
    /// Validates run configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(ConfigError::Invalid("run.workers out of range".to_string()));
        }
        Ok(())
    }
}

/// Submission queue client configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Queue base URL; required when runs are enabled.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Path of the pending list endpoint.
    #[serde(default = "default_list_path")]
    pub list_path: String,
    /// Path of the pending detail endpoint; the id is sent as `?id=`.
    #[serde(default = "default_detail_path")]
    pub detail_path: String,
    /// Environment variable holding the maintainer token.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Header carrying the maintainer token.
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_queue_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response body size in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// Permit plain `http` base URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            list_path: default_list_path(),
            detail_path: default_detail_path(),
            token_env: None,
            auth_header: default_auth_header(),
            timeout_ms: default_queue_timeout_ms(),
            max_response_bytes: default_max_response_bytes(),
            allow_http: false,
            user_agent: default_user_agent(),
        }
    }
}

impl QueueConfig {
    /// Validates queue configuration.
    fn validate(&self, run_enabled: bool) -> Result<(), ConfigError> {
        match self.base_url.as_deref() {
            Some(base) => {
                self.parsed_base_url_from(base)?;
            }
            None if run_enabled => {
                return Err(ConfigError::Invalid(
                    "queue.base_url is required when run.enabled = true".to_string(),
                ));
            }
            None => {}
        }
        validate_endpoint_path("queue.list_path", &self.list_path)?;
        validate_endpoint_path("queue.detail_path", &self.detail_path)?;
        validate_header_name("queue.auth_header", &self.auth_header)?;
        validate_text_field("queue.user_agent", &self.user_agent)?;
        if let Some(name) = &self.token_env {
            validate_env_name("queue.token_env", name)?;
        }
        validate_timeout("queue.timeout_ms", self.timeout_ms)?;
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_RESPONSE_BYTES {
            return Err(ConfigError::Invalid("queue.max_response_bytes out of range".to_string()));
        }
        Ok(())
    }

    /// Returns the parsed base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the base URL is missing or invalid.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("queue.base_url is not set".to_string()))?;
        self.parsed_base_url_from(base)
    }

    /// Parses and checks a base URL string.
    fn parsed_base_url_from(&self, base: &str) -> Result<Url, ConfigError> {
        let url = Url::parse(base.trim())
            .map_err(|err| ConfigError::Invalid(format!("queue.base_url invalid: {err}")))?;
        validate_scheme("queue.base_url", &url, self.allow_http)?;
        Ok(url)
    }

    /// Resolves the maintainer token from the environment.
    ///
    /// Returns `None` when no token variable is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the variable is configured but
    /// unset or blank.
    pub fn resolve_token(&self) -> Result<Option<String>, ConfigError> {
        let Some(name) = &self.token_env else {
            return Ok(None);
        };
        match env::var(name) {
            Ok(value) if !value.trim().is_empty() => Ok(Some(value.trim().to_string())),
            _ => Err(ConfigError::Invalid(format!(
                "queue.token_env names {name}, which is not set"
            ))),
        }
    }
}

/// Endpoint probe configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
    /// Permit probing plain `http` URLs.
    #[serde(default)]
    pub allow_http: bool,
    /// Permit probing loopback, private, and link-local addresses.
    #[serde(default)]
    pub allow_private_networks: bool,
    /// User agent sent with every probe.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            allow_http: false,
            allow_private_networks: false,
            user_agent: default_user_agent(),
        }
    }
}

impl ProbeConfig {
    /// Validates probe configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("probes.timeout_ms", self.timeout_ms)?;
        validate_text_field("probes.user_agent", &self.user_agent)
    }
}

/// Filesystem layout for ledger, lanes, logs, and snapshots.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory every relative path is resolved against.
    #[serde(default = "default_root")]
    pub root: String,
    /// Ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,
    /// Primary lane document directory.
    #[serde(default = "default_lanes_dir")]
    pub lanes_dir: String,
    /// Directories receiving byte-identical lane copies.
    #[serde(default)]
    pub mirror_dirs: Vec<String>,
    /// Monthly audit log directory.
    #[serde(default = "default_audit_dir")]
    pub audit_dir: String,
    /// Run snapshot directory.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            ledger_path: default_ledger_path(),
            lanes_dir: default_lanes_dir(),
            mirror_dirs: Vec::new(),
            audit_dir: default_audit_dir(),
            state_dir: default_state_dir(),
        }
    }
}

impl StorageConfig {
    /// Validates storage configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("storage.root", &self.root)?;
        validate_path_string("storage.ledger_path", &self.ledger_path)?;
        validate_path_string("storage.lanes_dir", &self.lanes_dir)?;
        validate_path_string("storage.audit_dir", &self.audit_dir)?;
        validate_path_string("storage.state_dir", &self.state_dir)?;
        if self.mirror_dirs.len() > MAX_MIRROR_DIRS {
            return Err(ConfigError::Invalid("storage.mirror_dirs too many entries".to_string()));
        }
        for dir in &self.mirror_dirs {
            validate_path_string("storage.mirror_dirs", dir)?;
        }
        let lanes = self.resolve(&self.lanes_dir);
        if self.mirror_dirs.iter().any(|dir| self.resolve(dir) == lanes) {
            return Err(ConfigError::Invalid(
                "storage.mirror_dirs must not include storage.lanes_dir".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolves a configured path against `root`.
    #[must_use]
    pub fn resolve(&self, value: &str) -> PathBuf {
        let path = Path::new(value.trim());
        if path.is_absolute() { path.to_path_buf() } else { Path::new(self.root.trim()).join(path) }
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn ledger_file(&self) -> PathBuf {
        self.resolve(&self.ledger_path)
    }

    /// Returns the primary lane directory.
    #[must_use]
    pub fn lanes_path(&self) -> PathBuf {
        self.resolve(&self.lanes_dir)
    }

    /// Returns every mirror directory.
    #[must_use]
    pub fn mirror_paths(&self) -> Vec<PathBuf> {
        self.mirror_dirs.iter().map(|dir| self.resolve(dir)).collect()
    }

    /// Returns the audit log directory.
    #[must_use]
    pub fn audit_path(&self) -> PathBuf {
        self.resolve(&self.audit_dir)
    }

    /// Returns the run snapshot directory.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.resolve(&self.state_dir)
    }
}

/// Published document encoding.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Escape non-ASCII characters in lane documents and snapshots.
    #[serde(default)]
    pub ascii_only: bool,
}

/// Accepted-lane signing configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// Attempt to sign the accepted lane after it changes.
    #[serde(default)]
    pub enabled: bool,
    /// Signing executable.
    #[serde(default = "default_signing_command")]
    pub command: String,
    /// Secret key file; required when signing is enabled.
    #[serde(default)]
    pub key_path: Option<String>,
    /// Environment variable holding the key passphrase.
    #[serde(default)]
    pub passphrase_env: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_signing_command(),
            key_path: None,
            passphrase_env: None,
        }
    }
}

impl SigningConfig {
    /// Validates signing configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_text_field("signing.command", &self.command)?;
        match &self.key_path {
            Some(path) => validate_path_string("signing.key_path", path)?,
            None if self.enabled => {
                return Err(ConfigError::Invalid(
                    "signing.key_path is required when signing.enabled = true".to_string(),
                ));
            }
            None => {}
        }
        if let Some(name) = &self.passphrase_env {
            validate_env_name("signing.passphrase_env", name)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default evaluation worker count.
const fn default_workers() -> usize {
    4
}

/// Default pending list path.
fn default_list_path() -> String {
    "/pending".to_string()
}

/// Default pending detail path.
fn default_detail_path() -> String {
    "/pending/get".to_string()
}

/// Default maintainer token header.
fn default_auth_header() -> String {
    "X-Maintainer-Token".to_string()
}

/// Default queue request timeout.
const fn default_queue_timeout_ms() -> u64 {
    25_000
}

/// Default maximum queue response size.
const fn default_max_response_bytes() -> usize {
    2 * 1024 * 1024
}

/// Default per-probe timeout.
const fn default_probe_timeout_ms() -> u64 {
    8_000
}

/// Default user agent.
fn default_user_agent() -> String {
    format!("triage/{}", env!("CARGO_PKG_VERSION"))
}

/// Default storage root.
fn default_root() -> String {
    ".".to_string()
}

/// Default ledger path.
fn default_ledger_path() -> String {
    "triage/ledgers/ledger.jsonl".to_string()
}

/// Default lane directory.
fn default_lanes_dir() -> String {
    "dumps".to_string()
}

/// Default audit log directory.
fn default_audit_dir() -> String {
    "triage/logs".to_string()
}

/// Default snapshot directory.
fn default_state_dir() -> String {
    "triage/state".to_string()
}

/// Default signing executable.
fn default_signing_command() -> String {
    "minisign".to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the explicit path, env, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates an endpoint path joined onto the queue base URL.
fn validate_endpoint_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if !value.starts_with('/') {
        return Err(ConfigError::Invalid(format!("{field} must start with '/'")));
    }
    if value.contains(['?', '#']) || value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field} must be a bare path")));
    }
    if value.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    Ok(())
}

/// Validates an HTTP header name (RFC 9110 token characters).
fn validate_header_name(field: &str, value: &str) -> Result<(), ConfigError> {
    validate_text_field(field, value)?;
    let valid = value
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte));
    if !valid {
        return Err(ConfigError::Invalid(format!("{field} is not a valid header name")));
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_name(field: &str, value: &str) -> Result<(), ConfigError> {
    validate_text_field(field, value)?;
    let valid = value.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        && !value.starts_with(|ch: char| ch.is_ascii_digit());
    if !valid {
        return Err(ConfigError::Invalid(format!("{field} is not a valid variable name")));
    }
    Ok(())
}

/// Validates a short, non-blank, single-line text field.
fn validate_text_field(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if value.len() > MAX_TOKEN_FIELD_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    if value.chars().any(char::is_control) {
        return Err(ConfigError::Invalid(format!("{field} must not contain control characters")));
    }
    Ok(())
}

/// Validates a timeout range.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if !(MIN_TIMEOUT_MS ..= MAX_TIMEOUT_MS).contains(&value) {
        return Err(ConfigError::Invalid(format!("{field} out of range")));
    }
    Ok(())
}

/// Enforces https unless plain http is explicitly allowed.
fn validate_scheme(field: &str, url: &Url, allow_http: bool) -> Result<(), ConfigError> {
    match url.scheme() {
        "https" => Ok(()),
        "http" if allow_http => Ok(()),
        "http" => Err(ConfigError::Invalid(format!("{field} must use https unless allow_http = true"))),
        other => Err(ConfigError::Invalid(format!("{field} has unsupported scheme {other}"))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known-good values.")]

    use super::*;

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        assert!(validate_path_string("storage.root", "   ").is_err());
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let value = format!("dir/{}", "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let err = validate_path_string("storage.lanes_dir", &value).unwrap_err();
        assert!(err.to_string().contains("storage.lanes_dir path component too long"));
    }

    #[test]
    fn header_names_reject_separators() {
        assert!(validate_header_name("queue.auth_header", "X-Token").is_ok());
        assert!(validate_header_name("queue.auth_header", "X Token").is_err());
        assert!(validate_header_name("queue.auth_header", "X:Token").is_err());
    }

    #[test]
    fn env_names_reject_leading_digit() {
        assert!(validate_env_name("queue.token_env", "TRIAGE_TOKEN").is_ok());
        assert!(validate_env_name("queue.token_env", "1TOKEN").is_err());
        assert!(validate_env_name("queue.token_env", "TOKEN-X").is_err());
    }

    #[test]
    fn storage_resolves_relative_to_root() {
        let storage = StorageConfig {
            root: "/srv/site".to_string(),
            ..StorageConfig::default()
        };
        assert_eq!(storage.lanes_path(), PathBuf::from("/srv/site/dumps"));
        assert_eq!(storage.resolve("/abs/ledger.jsonl"), PathBuf::from("/abs/ledger.jsonl"));
    }
}
