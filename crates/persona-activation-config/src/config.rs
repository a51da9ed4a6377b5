// persona-activation-config/src/config.rs
// ============================================================================
// Module: Persona Activation Configuration
// Description: Configuration loading and validation for the activation resolver.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: persona-activation-core, persona-activation-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. A non-loopback bind is only
//! accepted with bearer-token auth, since local-only callers are assigned the
//! configured local tenant without presenting credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use persona_activation_core::TenantId;
use persona_activation_core::TransitionRules;
use persona_activation_store_sqlite::SqliteStoreConfig;
use persona_activation_store_sqlite::SqliteStoreMode;
use persona_activation_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "persona-activation.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PERSONA_ACTIVATION_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of configured principals.
pub(crate) const MAX_AUTH_TOKENS: usize = 64;
/// Maximum length of a bearer token.
pub(crate) const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Maximum length of a principal subject.
pub(crate) const MAX_AUTH_SUBJECT_LENGTH: usize = 512;
/// Maximum number of roles per principal.
pub(crate) const MAX_PRINCIPAL_ROLES: usize = 16;
/// Maximum request body size accepted by validation.
pub const MAX_BODY_BYTES_LIMIT: usize = 16 * 1024 * 1024;
/// Role required to change persona policy status.
pub const POLICY_ADMIN_ROLE: &str = "policy_admin";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Persona activation resolver configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ActivationConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Tenant assignment for unauthenticated local callers.
    #[serde(default)]
    pub tenancy: TenancyConfig,
    /// Eligibility and audit store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Persona policy lifecycle rules.
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl ActivationConfig {
    /// Loads configuration from disk using the default resolution rules.
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
        self.server.validate()?;
        self.tenancy.validate()?;
        self.store.validate()?;
        Ok(())
    }

    /// Returns the lifecycle rules derived from the policy section.
    #[must_use]
    pub const fn transition_rules(&self) -> TransitionRules {
        TransitionRules {
            allow_direct_activation: self.policy.allow_direct_activation,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Optional authentication configuration for inbound requests.
    #[serde(default)]
    pub auth: Option<ServerAuthConfig>,
    /// Access log configuration.
    #[serde(default)]
    pub access_log: AccessLogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: None,
            access_log: AccessLogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the effective auth mode.
    #[must_use]
    pub fn auth_mode(&self) -> ServerAuthMode {
        self.auth.as_ref().map_or(ServerAuthMode::LocalOnly, |auth| auth.mode)
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let bind = self.bind.trim();
        if bind.is_empty() {
            return Err(ConfigError::Invalid("server.bind must be non-empty".to_string()));
        }
        bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes > MAX_BODY_BYTES_LIMIT {
            return Err(ConfigError::Invalid("max_body_bytes exceeds limit".to_string()));
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        self.access_log.validate()?;
        let addr = self.bind_addr()?;
        if !addr.ip().is_loopback() && self.auth_mode() == ServerAuthMode::LocalOnly {
            return Err(ConfigError::Invalid(
                "non-loopback bind disallowed without auth policy".to_string(),
            ));
        }
        Ok(())
    }
}

/// Inbound auth modes for HTTP requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServerAuthMode {
    /// Loopback callers only, assigned the local tenant.
    #[default]
    LocalOnly,
    /// Bearer token authentication against configured principals.
    BearerToken,
}

/// Server authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerAuthConfig {
    /// Auth mode for inbound requests.
    #[serde(default)]
    pub mode: ServerAuthMode,
    /// Principals accepted in bearer mode.
    #[serde(default)]
    pub principals: Vec<PrincipalConfig>,
}

impl ServerAuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.principals.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid("too many auth principals".to_string()));
        }
        let mut tokens = BTreeSet::new();
        for principal in &self.principals {
            principal.validate()?;
            if !tokens.insert(principal.token.as_str()) {
                return Err(ConfigError::Invalid("duplicate auth token".to_string()));
            }
        }
        match self.mode {
            ServerAuthMode::LocalOnly => Ok(()),
            ServerAuthMode::BearerToken => {
                if self.principals.is_empty() {
                    return Err(ConfigError::Invalid(
                        "bearer_token auth requires principals".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Bearer principal bound to exactly one tenant.
#[derive(Debug, Clone, Deserialize)]
pub struct PrincipalConfig {
    /// Bearer token presented by the caller.
    pub token: String,
    /// Subject recorded as the audit actor.
    pub subject: String,
    /// Tenant every request from this principal is scoped to.
    pub tenant_id: TenantId,
    /// Role names granted to the principal.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl PrincipalConfig {
    /// Returns true when the principal carries the role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|granted| granted == role)
    }

    /// Validates principal configuration constraints.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.token.trim().is_empty() {
            return Err(ConfigError::Invalid("auth token must be non-empty".to_string()));
        }
        if self.token.len() > MAX_AUTH_TOKEN_LENGTH {
            return Err(ConfigError::Invalid("auth token too long".to_string()));
        }
        if self.token.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "auth token must not contain whitespace".to_string(),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth.principals.subject must be non-empty".to_string(),
            ));
        }
        if self.subject.len() > MAX_AUTH_SUBJECT_LENGTH {
            return Err(ConfigError::Invalid("auth.principals.subject too long".to_string()));
        }
        validate_tenant_id("auth.principals.tenant_id", &self.tenant_id)?;
        if self.roles.len() > MAX_PRINCIPAL_ROLES {
            return Err(ConfigError::Invalid(
                "auth.principals.roles exceeds max entries".to_string(),
            ));
        }
        if self.roles.iter().any(|role| role.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "auth.principals.roles entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Structured access log configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessLogConfig {
    /// Enable structured access logging.
    #[serde(default = "default_access_log_enabled")]
    pub enabled: bool,
    /// Optional access log path (JSON lines). Stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: default_access_log_enabled(),
            path: None,
        }
    }
}

impl AccessLogConfig {
    /// Validates access log configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("access_log.path", path)?;
        }
        Ok(())
    }
}

/// Tenant assignment for local-only callers.
#[derive(Debug, Clone, Deserialize)]
pub struct TenancyConfig {
    /// Tenant assigned to loopback callers in `local_only` mode.
    #[serde(default = "default_local_tenant_id")]
    pub local_tenant_id: TenantId,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            local_tenant_id: default_local_tenant_id(),
        }
    }
}

impl TenancyConfig {
    /// Validates the tenancy section.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_tenant_id("tenancy.local_tenant_id", &self.local_tenant_id)
    }
}

/// Eligibility and audit store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns the `SQLite` settings when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_store_path(path)?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid(
                        "store busy_timeout_ms must be greater than zero".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Persona policy lifecycle configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PolicyConfig {
    /// Permit `DRAFT → ACTIVE` without staging.
    #[serde(default = "default_allow_direct_activation")]
    pub allow_direct_activation: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_direct_activation: default_allow_direct_activation(),
        }
    }
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

/// Resolves the config path from CLI or environment defaults.
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

/// Validates a configured tenant id. Requests are scoped to the value as
/// written, so it must already be trimmed.
fn validate_tenant_id(field: &str, tenant_id: &TenantId) -> Result<(), ConfigError> {
    let raw = tenant_id.as_str();
    let parsed = TenantId::parse("tenant_id", raw)
        .map_err(|err| ConfigError::Invalid(format!("{field} invalid: {err}")))?;
    if parsed.as_str() != raw {
        return Err(ConfigError::Invalid(format!("{field} invalid: surrounding whitespace")));
    }
    Ok(())
}

/// Validates the store database path.
fn validate_store_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("store path must be non-empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("store path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("store path component too long".to_string()));
        }
    }
    Ok(())
}

/// Default bind address for the HTTP listener.
pub(crate) fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default maximum request body size in bytes.
pub(crate) const fn default_max_body_bytes() -> usize {
    64 * 1024
}

/// Default access log toggle.
pub(crate) const fn default_access_log_enabled() -> bool {
    true
}

/// Default tenant for local-only callers.
pub(crate) fn default_local_tenant_id() -> TenantId {
    TenantId::new("local")
}

/// Default busy timeout for the `SQLite` store (ms).
pub(crate) const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

/// Direct activation is permitted unless disabled.
pub(crate) const fn default_allow_direct_activation() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
