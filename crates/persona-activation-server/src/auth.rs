// persona-activation-server/src/auth.rs
// ============================================================================
// Module: Request Authn/Authz
// Description: Caller authentication and tenant binding for HTTP requests.
// Purpose: Derive the tenant and actor from server-verified credentials only.
// Dependencies: persona-activation-config, persona-activation-core, subtle
// ============================================================================

//! ## Overview
//! Every request is authorized before the resolver runs. The tenant of a
//! request comes from the matched principal (bearer mode) or from
//! `tenancy.local_tenant_id` (local-only mode), never from the request body.
//! Bearer tokens are compared as SHA-256 digests in constant time, and only
//! the digest fingerprint is ever logged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::net::IpAddr;

use persona_activation_config::POLICY_ADMIN_ROLE;
use persona_activation_config::ServerAuthConfig;
use persona_activation_config::ServerAuthMode;
use persona_activation_core::HashAlgorithm;
use persona_activation_core::TenantId;
use persona_activation_core::hashing::hash_bytes;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request transport facts used for auth decisions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Peer IP address when available.
    pub peer_ip: Option<IpAddr>,
    /// Authorization header value.
    pub auth_header: Option<String>,
    /// Optional request identifier for logging.
    pub request_id: Option<String>,
}

impl RequestContext {
    /// Builds an HTTP request context.
    #[must_use]
    pub const fn http(peer_ip: Option<IpAddr>, auth_header: Option<String>) -> Self {
        Self {
            peer_ip,
            auth_header,
            request_id: None,
        }
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Returns true when the peer IP is loopback.
    #[must_use]
    pub fn peer_is_loopback(&self) -> bool {
        self.peer_ip.is_some_and(|ip| ip.is_loopback())
    }
}

// ============================================================================
// SECTION: Auth Context
// ============================================================================

/// Authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authentication method.
    pub method: AuthMethod,
    /// Caller subject, recorded as the audit actor.
    pub subject: String,
    /// Tenant the caller is bound to.
    pub tenant_id: TenantId,
    /// Roles granted to the caller.
    pub roles: BTreeSet<String>,
    /// SHA-256 fingerprint of the bearer token.
    pub token_fingerprint: Option<String>,
}

impl AuthContext {
    /// Returns the auth method label.
    #[must_use]
    pub const fn method_label(&self) -> &'static str {
        match self.method {
            AuthMethod::Local => "local",
            AuthMethod::BearerToken => "bearer_token",
        }
    }
}

/// Authentication method used for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Loopback caller in local-only mode.
    Local,
    /// Bearer token matched to a configured principal.
    BearerToken,
}

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    /// Resolve activation for a user.
    Resolve,
    /// Replay a recorded decision.
    Replay,
    /// List a user's recorded decisions.
    AuditHistory,
    /// Change a persona policy's lifecycle status.
    PolicyTransition,
}

impl AuthAction {
    /// Returns the action label used in log events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Resolve => "activation.resolve",
            Self::Replay => "activation.replay",
            Self::AuditHistory => "activation.audit",
            Self::PolicyTransition => "policy.transition",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authentication or authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Caller is authenticated but not authorized.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Authn/authz interface for HTTP requests.
pub trait RequestAuthz: Send + Sync {
    /// Authorizes a request, returning the authenticated caller on success.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the caller is unknown or lacks access.
    fn authorize(&self, ctx: &RequestContext, action: AuthAction)
    -> Result<AuthContext, AuthError>;
}

// ============================================================================
// SECTION: Default Policy
// ============================================================================

/// Principal as held by the authorizer.
struct PrincipalEntry {
    /// SHA-256 digest of the token.
    token_digest: Vec<u8>,
    /// Hex fingerprint of the token.
    fingerprint: String,
    /// Subject label.
    subject: String,
    /// Bound tenant.
    tenant_id: TenantId,
    /// Granted roles.
    roles: BTreeSet<String>,
}

/// Default authz implementation derived from server config.
pub struct DefaultRequestAuthz {
    /// Configured auth mode.
    mode: ServerAuthMode,
    /// Tenant assigned to local-only callers.
    local_tenant_id: TenantId,
    /// Bearer principals.
    principals: Vec<PrincipalEntry>,
}

impl DefaultRequestAuthz {
    /// Builds an authz policy from server auth configuration.
    #[must_use]
    pub fn from_config(config: Option<&ServerAuthConfig>, local_tenant_id: TenantId) -> Self {
        let mode = config.map_or(ServerAuthMode::LocalOnly, |cfg| cfg.mode);
        let principals = config
            .map(|cfg| {
                cfg.principals
                    .iter()
                    .map(|principal| {
                        let digest = hash_bytes(HashAlgorithm::Sha256, principal.token.as_bytes());
                        PrincipalEntry {
                            token_digest: digest.value.as_bytes().to_vec(),
                            fingerprint: digest.value,
                            subject: principal.subject.clone(),
                            tenant_id: principal.tenant_id.clone(),
                            roles: principal.roles.iter().cloned().collect(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            mode,
            local_tenant_id,
            principals,
        }
    }

    /// Authorizes a loopback caller in local-only mode.
    fn authorize_local_only(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        if !ctx.peer_is_loopback() {
            return Err(AuthError::Unauthenticated(
                "local-only mode requires loopback access".to_string(),
            ));
        }
        Ok(AuthContext {
            method: AuthMethod::Local,
            subject: "loopback".to_string(),
            tenant_id: self.local_tenant_id.clone(),
            roles: BTreeSet::from([POLICY_ADMIN_ROLE.to_string()]),
            token_fingerprint: None,
        })
    }

    /// Matches the bearer token against every configured principal.
    fn authorize_bearer(&self, ctx: &RequestContext) -> Result<AuthContext, AuthError> {
        let token = parse_bearer_token(ctx.auth_header.as_deref())?;
        let candidate = hash_bytes(HashAlgorithm::Sha256, token.as_bytes()).value;
        let mut matched = None;
        for principal in &self.principals {
            let equal: bool = principal.token_digest.ct_eq(candidate.as_bytes()).into();
            if equal {
                matched = Some(principal);
            }
        }
        let principal = matched
            .ok_or_else(|| AuthError::Unauthenticated("invalid bearer token".to_string()))?;
        Ok(AuthContext {
            method: AuthMethod::BearerToken,
            subject: principal.subject.clone(),
            tenant_id: principal.tenant_id.clone(),
            roles: principal.roles.clone(),
            token_fingerprint: Some(principal.fingerprint.clone()),
        })
    }
}

impl RequestAuthz for DefaultRequestAuthz {
    fn authorize(
        &self,
        ctx: &RequestContext,
        action: AuthAction,
    ) -> Result<AuthContext, AuthError> {
        let auth = match self.mode {
            ServerAuthMode::LocalOnly => self.authorize_local_only(ctx)?,
            ServerAuthMode::BearerToken => self.authorize_bearer(ctx)?,
        };
        if action == AuthAction::PolicyTransition && !auth.roles.contains(POLICY_ADMIN_ROLE) {
            return Err(AuthError::Unauthorized(format!("{POLICY_ADMIN_ROLE} role required")));
        }
        Ok(auth)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}
