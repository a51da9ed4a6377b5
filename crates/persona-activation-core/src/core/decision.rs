// persona-activation-core/src/core/decision.rs
// ============================================================================
// Module: Resolver Decisions
// Description: Resolver input, decision output, and sealed audit records.
// Purpose: Define the immutable facts produced by each resolver run.
// Dependencies: serde, thiserror, crate::core::hashing
// ============================================================================

//! ## Overview
//! A [`ResolverDecision`] is never mutated after creation. Each resolver run
//! seals its decision into an [`AuditRecord`] whose digest is checked again
//! on replay, so a replay returns the persisted fact rather than a fresh
//! computation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::context::ResolverContext;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::AuditId;
use crate::core::identifiers::BindingId;
use crate::core::identifiers::PersonaId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::identifiers::WorkspaceId;
use crate::core::model::StackStatus;
use crate::core::model::UserType;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Boundary validation failures. The resolver never runs for these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// `user_id` was absent or blank.
    #[error("user_id is required")]
    MissingUserId,
    /// `audit_id` was absent or blank.
    #[error("audit_id is required")]
    MissingAuditId,
    /// An identifier was blank.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },
    /// An identifier exceeded the length limit.
    #[error("{field} exceeds {max} bytes")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum length in bytes.
        max: usize,
    },
    /// An identifier contained control characters.
    #[error("{field} contains control characters")]
    ControlCharacters {
        /// Field name.
        field: &'static str,
    },
}

impl ValidationError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingUserId => "MISSING_USER_ID",
            Self::MissingAuditId => "MISSING_AUDIT_ID",
            Self::Empty {
                ..
            }
            | Self::TooLong {
                ..
            }
            | Self::ControlCharacters {
                ..
            } => "INVALID_IDENTIFIER",
        }
    }
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// Validated resolver input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// User to resolve.
    pub user_id: UserId,
    /// Persona to resolve against; the bound persona when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<PersonaId>,
}

impl ResolveRequest {
    /// Creates a request from already-trusted identifiers.
    #[must_use]
    pub const fn new(user_id: UserId, persona_id: Option<PersonaId>) -> Self {
        Self {
            user_id,
            persona_id,
        }
    }

    /// Validates raw request fields.
    ///
    /// A missing or blank `user_id` maps to [`ValidationError::MissingUserId`];
    /// a blank `persona_id` is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a field is missing or malformed.
    pub fn parse(user_id: Option<&str>, persona_id: Option<&str>) -> Result<Self, ValidationError> {
        let user_id = match user_id.map(str::trim) {
            None | Some("") => return Err(ValidationError::MissingUserId),
            Some(raw) => UserId::parse("user_id", raw)?,
        };
        let persona_id = match persona_id.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(PersonaId::parse("persona_id", raw)?),
        };
        Ok(Self {
            user_id,
            persona_id,
        })
    }
}

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Machine-readable explanation for a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Every check passed.
    Activated,
    /// No user row exists in the tenant.
    UserNotFound,
    /// The user has no workspace binding.
    NoBinding,
    /// The binding's stack is not ready.
    StackNotReady,
    /// The persona has no active current policy.
    PolicyNotActive,
    /// The lookup failed unexpectedly.
    ResolverError,
}

impl ReasonCode {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activated => "ACTIVATED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::NoBinding => "NO_BINDING",
            Self::StackNotReady => "STACK_NOT_READY",
            Self::PolicyNotActive => "POLICY_NOT_ACTIVE",
            Self::ResolverError => "RESOLVER_ERROR",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Immutable outcome of one resolver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverDecision {
    /// Whether the binding may be promoted to an active runtime.
    pub activated: bool,
    /// Reason code.
    pub reason_code: ReasonCode,
    /// Human-readable reason.
    pub reason_message: String,
    /// Audit record holding this decision.
    pub audit_id: AuditId,
    /// Binding evaluated, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_id: Option<BindingId>,
    /// Workspace of the binding or user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<WorkspaceId>,
    /// Persona evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<PersonaId>,
    /// User account class, when the user was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    /// Binding stack status, when a binding was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_status: Option<StackStatus>,
    /// Binding blockers, when a binding was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockers: Option<Vec<String>>,
    /// Time of the resolver run.
    pub timestamp: Timestamp,
}

/// A persisted decision returned by replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayedDecision {
    /// The decision exactly as recorded.
    #[serde(flatten)]
    pub decision: ResolverDecision,
    /// Always `true`; marks the payload as a replay.
    pub replay: bool,
}

impl From<ResolverDecision> for ReplayedDecision {
    fn from(decision: ResolverDecision) -> Self {
        Self {
            decision,
            replay: true,
        }
    }
}

// ============================================================================
// SECTION: Audit Records
// ============================================================================

/// Append-only record of one resolver invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record identifier; equals `decision.audit_id`.
    pub audit_id: AuditId,
    /// Tenant the invocation ran in.
    pub tenant_id: TenantId,
    /// Validated resolver input.
    pub input: ResolveRequest,
    /// Decision returned to the caller.
    pub decision: ResolverDecision,
    /// Authenticated caller subject.
    #[serde(default)]
    pub actor: Option<String>,
    /// Caller-supplied request identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Time the record was written.
    pub recorded_at: Timestamp,
    /// Digest of the canonical decision JSON.
    pub decision_hash: HashDigest,
}

impl AuditRecord {
    /// Seals a decision into a new audit record.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when the decision cannot be canonicalized.
    pub fn seal(
        context: &ResolverContext,
        input: ResolveRequest,
        decision: ResolverDecision,
    ) -> Result<Self, HashError> {
        let decision_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &decision)?;
        Ok(Self {
            audit_id: decision.audit_id.clone(),
            tenant_id: context.tenant_id.clone(),
            input,
            decision,
            actor: context.actor.clone(),
            request_id: context.request_id.clone(),
            recorded_at: context.requested_at,
            decision_hash,
        })
    }

    /// Recomputes the decision digest and checks record consistency.
    ///
    /// # Errors
    ///
    /// Returns a description of the mismatch when the record was altered.
    pub fn verify(&self) -> Result<(), String> {
        if self.audit_id != self.decision.audit_id {
            return Err(format!("audit_id mismatch in record {}", self.audit_id));
        }
        let expected = hash_canonical_json(self.decision_hash.algorithm, &self.decision)
            .map_err(|err| err.to_string())?;
        if expected.value != self.decision_hash.value {
            return Err(format!("decision hash mismatch in record {}", self.audit_id));
        }
        Ok(())
    }
}
