// persona-activation-core/src/runtime/resolver.rs
// ============================================================================
// Module: Activation Resolver
// Description: Resolve, replay, and audit-history entry points.
// Purpose: Orchestrate lookup, decision, and the audit write for each call.
// Dependencies: crate::{core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! [`ActivationResolver`] is the single execution path shared by the HTTP
//! server and the CLI.
//!
//! - `resolve_activation` always appends exactly one audit record before it
//!   returns. Lookup faults become `RESOLVER_ERROR` decisions; only a failed
//!   audit write is a hard error.
//! - `replay_resolver_decision` reads the stored record, verifies its digest,
//!   and returns it. It never touches the eligibility store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AuditId;
use crate::core::AuditRecord;
use crate::core::HashError;
use crate::core::ReplayedDecision;
use crate::core::ResolveRequest;
use crate::core::ResolverContext;
use crate::core::ResolverDecision;
use crate::core::UserId;
use crate::interfaces::AuditIdSource;
use crate::interfaces::AuditStore;
use crate::interfaces::EligibilityStore;
use crate::interfaces::StoreError;
use crate::runtime::engine::Verdict;
use crate::runtime::engine::decide;
use crate::runtime::lookup::lookup_eligibility;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum number of records returned by one audit history call.
pub const MAX_AUDIT_HISTORY_LIMIT: usize = 100;

/// Default number of records returned by an audit history call.
pub const DEFAULT_AUDIT_HISTORY_LIMIT: usize = 20;

// ============================================================================
// SECTION: Results and Errors
// ============================================================================

/// Result of a replay lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// The record exists and passed verification.
    Found(ReplayedDecision),
    /// No record exists for the id in this tenant.
    NotFound,
}

/// A user's recorded decisions, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditHistory {
    /// User the history belongs to.
    pub user_id: UserId,
    /// Records, newest first.
    pub records: Vec<AuditRecord>,
}

/// Hard resolver failures surfaced to callers.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The audit record could not be written.
    #[error("audit write failed: {0}")]
    AuditWrite(#[source] StoreError),
    /// The audit log could not be read.
    #[error("audit read failed: {0}")]
    AuditRead(#[source] StoreError),
    /// A stored record failed verification.
    #[error("audit record integrity failure: {0}")]
    Integrity(String),
    /// The decision could not be hashed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Persona auto-activation resolver.
pub struct ActivationResolver<E, A> {
    /// Eligibility store.
    eligibility: E,
    /// Audit log.
    audit: A,
    /// Audit id generator.
    audit_ids: Arc<dyn AuditIdSource + Send + Sync>,
}

impl<E, A> ActivationResolver<E, A>
where
    E: EligibilityStore,
    A: AuditStore,
{
    /// Creates a resolver over the given stores.
    #[must_use]
    pub fn new(eligibility: E, audit: A, audit_ids: Arc<dyn AuditIdSource + Send + Sync>) -> Self {
        Self {
            eligibility,
            audit,
            audit_ids,
        }
    }

    /// Returns the eligibility store.
    #[must_use]
    pub const fn eligibility(&self) -> &E {
        &self.eligibility
    }

    /// Resolves activation for a validated request and records the decision.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the audit record cannot be sealed or
    /// written. Ineligible outcomes and lookup faults are decisions, not
    /// errors.
    pub fn resolve_activation(
        &self,
        context: &ResolverContext,
        request: &ResolveRequest,
    ) -> Result<ResolverDecision, ResolverError> {
        let verdict = match lookup_eligibility(&self.eligibility, context, request) {
            Ok(eligibility) => decide(&eligibility, request.persona_id.as_ref()),
            Err(err) => Verdict::resolver_error(&err, request),
        };
        let decision = verdict.into_decision(self.audit_ids.next_id(), context.requested_at);
        let record = AuditRecord::seal(context, request.clone(), decision.clone())?;
        self.audit.append(&record).map_err(ResolverError::AuditWrite)?;
        Ok(decision)
    }

    /// Returns a recorded decision verbatim, tagged as a replay.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the audit log cannot be read or the
    /// stored record fails verification.
    pub fn replay_resolver_decision(
        &self,
        context: &ResolverContext,
        audit_id: &AuditId,
    ) -> Result<ReplayOutcome, ResolverError> {
        let Some(record) =
            self.audit.load(&context.tenant_id, audit_id).map_err(ResolverError::AuditRead)?
        else {
            return Ok(ReplayOutcome::NotFound);
        };
        if record.tenant_id != context.tenant_id || record.audit_id != *audit_id {
            return Err(ResolverError::Integrity(format!(
                "audit record {audit_id} does not match lookup key"
            )));
        }
        record.verify().map_err(ResolverError::Integrity)?;
        Ok(ReplayOutcome::Found(ReplayedDecision::from(record.decision)))
    }

    /// Lists a user's recorded decisions, newest first.
    ///
    /// `limit` is clamped to `1..=MAX_AUDIT_HISTORY_LIMIT`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the audit log cannot be read or a
    /// record fails verification.
    pub fn audit_history(
        &self,
        context: &ResolverContext,
        user_id: &UserId,
        limit: usize,
    ) -> Result<AuditHistory, ResolverError> {
        let limit = limit.clamp(1, MAX_AUDIT_HISTORY_LIMIT);
        let records = self
            .audit
            .list_for_user(&context.tenant_id, user_id, limit)
            .map_err(ResolverError::AuditRead)?;
        for record in &records {
            if record.tenant_id != context.tenant_id {
                return Err(ResolverError::Integrity(format!(
                    "audit record {} belongs to another tenant",
                    record.audit_id
                )));
            }
            record.verify().map_err(ResolverError::Integrity)?;
        }
        Ok(AuditHistory {
            user_id: user_id.clone(),
            records,
        })
    }
}
