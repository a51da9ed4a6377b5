// persona-activation-core/src/runtime/engine.rs
// ============================================================================
// Module: Activation Decision Engine
// Description: Pure precedence mapping from eligibility to a verdict.
// Purpose: Yield exactly one reason for any eligibility snapshot.
// Dependencies: crate::core, crate::runtime::lookup
// ============================================================================

//! ## Overview
//! [`decide`] is a pure function. Checks run in a fixed order and the first
//! failing check wins:
//!
//! 1. user missing → `USER_NOT_FOUND`
//! 2. binding missing → `NO_BINDING`
//! 3. stack not ready → `STACK_NOT_READY`
//! 4. current policy missing or not active → `POLICY_NOT_ACTIVE`
//! 5. otherwise → `ACTIVATED`
//!
//! The same snapshot always produces the same verdict, whichever conditions
//! hold at the same time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::AuditId;
use crate::core::BindingId;
use crate::core::PersonaId;
use crate::core::ReasonCode;
use crate::core::ResolveRequest;
use crate::core::ResolverDecision;
use crate::core::StackStatus;
use crate::core::Timestamp;
use crate::core::UserType;
use crate::core::WorkspaceId;
use crate::runtime::lookup::Eligibility;
use crate::runtime::lookup::LookupError;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Engine output before an audit identifier is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// Whether activation is allowed.
    pub activated: bool,
    /// Reason code for the verdict.
    pub reason_code: ReasonCode,
    /// Human-readable reason.
    pub reason_message: String,
    /// Binding evaluated.
    pub binding_id: Option<BindingId>,
    /// Workspace evaluated.
    pub workspace_id: Option<WorkspaceId>,
    /// Persona evaluated.
    pub persona_id: Option<PersonaId>,
    /// User account class.
    pub user_type: Option<UserType>,
    /// Binding stack status.
    pub stack_status: Option<StackStatus>,
    /// Binding blockers.
    pub blockers: Option<Vec<String>>,
}

impl Verdict {
    /// Creates a bare rejection carrying only a reason.
    fn rejected(reason_code: ReasonCode, reason_message: impl Into<String>) -> Self {
        Self {
            activated: false,
            reason_code,
            reason_message: reason_message.into(),
            binding_id: None,
            workspace_id: None,
            persona_id: None,
            user_type: None,
            stack_status: None,
            blockers: None,
        }
    }

    /// Builds the verdict recorded when the eligibility lookup faults.
    #[must_use]
    pub fn resolver_error(error: &LookupError, request: &ResolveRequest) -> Self {
        let mut verdict = Self::rejected(
            ReasonCode::ResolverError,
            format!("eligibility lookup failed: {}", error.kind()),
        );
        verdict.persona_id.clone_from(&request.persona_id);
        verdict
    }

    /// Stamps the verdict into an immutable decision.
    #[must_use]
    pub fn into_decision(self, audit_id: AuditId, timestamp: Timestamp) -> ResolverDecision {
        ResolverDecision {
            activated: self.activated,
            reason_code: self.reason_code,
            reason_message: self.reason_message,
            audit_id,
            binding_id: self.binding_id,
            workspace_id: self.workspace_id,
            persona_id: self.persona_id,
            user_type: self.user_type,
            stack_status: self.stack_status,
            blockers: self.blockers,
            timestamp,
        }
    }
}

// ============================================================================
// SECTION: Decision Function
// ============================================================================

/// Maps an eligibility snapshot to a verdict.
#[must_use]
pub fn decide(eligibility: &Eligibility, requested_persona: Option<&PersonaId>) -> Verdict {
    match eligibility {
        Eligibility::UserNotFound => {
            let mut verdict = Verdict::rejected(ReasonCode::UserNotFound, "user not found");
            verdict.persona_id = requested_persona.cloned();
            verdict
        }
        Eligibility::NoBinding {
            user,
        } => {
            let mut verdict =
                Verdict::rejected(ReasonCode::NoBinding, "user has no workspace binding");
            verdict.persona_id = requested_persona.cloned();
            verdict.workspace_id.clone_from(&user.workspace_id);
            verdict.user_type = Some(user.user_type);
            verdict
        }
        Eligibility::Bound {
            user,
            binding,
            policy,
        } => {
            let (activated, reason_code, reason_message) = if !binding.stack_status.is_ready() {
                (
                    false,
                    ReasonCode::StackNotReady,
                    format!("workspace stack is {}", binding.stack_status),
                )
            } else {
                match policy {
                    None => (
                        false,
                        ReasonCode::PolicyNotActive,
                        "persona has no current policy".to_string(),
                    ),
                    Some(policy) if !policy.is_active() => (
                        false,
                        ReasonCode::PolicyNotActive,
                        format!("persona policy v{} is {}", policy.version, policy.status),
                    ),
                    Some(_) => (true, ReasonCode::Activated, "persona activated".to_string()),
                }
            };
            Verdict {
                activated,
                reason_code,
                reason_message,
                binding_id: Some(binding.binding_id.clone()),
                workspace_id: Some(binding.workspace_id.clone()),
                persona_id: Some(binding.persona_id.clone()),
                user_type: Some(user.user_type),
                stack_status: Some(binding.stack_status),
                blockers: Some(binding.blockers.clone()),
            }
        }
    }
}
