// persona-activation-core/src/runtime/policy_admin.rs
// ============================================================================
// Module: Persona Policy Administration
// Description: Checked lifecycle transitions on a persona's current policy.
// Purpose: Route every status change through the lifecycle table.
// Dependencies: crate::{core, interfaces}, thiserror
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::PersonaId;
use crate::core::PersonaPolicy;
use crate::core::PolicyStatus;
use crate::core::PolicyTransitionError;
use crate::core::ResolverContext;
use crate::core::TransitionPath;
use crate::core::TransitionRules;
use crate::interfaces::EligibilityStore;
use crate::interfaces::EligibilityWriter;
use crate::interfaces::StoreError;

/// Accepted transition with the updated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyTransitionOutcome {
    /// Status before the transition.
    pub previous_status: PolicyStatus,
    /// Path taken through the lifecycle.
    pub path: TransitionPath,
    /// Updated policy row.
    pub policy: PersonaPolicy,
}

/// Policy administration failures.
#[derive(Debug, Error)]
pub enum PolicyAdminError {
    /// The persona has no current policy in the tenant.
    #[error("persona {0} has no current policy")]
    NotFound(PersonaId),
    /// The lifecycle table rejected the move.
    #[error(transparent)]
    Transition(#[from] PolicyTransitionError),
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Applies a checked transition to the persona's current policy.
///
/// # Errors
///
/// Returns [`PolicyAdminError`] when no current policy exists, the
/// transition is illegal, or the store fails.
pub fn transition_current_policy<R, W>(
    reader: &R,
    writer: &W,
    context: &ResolverContext,
    persona_id: &PersonaId,
    to: PolicyStatus,
    rules: TransitionRules,
) -> Result<PolicyTransitionOutcome, PolicyAdminError>
where
    R: EligibilityStore + ?Sized,
    W: EligibilityWriter + ?Sized,
{
    let current = reader
        .load_current_policy(&context.tenant_id, persona_id)?
        .ok_or_else(|| PolicyAdminError::NotFound(persona_id.clone()))?;
    let (policy, path) = current.transitioned(to, rules, context.requested_at)?;
    writer.upsert_policy(&policy)?;
    Ok(PolicyTransitionOutcome {
        previous_status: current.status,
        path,
        policy,
    })
}
