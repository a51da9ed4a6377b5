// persona-activation-core/src/runtime/lookup.rs
// ============================================================================
// Module: Eligibility Lookup
// Description: Tenant-scoped reads of the user, binding, and current policy.
// Purpose: Produce the snapshot the decision engine evaluates.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The lookup separates "not found" from "found but not ready": a missing
//! user or binding is an [`Eligibility`] variant, never an error. Errors are
//! reserved for store faults and rows that contradict the request (another
//! tenant, another persona, a non-current policy), which the resolver
//! records as `RESOLVER_ERROR`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::BindingScope;
use crate::core::PersonaPolicy;
use crate::core::ResolveRequest;
use crate::core::ResolverContext;
use crate::core::UserRecord;
use crate::core::WorkspaceBinding;
use crate::interfaces::EligibilityStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Eligibility snapshot read for one resolver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// No user with the requested id exists in the tenant.
    UserNotFound,
    /// The user exists but has no binding in scope.
    NoBinding {
        /// User row.
        user: UserRecord,
    },
    /// A binding was found.
    Bound {
        /// User row.
        user: UserRecord,
        /// Selected binding.
        binding: WorkspaceBinding,
        /// Current policy of the bound persona, if any.
        policy: Option<PersonaPolicy>,
    },
}

/// Eligibility lookup faults.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The store returned rows that contradict the request.
    #[error("inconsistent eligibility data: {0}")]
    Inconsistent(String),
}

impl LookupError {
    /// Returns a short label safe to embed in decisions.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Io(_)) => "store_io",
            Self::Store(StoreError::Corrupt(_)) => "store_corrupt",
            Self::Store(StoreError::VersionMismatch(_)) => "store_version",
            Self::Store(_) => "store",
            Self::Inconsistent(_) => "inconsistent_data",
        }
    }
}

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// Reads the eligibility snapshot for a request.
///
/// # Errors
///
/// Returns [`LookupError`] on store faults or inconsistent rows.
pub fn lookup_eligibility<S: EligibilityStore + ?Sized>(
    store: &S,
    context: &ResolverContext,
    request: &ResolveRequest,
) -> Result<Eligibility, LookupError> {
    let tenant_id = &context.tenant_id;
    let Some(user) = store.load_user(tenant_id, &request.user_id)? else {
        return Ok(Eligibility::UserNotFound);
    };
    if user.tenant_id != *tenant_id || user.user_id != request.user_id {
        return Err(LookupError::Inconsistent(format!(
            "user row {} does not match request",
            request.user_id
        )));
    }

    let scope = BindingScope::for_user(&user);
    let Some(binding) = store.load_binding(tenant_id, &scope, request.persona_id.as_ref())? else {
        return Ok(Eligibility::NoBinding {
            user,
        });
    };
    if binding.tenant_id != *tenant_id || !scope.contains(&binding) {
        return Err(LookupError::Inconsistent(format!(
            "binding {} is outside the user's scope",
            binding.binding_id
        )));
    }
    if let Some(persona_id) = &request.persona_id
        && binding.persona_id != *persona_id
    {
        return Err(LookupError::Inconsistent(format!(
            "binding {} is bound to another persona",
            binding.binding_id
        )));
    }

    let policy = store.load_current_policy(tenant_id, &binding.persona_id)?;
    if let Some(policy) = &policy
        && (policy.tenant_id != *tenant_id
            || policy.persona_id != binding.persona_id
            || !policy.is_current)
    {
        return Err(LookupError::Inconsistent(format!(
            "policy row for persona {} is not the current version",
            binding.persona_id
        )));
    }

    Ok(Eligibility::Bound {
        user,
        binding,
        policy,
    })
}
