// persona-activation-core/src/core/context.rs
// ============================================================================
// Module: Resolver Context
// Description: Explicit per-request session context for resolver calls.
// Purpose: Carry the verified tenant and caller without ambient state.
// Dependencies: crate::core::{identifiers, time}
// ============================================================================

//! ## Overview
//! Every resolver, lookup, and replay call receives a [`ResolverContext`].
//! The tenant inside it comes from server-verified identity; request bodies
//! never supply or override it.

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

/// Verified session context for one resolver invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverContext {
    /// Tenant all reads and writes are scoped to.
    pub tenant_id: TenantId,
    /// Authenticated caller subject, recorded in the audit log.
    pub actor: Option<String>,
    /// Transport-level request identifier, when available.
    pub request_id: Option<String>,
    /// Host-supplied time of the request.
    pub requested_at: Timestamp,
}

impl ResolverContext {
    /// Creates a context for the given tenant and request time.
    #[must_use]
    pub const fn new(tenant_id: TenantId, requested_at: Timestamp) -> Self {
        Self {
            tenant_id,
            actor: None,
            request_id: None,
            requested_at,
        }
    }

    /// Returns a copy with the caller subject set.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Returns a copy with the request identifier set.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}
