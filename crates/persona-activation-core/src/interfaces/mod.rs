// persona-activation-core/src/interfaces/mod.rs
// ============================================================================
// Module: Persona Activation Interfaces
// Description: Storage and identifier-source contracts used by the resolver.
// Purpose: Keep the resolver independent of any particular backend.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! Stores are external collaborators. Every read is tenant scoped and every
//! audit write must either commit fully or not at all. Implementations fail
//! closed on corrupt or inconsistent data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::AuditId;
use crate::core::AuditRecord;
use crate::core::BindingScope;
use crate::core::PersonaId;
use crate::core::PersonaPolicy;
use crate::core::TenantId;
use crate::core::UserId;
use crate::core::UserRecord;
use crate::core::WorkspaceBinding;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store errors shared by all backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// A row with the same key already exists.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Backend-specific error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Eligibility
// ============================================================================

/// Read access to users, bindings, and persona policies.
pub trait EligibilityStore {
    /// Loads a user by identifier within the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn load_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<UserRecord>, StoreError>;

    /// Loads the binding for a persona within a scope, or the most recently
    /// updated binding in the scope when `persona_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn load_binding(
        &self,
        tenant_id: &TenantId,
        scope: &BindingScope,
        persona_id: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, StoreError>;

    /// Loads the persona's current policy version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn load_current_policy(
        &self,
        tenant_id: &TenantId,
        persona_id: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, StoreError>;
}

/// Write access used by provisioning, seeding, and policy administration.
pub trait EligibilityWriter {
    /// Inserts or replaces a user row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Inserts or replaces a binding row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_binding(&self, binding: &WorkspaceBinding) -> Result<(), StoreError>;

    /// Inserts or replaces a policy version. When the row is current, every
    /// other version of the persona is marked non-current in the same write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_policy(&self, policy: &PersonaPolicy) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Append-only audit log.
pub trait AuditStore {
    /// Appends a record. Existing ids are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] for duplicate ids and other
    /// [`StoreError`] variants when the write fails.
    fn append(&self, record: &AuditRecord) -> Result<(), StoreError>;

    /// Loads a record by id within the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn load(
        &self,
        tenant_id: &TenantId,
        audit_id: &AuditId,
    ) -> Result<Option<AuditRecord>, StoreError>;

    /// Lists a user's records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    fn list_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError>;
}

// ============================================================================
// SECTION: Audit Identifiers
// ============================================================================

/// Source of unique audit identifiers.
pub trait AuditIdSource {
    /// Returns a fresh identifier.
    fn next_id(&self) -> AuditId;
}
