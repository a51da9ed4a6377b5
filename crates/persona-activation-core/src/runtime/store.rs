// persona-activation-core/src/runtime/store.rs
// ============================================================================
// Module: In-Memory Activation Store
// Description: Mutex-guarded eligibility and audit store plus shared wrappers.
// Purpose: Provide a deterministic backend for tests, demos, and `memory` mode.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! [`InMemoryActivationStore`] implements every store trait over one mutex,
//! so a policy upsert and the clearing of the previous current row happen
//! together. Cloning shares the underlying state. Data is lost on drop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::AuditId;
use crate::core::AuditRecord;
use crate::core::BindingScope;
use crate::core::PersonaId;
use crate::core::PersonaPolicy;
use crate::core::TenantId;
use crate::core::UserId;
use crate::core::UserRecord;
use crate::core::WorkspaceBinding;
use crate::interfaces::AuditStore;
use crate::interfaces::EligibilityStore;
use crate::interfaces::EligibilityWriter;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Rows held by the in-memory store.
#[derive(Debug, Default)]
struct MemoryState {
    /// Users keyed by `(tenant, user)`.
    users: BTreeMap<(TenantId, UserId), UserRecord>,
    /// Bindings keyed by `(tenant, binding)`.
    bindings: BTreeMap<(TenantId, String), WorkspaceBinding>,
    /// Policies keyed by `(tenant, persona, version)`.
    policies: BTreeMap<(TenantId, PersonaId, u32), PersonaPolicy>,
    /// Audit records in append order.
    audit: Vec<AuditRecord>,
    /// Audit id to position in `audit`.
    audit_index: BTreeMap<AuditId, usize>,
}

/// In-memory activation store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryActivationStore {
    /// Shared state protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryActivationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of audit records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the mutex is poisoned.
    pub fn audit_len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.audit.len())
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("activation store mutex poisoned".to_string()))
    }
}

impl EligibilityStore for InMemoryActivationStore {
    fn load_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.users.get(&(tenant_id.clone(), user_id.clone())).cloned())
    }

    fn load_binding(
        &self,
        tenant_id: &TenantId,
        scope: &BindingScope,
        persona_id: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, StoreError> {
        let guard = self.lock()?;
        let binding = guard
            .bindings
            .values()
            .filter(|binding| binding.tenant_id == *tenant_id && scope.contains(binding))
            .filter(|binding| persona_id.is_none_or(|persona| binding.persona_id == *persona))
            .max_by(|a, b| {
                a.updated_at
                    .ordering_value()
                    .cmp(&b.updated_at.ordering_value())
                    .then_with(|| a.binding_id.cmp(&b.binding_id))
            })
            .cloned();
        Ok(binding)
    }

    fn load_current_policy(
        &self,
        tenant_id: &TenantId,
        persona_id: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, StoreError> {
        let guard = self.lock()?;
        let mut current = guard.policies.values().filter(|policy| {
            policy.tenant_id == *tenant_id && policy.persona_id == *persona_id && policy.is_current
        });
        let first = current.next().cloned();
        if current.next().is_some() {
            return Err(StoreError::Corrupt(format!(
                "persona {persona_id} has more than one current policy"
            )));
        }
        Ok(first)
    }
}

impl EligibilityWriter for InMemoryActivationStore {
    fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.lock()?.users.insert((user.tenant_id.clone(), user.user_id.clone()), user.clone());
        Ok(())
    }

    fn upsert_binding(&self, binding: &WorkspaceBinding) -> Result<(), StoreError> {
        let key = (binding.tenant_id.clone(), binding.binding_id.as_str().to_string());
        self.lock()?.bindings.insert(key, binding.clone());
        Ok(())
    }

    fn upsert_policy(&self, policy: &PersonaPolicy) -> Result<(), StoreError> {
        if policy.version == 0 {
            return Err(StoreError::Invalid("policy version must be at least 1".to_string()));
        }
        let mut guard = self.lock()?;
        if policy.is_current {
            for row in guard.policies.values_mut() {
                if row.tenant_id == policy.tenant_id && row.persona_id == policy.persona_id {
                    row.is_current = false;
                }
            }
        }
        guard.policies.insert(
            (policy.tenant_id.clone(), policy.persona_id.clone(), policy.version),
            policy.clone(),
        );
        drop(guard);
        Ok(())
    }
}

impl AuditStore for InMemoryActivationStore {
    fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.audit_index.contains_key(&record.audit_id) {
            return Err(StoreError::Conflict(format!(
                "audit record {} already exists",
                record.audit_id
            )));
        }
        let position = guard.audit.len();
        guard.audit.push(record.clone());
        guard.audit_index.insert(record.audit_id.clone(), position);
        drop(guard);
        Ok(())
    }

    fn load(
        &self,
        tenant_id: &TenantId,
        audit_id: &AuditId,
    ) -> Result<Option<AuditRecord>, StoreError> {
        let guard = self.lock()?;
        let record = guard
            .audit_index
            .get(audit_id)
            .and_then(|position| guard.audit.get(*position))
            .filter(|record| record.tenant_id == *tenant_id)
            .cloned();
        Ok(record)
    }

    fn list_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .audit
            .iter()
            .rev()
            .filter(|record| record.tenant_id == *tenant_id && record.input.user_id == *user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ============================================================================
// SECTION: Shared Wrappers
// ============================================================================

/// Shared eligibility store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedEligibilityStore {
    /// Inner store implementation.
    inner: Arc<dyn EligibilityStore + Send + Sync>,
}

impl SharedEligibilityStore {
    /// Wraps an eligibility store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl EligibilityStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn EligibilityStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl EligibilityStore for SharedEligibilityStore {
    fn load_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.inner.load_user(tenant_id, user_id)
    }

    fn load_binding(
        &self,
        tenant_id: &TenantId,
        scope: &BindingScope,
        persona_id: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, StoreError> {
        self.inner.load_binding(tenant_id, scope, persona_id)
    }

    fn load_current_policy(
        &self,
        tenant_id: &TenantId,
        persona_id: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, StoreError> {
        self.inner.load_current_policy(tenant_id, persona_id)
    }
}

/// Shared eligibility writer backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedEligibilityWriter {
    /// Inner writer implementation.
    inner: Arc<dyn EligibilityWriter + Send + Sync>,
}

impl SharedEligibilityWriter {
    /// Wraps a writer in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl EligibilityWriter + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl EligibilityWriter for SharedEligibilityWriter {
    fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.inner.upsert_user(user)
    }

    fn upsert_binding(&self, binding: &WorkspaceBinding) -> Result<(), StoreError> {
        self.inner.upsert_binding(binding)
    }

    fn upsert_policy(&self, policy: &PersonaPolicy) -> Result<(), StoreError> {
        self.inner.upsert_policy(policy)
    }
}

/// Shared audit store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedAuditStore {
    /// Inner store implementation.
    inner: Arc<dyn AuditStore + Send + Sync>,
}

impl SharedAuditStore {
    /// Wraps an audit store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl AuditStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn AuditStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl AuditStore for SharedAuditStore {
    fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.inner.append(record)
    }

    fn load(
        &self,
        tenant_id: &TenantId,
        audit_id: &AuditId,
    ) -> Result<Option<AuditRecord>, StoreError> {
        self.inner.load(tenant_id, audit_id)
    }

    fn list_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        self.inner.list_for_user(tenant_id, user_id, limit)
    }
}
