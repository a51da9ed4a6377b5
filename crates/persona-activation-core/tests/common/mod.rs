// persona-activation-core/tests/common/mod.rs
// =============================================================================
// Module: Resolver Test Helpers
// Description: Shared fixtures and instrumented stores for resolver tests.
// Purpose: Reduce duplication across persona-activation-core integration tests.
// =============================================================================

#![allow(
    dead_code,
    clippy::expect_used,
    reason = "Test helpers are selectively used across suites."
)]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use persona_activation_core::ActivationResolver;
use persona_activation_core::BindingId;
use persona_activation_core::BindingScope;
use persona_activation_core::EligibilityStore;
use persona_activation_core::EligibilityWriter;
use persona_activation_core::InMemoryActivationStore;
use persona_activation_core::PersonaId;
use persona_activation_core::PersonaPolicy;
use persona_activation_core::PolicyStatus;
use persona_activation_core::ResolverContext;
use persona_activation_core::SequentialAuditIdSource;
use persona_activation_core::StackStatus;
use persona_activation_core::StoreError;
use persona_activation_core::TenantId;
use persona_activation_core::Timestamp;
use persona_activation_core::UserId;
use persona_activation_core::UserRecord;
use persona_activation_core::UserType;
use persona_activation_core::WorkspaceBinding;
use persona_activation_core::WorkspaceId;

/// Tenant used by every fixture.
pub const TENANT: &str = "tenant-a";

/// Returns the fixture tenant id.
pub fn tenant() -> TenantId {
    TenantId::new(TENANT)
}

/// Returns a context in the fixture tenant at logical time `at`.
pub fn context_at(at: u64) -> ResolverContext {
    ResolverContext::new(tenant(), Timestamp::Logical(at)).with_actor("tester")
}

/// Builds an individual user row.
pub fn individual(user_id: &str) -> UserRecord {
    UserRecord {
        tenant_id: tenant(),
        user_id: UserId::new(user_id),
        user_type: UserType::Individual,
        enterprise_id: None,
        workspace_id: None,
        is_demo: false,
    }
}

/// Builds a binding row.
pub fn binding(
    binding_id: &str,
    user_id: &str,
    persona_id: &str,
    stack_status: StackStatus,
    blockers: &[&str],
    updated_at: u64,
) -> WorkspaceBinding {
    WorkspaceBinding {
        binding_id: BindingId::new(binding_id),
        tenant_id: tenant(),
        user_id: UserId::new(user_id),
        workspace_id: WorkspaceId::new(format!("ws-{user_id}")),
        persona_id: PersonaId::new(persona_id),
        stack_status,
        blockers: blockers.iter().map(|blocker| (*blocker).to_string()).collect(),
        updated_at: Timestamp::Logical(updated_at),
    }
}

/// Builds a current policy row.
pub fn policy(persona_id: &str, version: u32, status: PolicyStatus) -> PersonaPolicy {
    PersonaPolicy {
        tenant_id: tenant(),
        persona_id: PersonaId::new(persona_id),
        version,
        status,
        is_current: true,
        activated_at: (status == PolicyStatus::Active).then_some(Timestamp::Logical(1)),
        updated_at: Timestamp::Logical(1),
    }
}

/// Seeds the four reference scenarios:
/// `u1` has no binding, `u2` is provisioning with a blocker, `u3` is bound to
/// a staged persona `p1`, and `u4` is bound to an active persona `p2`.
pub fn seeded_store() -> InMemoryActivationStore {
    let store = InMemoryActivationStore::new();
    for user in ["u1", "u2", "u3", "u4"] {
        store.upsert_user(&individual(user)).expect("seed user");
    }
    store
        .upsert_binding(&binding(
            "b2",
            "u2",
            "p2",
            StackStatus::Provisioning,
            &["missing_signals"],
            10,
        ))
        .expect("seed b2");
    store.upsert_binding(&binding("b3", "u3", "p1", StackStatus::Ready, &[], 10)).expect("seed b3");
    store.upsert_binding(&binding("b4", "u4", "p2", StackStatus::Ready, &[], 10)).expect("seed b4");
    store.upsert_policy(&policy("p1", 1, PolicyStatus::Staged)).expect("seed p1");
    store.upsert_policy(&policy("p2", 1, PolicyStatus::Active)).expect("seed p2");
    store
}

/// Builds a resolver whose stores share one in-memory backend.
pub fn resolver_over<E>(
    eligibility: E,
    audit: InMemoryActivationStore,
) -> ActivationResolver<E, InMemoryActivationStore>
where
    E: EligibilityStore,
{
    ActivationResolver::new(eligibility, audit, Arc::new(SequentialAuditIdSource::new("audit-")))
}

/// Eligibility store wrapper that counts every lookup call.
#[derive(Clone)]
pub struct CountingStore {
    /// Wrapped store.
    inner: InMemoryActivationStore,
    /// Number of eligibility reads.
    calls: Arc<AtomicUsize>,
}

impl CountingStore {
    /// Wraps a store.
    pub fn new(inner: InMemoryActivationStore) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the number of eligibility reads so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EligibilityStore for CountingStore {
    fn load_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load_user(tenant_id, user_id)
    }

    fn load_binding(
        &self,
        tenant_id: &TenantId,
        scope: &BindingScope,
        persona_id: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load_binding(tenant_id, scope, persona_id)
    }

    fn load_current_policy(
        &self,
        tenant_id: &TenantId,
        persona_id: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load_current_policy(tenant_id, persona_id)
    }
}

/// Eligibility store whose every read fails.
pub struct UnreachableStore;

impl EligibilityStore for UnreachableStore {
    fn load_user(&self, _: &TenantId, _: &UserId) -> Result<Option<UserRecord>, StoreError> {
        Err(StoreError::Io("connection refused".to_string()))
    }

    fn load_binding(
        &self,
        _: &TenantId,
        _: &BindingScope,
        _: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, StoreError> {
        Err(StoreError::Io("connection refused".to_string()))
    }

    fn load_current_policy(
        &self,
        _: &TenantId,
        _: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, StoreError> {
        Err(StoreError::Io("connection refused".to_string()))
    }
}
