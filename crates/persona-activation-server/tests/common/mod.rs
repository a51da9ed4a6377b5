// persona-activation-server/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Seeded stores and a loopback HTTP harness for server tests.
// Purpose: Run the real axum stack against deterministic fixtures.
// Dependencies: persona-activation-core, persona-activation-server, reqwest
// ============================================================================

//! ## Overview
//! Each test spawns an [`ActivationServer`] on an ephemeral loopback port and
//! talks to it over HTTP. Audit ids are sequential so assertions are stable.

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    reason = "Fixtures fail fast on setup errors."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use persona_activation_config::ActivationConfig;
use persona_activation_config::PrincipalConfig;
use persona_activation_config::ServerAuthConfig;
use persona_activation_config::ServerAuthMode;
use persona_activation_core::BindingId;
use persona_activation_core::EligibilityWriter;
use persona_activation_core::InMemoryActivationStore;
use persona_activation_core::PersonaId;
use persona_activation_core::PersonaPolicy;
use persona_activation_core::PolicyStatus;
use persona_activation_core::SequentialAuditIdSource;
use persona_activation_core::StackStatus;
use persona_activation_core::TenantId;
use persona_activation_core::Timestamp;
use persona_activation_core::UserId;
use persona_activation_core::UserRecord;
use persona_activation_core::UserType;
use persona_activation_core::WorkspaceBinding;
use persona_activation_core::WorkspaceId;
use persona_activation_server::AccessLogSink;
use persona_activation_server::ActivationServer;
use persona_activation_server::ActivationService;
use persona_activation_server::NoopAccessLog;
use persona_activation_server::StoreHandles;
use serde_json::Value;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result type for tests that report failures as strings.
pub type TestResult = Result<(), String>;

/// Decoded HTTP response.
#[derive(Debug)]
pub struct HttpReply {
    /// Status code.
    pub status: u16,
    /// JSON body, or `Null` when the body is not JSON.
    pub body: Value,
}

/// Running server handle.
pub struct TestServer {
    /// Base URL such as `http://127.0.0.1:PORT`.
    pub base_url: String,
    /// Shared HTTP client.
    pub client: reqwest::Client,
}

impl TestServer {
    /// Full URL for a path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Sends a JSON POST.
    pub async fn post(&self, path: &str, body: &str, token: Option<&str>) -> HttpReply {
        let mut request = self
            .client
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body.to_string());
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        decode(request.send().await.expect("send post")).await
    }

    /// Sends a GET.
    pub async fn get(&self, path: &str, token: Option<&str>) -> HttpReply {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        decode(request.send().await.expect("send get")).await
    }
}

/// Reads a response into an [`HttpReply`].
async fn decode(response: reqwest::Response) -> HttpReply {
    let status = response.status().as_u16();
    let text = response.text().await.expect("read body");
    HttpReply {
        status,
        body: serde_json::from_str(&text).unwrap_or(Value::Null),
    }
}

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Tenant assigned to loopback callers in local-only mode.
pub const LOCAL_TENANT: &str = "local";

/// Builds an individual user row.
pub fn individual(tenant: &str, user_id: &str) -> UserRecord {
    UserRecord {
        tenant_id: TenantId::new(tenant),
        user_id: UserId::new(user_id),
        user_type: UserType::Individual,
        enterprise_id: None,
        workspace_id: None,
        is_demo: false,
    }
}

/// Builds a binding row.
pub fn binding(
    tenant: &str,
    user_id: &str,
    persona_id: &str,
    stack_status: StackStatus,
    blockers: &[&str],
) -> WorkspaceBinding {
    WorkspaceBinding {
        binding_id: BindingId::new(format!("b-{user_id}")),
        tenant_id: TenantId::new(tenant),
        user_id: UserId::new(user_id),
        workspace_id: WorkspaceId::new(format!("ws-{user_id}")),
        persona_id: PersonaId::new(persona_id),
        stack_status,
        blockers: blockers.iter().map(|blocker| (*blocker).to_string()).collect(),
        updated_at: Timestamp::Logical(10),
    }
}

/// Builds a current policy row.
pub fn policy(tenant: &str, persona_id: &str, status: PolicyStatus) -> PersonaPolicy {
    PersonaPolicy {
        tenant_id: TenantId::new(tenant),
        persona_id: PersonaId::new(persona_id),
        version: 1,
        status,
        is_current: true,
        activated_at: (status == PolicyStatus::Active).then_some(Timestamp::Logical(1)),
        updated_at: Timestamp::Logical(1),
    }
}

/// Seeds the four reference users into `tenant`:
/// `u1` has no binding, `u2` is provisioning, `u3` is bound to staged `p1`,
/// and `u4` is bound to active `p2`.
pub fn seed_tenant(store: &InMemoryActivationStore, tenant: &str) {
    for user in ["u1", "u2", "u3", "u4"] {
        store.upsert_user(&individual(tenant, user)).expect("seed user");
    }
    store
        .upsert_binding(&binding(tenant, "u2", "p2", StackStatus::Provisioning, &[
            "missing_signals",
        ]))
        .expect("seed u2");
    store.upsert_binding(&binding(tenant, "u3", "p1", StackStatus::Ready, &[])).expect("seed u3");
    store.upsert_binding(&binding(tenant, "u4", "p2", StackStatus::Ready, &[])).expect("seed u4");
    store.upsert_policy(&policy(tenant, "p1", PolicyStatus::Staged)).expect("seed p1");
    store.upsert_policy(&policy(tenant, "p2", PolicyStatus::Active)).expect("seed p2");
}

/// Store seeded in the local tenant.
pub fn local_store() -> InMemoryActivationStore {
    let store = InMemoryActivationStore::new();
    seed_tenant(&store, LOCAL_TENANT);
    store
}

/// Default local-only configuration.
pub fn local_config() -> ActivationConfig {
    ActivationConfig::default()
}

/// Builds a bearer principal.
pub fn principal(token: &str, tenant: &str, roles: &[&str]) -> PrincipalConfig {
    PrincipalConfig {
        token: token.to_string(),
        subject: format!("subject-{token}"),
        tenant_id: TenantId::new(tenant),
        roles: roles.iter().map(|role| (*role).to_string()).collect(),
    }
}

/// Configuration requiring bearer tokens.
pub fn bearer_config(principals: Vec<PrincipalConfig>) -> ActivationConfig {
    let mut config = ActivationConfig::default();
    config.server.auth = Some(ServerAuthConfig {
        mode: ServerAuthMode::BearerToken,
        principals,
    });
    config
}

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Spawns a server over `store` with a no-op access log.
pub async fn spawn(config: ActivationConfig, store: &InMemoryActivationStore) -> TestServer {
    spawn_with_log(config, store, Arc::new(NoopAccessLog)).await
}

/// Spawns a server over `store` with an explicit access log sink.
pub async fn spawn_with_log(
    config: ActivationConfig,
    store: &InMemoryActivationStore,
    access_log: Arc<dyn AccessLogSink>,
) -> TestServer {
    let service = ActivationService::with_audit_ids(
        StoreHandles::from_memory(store),
        config.transition_rules(),
        Arc::new(SequentialAuditIdSource::new("aud-")),
    );
    let server = ActivationServer::with_service(config, service, access_log).expect("server");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr: SocketAddr = listener.local_addr().expect("local addr");
    tokio::spawn(server.serve_listener(listener));
    TestServer {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
    }
}
