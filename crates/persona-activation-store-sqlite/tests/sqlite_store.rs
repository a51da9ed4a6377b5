// persona-activation-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite eligibility and audit behavior.
// Purpose: Ensure durable persistence and fail-closed integrity checks.
// Dependencies: persona-activation-store-sqlite, persona-activation-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed activation store. Exercises
//! eligibility reads, current-policy handling, append-only audit semantics,
//! tampering detection, schema versioning, and an end-to-end resolver run.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;

use persona_activation_core::ActivationResolver;
use persona_activation_core::AuditId;
use persona_activation_core::AuditStore;
use persona_activation_core::BindingId;
use persona_activation_core::BindingScope;
use persona_activation_core::EligibilityStore;
use persona_activation_core::EligibilityWriter;
use persona_activation_core::PersonaId;
use persona_activation_core::PersonaPolicy;
use persona_activation_core::PolicyStatus;
use persona_activation_core::ReasonCode;
use persona_activation_core::ReplayOutcome;
use persona_activation_core::ResolveRequest;
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
use persona_activation_store_sqlite::SqliteActivationStore;
use persona_activation_store_sqlite::SqliteStoreConfig;
use persona_activation_store_sqlite::SqliteStoreError;
use persona_activation_store_sqlite::SqliteStoreMode;
use persona_activation_store_sqlite::SqliteSyncMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn tenant() -> TenantId {
    TenantId::new("tenant-a")
}

fn store_for(path: &Path) -> SqliteActivationStore {
    let config = SqliteStoreConfig {
        path: path.to_path_buf(),
        busy_timeout_ms: 1_000,
        journal_mode: SqliteStoreMode::Wal,
        sync_mode: SqliteSyncMode::Full,
    };
    SqliteActivationStore::new(&config).expect("store init")
}

fn user(user_id: &str, user_type: UserType, workspace: Option<&str>) -> UserRecord {
    UserRecord {
        tenant_id: tenant(),
        user_id: UserId::new(user_id),
        user_type,
        enterprise_id: None,
        workspace_id: workspace.map(WorkspaceId::new),
        is_demo: true,
    }
}

fn binding(binding_id: &str, user_id: &str, persona_id: &str, at: u64) -> WorkspaceBinding {
    WorkspaceBinding {
        binding_id: BindingId::new(binding_id),
        tenant_id: tenant(),
        user_id: UserId::new(user_id),
        workspace_id: WorkspaceId::new("ws-1"),
        persona_id: PersonaId::new(persona_id),
        stack_status: StackStatus::Ready,
        blockers: vec!["none".to_string()],
        updated_at: Timestamp::Logical(at),
    }
}

fn policy(persona_id: &str, version: u32, status: PolicyStatus) -> PersonaPolicy {
    PersonaPolicy {
        tenant_id: tenant(),
        persona_id: PersonaId::new(persona_id),
        version,
        status,
        is_current: true,
        activated_at: None,
        updated_at: Timestamp::UnixMillis(1_700_000_000_000),
    }
}

fn seeded(path: &Path) -> SqliteActivationStore {
    let store = store_for(path);
    store.upsert_user(&user("u1", UserType::Individual, None)).unwrap();
    store.upsert_binding(&binding("b1", "u1", "p1", 10)).unwrap();
    store.upsert_policy(&policy("p1", 1, PolicyStatus::Active)).unwrap();
    store
}

fn resolver(
    store: &SqliteActivationStore,
) -> ActivationResolver<SqliteActivationStore, SqliteActivationStore> {
    ActivationResolver::new(
        store.clone(),
        store.clone(),
        Arc::new(SequentialAuditIdSource::new("audit-")),
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn eligibility_rows_roundtrip() {
    let temp = TempDir::new().unwrap();
    let store = seeded(&temp.path().join("store.sqlite"));
    let loaded = store.load_user(&tenant(), &UserId::new("u1")).unwrap().unwrap();
    assert_eq!(loaded, user("u1", UserType::Individual, None));

    let scope = BindingScope::User(UserId::new("u1"));
    let loaded = store.load_binding(&tenant(), &scope, None).unwrap().unwrap();
    assert_eq!(loaded, binding("b1", "u1", "p1", 10));

    let current = store.load_current_policy(&tenant(), &PersonaId::new("p1")).unwrap().unwrap();
    assert_eq!(current, policy("p1", 1, PolicyStatus::Active));
}

#[test]
fn reads_are_tenant_scoped() {
    let temp = TempDir::new().unwrap();
    let store = seeded(&temp.path().join("store.sqlite"));
    let other = TenantId::new("tenant-b");
    assert!(store.load_user(&other, &UserId::new("u1")).unwrap().is_none());
    let scope = BindingScope::User(UserId::new("u1"));
    assert!(store.load_binding(&other, &scope, None).unwrap().is_none());
    assert!(store.load_current_policy(&other, &PersonaId::new("p1")).unwrap().is_none());
}

#[test]
fn binding_selection_prefers_latest_and_filters_persona() {
    let temp = TempDir::new().unwrap();
    let store = seeded(&temp.path().join("store.sqlite"));
    store.upsert_binding(&binding("b2", "u1", "p2", 20)).unwrap();
    let scope = BindingScope::User(UserId::new("u1"));
    let latest = store.load_binding(&tenant(), &scope, None).unwrap().unwrap();
    assert_eq!(latest.binding_id.as_str(), "b2");
    let p1 = store.load_binding(&tenant(), &scope, Some(&PersonaId::new("p1"))).unwrap().unwrap();
    assert_eq!(p1.binding_id.as_str(), "b1");

    let workspace = BindingScope::Workspace(WorkspaceId::new("ws-1"));
    assert!(store.load_binding(&tenant(), &workspace, None).unwrap().is_some());
}

#[test]
fn new_current_policy_demotes_previous() {
    let temp = TempDir::new().unwrap();
    let store = seeded(&temp.path().join("store.sqlite"));
    store.upsert_policy(&policy("p1", 2, PolicyStatus::Draft)).unwrap();
    let current = store.load_current_policy(&tenant(), &PersonaId::new("p1")).unwrap().unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.status, PolicyStatus::Draft);
}

#[test]
fn resolve_and_replay_persist_across_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let context = ResolverContext::new(tenant(), Timestamp::UnixMillis(1_700_000_000_500));
    let decision = {
        let store = seeded(&path);
        resolver(&store)
            .resolve_activation(&context, &ResolveRequest::new(UserId::new("u1"), None))
            .unwrap()
    };
    assert_eq!(decision.reason_code, ReasonCode::Activated);

    let reopened = store_for(&path);
    let outcome = resolver(&reopened).replay_resolver_decision(&context, &decision.audit_id).unwrap();
    let ReplayOutcome::Found(replayed) = outcome else {
        panic!("expected replayed decision");
    };
    assert!(replayed.replay);
    assert_eq!(replayed.decision, decision);
}

#[test]
fn duplicate_audit_ids_conflict() {
    let temp = TempDir::new().unwrap();
    let store = seeded(&temp.path().join("store.sqlite"));
    let context = ResolverContext::new(tenant(), Timestamp::Logical(1));
    let decision = resolver(&store)
        .resolve_activation(&context, &ResolveRequest::new(UserId::new("u1"), None))
        .unwrap();
    let record = store.load(&tenant(), &decision.audit_id).unwrap().unwrap();
    assert!(matches!(store.append(&record), Err(StoreError::Conflict(_))));
}

#[test]
fn audit_history_newest_first() {
    let temp = TempDir::new().unwrap();
    let store = seeded(&temp.path().join("store.sqlite"));
    let resolver = resolver(&store);
    let mut ids = Vec::new();
    for at in 1..=3 {
        let context = ResolverContext::new(tenant(), Timestamp::Logical(at));
        ids.push(
            resolver
                .resolve_activation(&context, &ResolveRequest::new(UserId::new("u1"), None))
                .unwrap()
                .audit_id,
        );
    }
    let listed: Vec<AuditId> = store
        .list_for_user(&tenant(), &UserId::new("u1"), 2)
        .unwrap()
        .into_iter()
        .map(|record| record.audit_id)
        .collect();
    assert_eq!(listed, vec![ids[2].clone(), ids[1].clone()]);
}

#[test]
fn tampered_audit_record_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = seeded(&path);
    let context = ResolverContext::new(tenant(), Timestamp::Logical(1));
    let decision = resolver(&store)
        .resolve_activation(&context, &ResolveRequest::new(UserId::new("u1"), None))
        .unwrap();

    let connection = rusqlite::Connection::open(&path).unwrap();
    let json: Vec<u8> = connection
        .query_row(
            "SELECT record_json FROM audit_records WHERE audit_id = ?1",
            [decision.audit_id.as_str()],
            |row| row.get(0),
        )
        .unwrap();
    let tampered = String::from_utf8(json).unwrap().replace("\"activated\":true", "\"activated\":false");
    connection
        .execute(
            "UPDATE audit_records SET record_json = ?1 WHERE audit_id = ?2",
            rusqlite::params![tampered.into_bytes(), decision.audit_id.as_str()],
        )
        .unwrap();

    let result = store.load(&tenant(), &decision.audit_id);
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[test]
fn unknown_schema_version_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    drop(store_for(&path));
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);

    let config = SqliteStoreConfig::for_path(&path);
    let result = SqliteActivationStore::new(&config);
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

#[test]
fn directory_path_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = SqliteStoreConfig::for_path(temp.path());
    assert!(matches!(SqliteActivationStore::new(&config), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn corrupt_enum_column_fails_closed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = seeded(&path);
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE users SET user_type = 'robot'", []).unwrap();
    drop(connection);
    let result = store.load_user(&tenant(), &UserId::new("u1"));
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}
