// persona-activation-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end tests for resolve, replay, audit, and policy routes.
// Purpose: Validate response shapes and error codes over a live listener.
// Dependencies: persona-activation-server, reqwest, tokio
// ============================================================================

//! HTTP route tests against a loopback server in local-only mode.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions use unwrap for clarity."
)]

mod common;

use std::sync::Arc;

use persona_activation_core::InMemoryActivationStore;
use persona_activation_server::FileAccessLog;
use serde_json::Value;

use crate::common::local_config;
use crate::common::local_store;
use crate::common::seed_tenant;
use crate::common::spawn;
use crate::common::spawn_with_log;

const RESOLVE: &str = "/v1/activation/resolve";

// ============================================================================
// SECTION: Resolve
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn resolve_reference_scenarios() {
    let server = spawn(local_config(), &local_store()).await;

    let u1 = server.post(RESOLVE, r#"{"user_id":"u1"}"#, None).await;
    assert_eq!(u1.status, 200);
    assert_eq!(u1.body["activated"], false);
    assert_eq!(u1.body["reason_code"], "NO_BINDING");
    assert_eq!(u1.body["user_type"], "individual");

    let u2 = server.post(RESOLVE, r#"{"user_id":"u2"}"#, None).await;
    assert_eq!(u2.body["reason_code"], "STACK_NOT_READY");
    assert_eq!(u2.body["stack_status"], "provisioning");
    assert_eq!(u2.body["blockers"], serde_json::json!(["missing_signals"]));

    let u3 = server.post(RESOLVE, r#"{"user_id":"u3"}"#, None).await;
    assert_eq!(u3.body["activated"], false);
    assert_eq!(u3.body["reason_code"], "POLICY_NOT_ACTIVE");
    assert_eq!(u3.body["persona_id"], "p1");

    let u4 = server.post(RESOLVE, r#"{"user_id":"u4"}"#, None).await;
    assert_eq!(u4.status, 200);
    assert_eq!(u4.body["activated"], true);
    assert_eq!(u4.body["reason_code"], "ACTIVATED");
    assert_eq!(u4.body["binding_id"], "b-u4");
    assert_eq!(u4.body["workspace_id"], "ws-u4");
    assert_eq!(u4.body["audit_id"], "aud-4");
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_unknown_user_is_a_decision_not_an_error() {
    let server = spawn(local_config(), &local_store()).await;
    let reply = server.post(RESOLVE, r#"{"user_id":"ghost"}"#, None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["activated"], false);
    assert_eq!(reply.body["reason_code"], "USER_NOT_FOUND");
    assert!(reply.body["audit_id"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_requires_user_id_and_writes_no_audit() {
    let store = local_store();
    let server = spawn(local_config(), &store).await;

    let missing = server.post(RESOLVE, "{}", None).await;
    assert_eq!(missing.status, 400);
    assert_eq!(missing.body["error"], "MISSING_USER_ID");

    let blank = server.post(RESOLVE, r#"{"user_id":"   "}"#, None).await;
    assert_eq!(blank.status, 400);
    assert_eq!(blank.body["error"], "MISSING_USER_ID");

    assert_eq!(store.audit_len().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_rejects_tenant_in_body() {
    let store = local_store();
    seed_tenant(&store, "tenant-b");
    let server = spawn(local_config(), &store).await;
    let reply = server.post(RESOLVE, r#"{"user_id":"u4","tenant_id":"tenant-b"}"#, None).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "INVALID_REQUEST");
    assert_eq!(store.audit_len().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_rejects_malformed_and_oversized_bodies() {
    let mut config = local_config();
    config.server.max_body_bytes = 64;
    let server = spawn(config, &local_store()).await;

    let malformed = server.post(RESOLVE, "{not json", None).await;
    assert_eq!(malformed.status, 400);
    assert_eq!(malformed.body["error"], "INVALID_REQUEST");

    let padding = "x".repeat(128);
    let oversized = server.post(RESOLVE, &format!(r#"{{"user_id":"{padding}"}}"#), None).await;
    assert_eq!(oversized.status, 413);
    assert_eq!(oversized.body["error"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test(flavor = "multi_thread")]
async fn resolve_honors_requested_persona() {
    let server = spawn(local_config(), &local_store()).await;
    let reply = server.post(RESOLVE, r#"{"user_id":"u4","persona_id":"p1"}"#, None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["activated"], false);
    assert_eq!(reply.body["reason_code"], "NO_BINDING");
}

// ============================================================================
// SECTION: Replay
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn replay_returns_the_recorded_decision() {
    let server = spawn(local_config(), &local_store()).await;
    let original = server.post(RESOLVE, r#"{"user_id":"u4"}"#, None).await;
    let audit_id = original.body["audit_id"].as_str().unwrap().to_string();

    let replayed = server.get(&format!("/v1/activation/replay?audit_id={audit_id}"), None).await;
    assert_eq!(replayed.status, 200);
    assert_eq!(replayed.body["replay"], true);

    let mut stripped = replayed.body.clone();
    stripped.as_object_mut().unwrap().remove("replay");
    assert_eq!(stripped, original.body);
}

#[tokio::test(flavor = "multi_thread")]
async fn replay_does_not_reresolve_after_data_changes() {
    let store = local_store();
    let server = spawn(local_config(), &store).await;
    let original = server.post(RESOLVE, r#"{"user_id":"u3"}"#, None).await;
    assert_eq!(original.body["activated"], false);

    let promoted =
        server.post("/v1/personas/p1/policy/transition", r#"{"to":"active"}"#, None).await;
    assert_eq!(promoted.status, 200);
    let now = server.post(RESOLVE, r#"{"user_id":"u3"}"#, None).await;
    assert_eq!(now.body["activated"], true);

    let audit_id = original.body["audit_id"].as_str().unwrap();
    let replayed = server.get(&format!("/v1/activation/replay?audit_id={audit_id}"), None).await;
    assert_eq!(replayed.body["activated"], false);
    assert_eq!(replayed.body["reason_code"], "POLICY_NOT_ACTIVE");
}

#[tokio::test(flavor = "multi_thread")]
async fn replay_error_codes() {
    let server = spawn(local_config(), &local_store()).await;

    let unknown = server.get("/v1/activation/replay?audit_id=nonexistent-id", None).await;
    assert_eq!(unknown.status, 404);
    assert_eq!(unknown.body["error"], "AUDIT_NOT_FOUND");

    let missing = server.get("/v1/activation/replay", None).await;
    assert_eq!(missing.status, 400);
    assert_eq!(missing.body["error"], "MISSING_AUDIT_ID");

    let blank = server.get("/v1/activation/replay?audit_id=", None).await;
    assert_eq!(blank.status, 400);
    assert_eq!(blank.body["error"], "MISSING_AUDIT_ID");
}

// ============================================================================
// SECTION: Audit History
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn audit_history_lists_newest_first_with_limit() {
    let server = spawn(local_config(), &local_store()).await;
    for _ in 0..3 {
        let reply = server.post(RESOLVE, r#"{"user_id":"u2"}"#, None).await;
        assert_eq!(reply.status, 200);
    }
    server.post(RESOLVE, r#"{"user_id":"u4"}"#, None).await;

    let all = server.get("/v1/activation/audit?user_id=u2", None).await;
    assert_eq!(all.status, 200);
    assert_eq!(all.body["user_id"], "u2");
    let records = all.body["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["audit_id"], "aud-3");
    assert_eq!(records[0]["actor"], "loopback");

    let limited = server.get("/v1/activation/audit?user_id=u2&limit=1", None).await;
    assert_eq!(limited.body["records"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn audit_history_validates_input() {
    let server = spawn(local_config(), &local_store()).await;

    let missing = server.get("/v1/activation/audit", None).await;
    assert_eq!(missing.status, 400);
    assert_eq!(missing.body["error"], "MISSING_USER_ID");

    let zero = server.get("/v1/activation/audit?user_id=u1&limit=0", None).await;
    assert_eq!(zero.status, 400);
    assert_eq!(zero.body["error"], "INVALID_LIMIT");

    let huge = server.get("/v1/activation/audit?user_id=u1&limit=1000", None).await;
    assert_eq!(huge.body["error"], "INVALID_LIMIT");

    let empty = server.get("/v1/activation/audit?user_id=nobody", None).await;
    assert_eq!(empty.status, 200);
    assert_eq!(empty.body["records"], Value::Array(Vec::new()));
}

// ============================================================================
// SECTION: Policy Transitions
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn policy_transition_outcomes() {
    let server = spawn(local_config(), &local_store()).await;

    let promoted =
        server.post("/v1/personas/p1/policy/transition", r#"{"to":"ACTIVE"}"#, None).await;
    assert_eq!(promoted.status, 200);
    assert_eq!(promoted.body["previous_status"], "STAGED");
    assert_eq!(promoted.body["path"], "promote_staged");
    assert_eq!(promoted.body["policy"]["status"], "ACTIVE");

    let backwards =
        server.post("/v1/personas/p1/policy/transition", r#"{"to":"staged"}"#, None).await;
    assert_eq!(backwards.status, 409);
    assert_eq!(backwards.body["error"], "ILLEGAL_TRANSITION");

    let missing =
        server.post("/v1/personas/p9/policy/transition", r#"{"to":"active"}"#, None).await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body["error"], "POLICY_NOT_FOUND");

    let unknown =
        server.post("/v1/personas/p2/policy/transition", r#"{"to":"retired"}"#, None).await;
    assert_eq!(unknown.status, 400);
    assert_eq!(unknown.body["error"], "INVALID_POLICY_STATUS");

    let deprecated =
        server.post("/v1/personas/p2/policy/transition", r#"{"to":"deprecated"}"#, None).await;
    assert_eq!(deprecated.status, 200);
    assert_eq!(deprecated.body["path"], "deprecate");
}

// ============================================================================
// SECTION: Health and Logging
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn healthz_reports_ok() {
    let server = spawn(local_config(), &InMemoryActivationStore::new()).await;
    let reply = server.get("/healthz", None).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["status"], "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn access_log_records_requests_without_bodies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.jsonl");
    let sink = Arc::new(FileAccessLog::new(&path).unwrap());
    let server = spawn_with_log(local_config(), &local_store(), sink).await;

    let reply = server
        .client
        .post(server.url(RESOLVE))
        .header("x-request-id", "req-42")
        .body(r#"{"user_id":"u4"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(reply.status().as_u16(), 200);

    let content = std::fs::read_to_string(&path).unwrap();
    let events: Vec<Value> =
        content.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    let authz = events.iter().find(|event| event["event"] == "authz").unwrap();
    assert_eq!(authz["decision"], "allow");
    assert_eq!(authz["action"], "activation.resolve");
    let request = events.iter().find(|event| event["event"] == "http_request").unwrap();
    assert_eq!(request["status"], 200);
    assert_eq!(request["request_id"], "req-42");
    assert_eq!(request["reason_code"], "ACTIVATED");
    assert_eq!(request["tenant_id"], "local");
    assert!(!content.contains("\"user_id\""));

    let history = server.get("/v1/activation/audit?user_id=u4", None).await;
    assert_eq!(history.body["records"][0]["request_id"], "req-42");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_query_strings_keep_json_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("access.jsonl");
    let sink = Arc::new(FileAccessLog::new(&path).unwrap());
    let server = spawn_with_log(local_config(), &local_store(), sink).await;

    let replay = server.get("/v1/activation/replay?audit_id=a&audit_id=b", None).await;
    assert_eq!(replay.status, 400);
    assert_eq!(replay.body["error"], "INVALID_REQUEST");

    let audit = server.get("/v1/activation/audit?user_id=u1&user_id=u2", None).await;
    assert_eq!(audit.status, 400);
    assert_eq!(audit.body["error"], "INVALID_REQUEST");

    let content = std::fs::read_to_string(&path).unwrap();
    let logged: Vec<Value> = content
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap())
        .filter(|event| event["event"] == "http_request")
        .collect();
    assert_eq!(logged.len(), 2);
    assert!(logged.iter().all(|event| event["error_code"] == "INVALID_REQUEST"));
}
