//! Security validation tests for persona-activation-config.
// persona-activation-config/tests/security_validation.rs
// =============================================================================
// Module: Security Validation Tests
// Description: Auth, bind, and tenancy constraints.
// Purpose: Ensure unsafe server exposure and ambiguous principals are rejected.
// =============================================================================

use persona_activation_config::ServerAuthConfig;
use persona_activation_config::ServerAuthMode;

mod common;

use common::TestResult;

#[test]
fn non_loopback_bind_requires_bearer_auth() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "0.0.0.0:8080".to_string();
    common::assert_invalid(config.validate(), "non-loopback bind disallowed")?;
    config.server.auth = Some(common::bearer_auth(vec![common::principal("t1", "tenant-a", &[])]));
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn explicit_local_only_still_rejects_public_bind() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "[::]:8080".to_string();
    config.server.auth = Some(ServerAuthConfig {
        mode: ServerAuthMode::LocalOnly,
        principals: Vec::new(),
    });
    common::assert_invalid(config.validate(), "non-loopback bind disallowed")
}

#[test]
fn invalid_bind_address_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "localhost".to_string();
    common::assert_invalid(config.validate(), "invalid bind address")?;
    config.server.bind = "   ".to_string();
    common::assert_invalid(config.validate(), "server.bind must be non-empty")
}

#[test]
fn bearer_mode_requires_principals() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.auth = Some(common::bearer_auth(Vec::new()));
    common::assert_invalid(config.validate(), "bearer_token auth requires principals")
}

#[test]
fn duplicate_tokens_rejected() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.auth = Some(common::bearer_auth(vec![
        common::principal("same", "tenant-a", &[]),
        common::principal("same", "tenant-b", &[]),
    ]));
    common::assert_invalid(config.validate(), "duplicate auth token")
}

#[test]
fn token_constraints_enforced() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.auth = Some(common::bearer_auth(vec![common::principal(" ", "tenant-a", &[])]));
    common::assert_invalid(config.validate(), "auth token must be non-empty")?;
    config.server.auth =
        Some(common::bearer_auth(vec![common::principal("has space", "tenant-a", &[])]));
    common::assert_invalid(config.validate(), "must not contain whitespace")?;
    let long = "t".repeat(257);
    config.server.auth = Some(common::bearer_auth(vec![common::principal(&long, "tenant-a", &[])]));
    common::assert_invalid(config.validate(), "auth token too long")
}

#[test]
fn principal_tenant_must_be_valid() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.auth = Some(common::bearer_auth(vec![common::principal("t1", "  ", &[])]));
    common::assert_invalid(config.validate(), "auth.principals.tenant_id invalid")
}

#[test]
fn principal_subject_and_roles_checked() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    let mut principal = common::principal("t1", "tenant-a", &[]);
    principal.subject = String::new();
    config.server.auth = Some(common::bearer_auth(vec![principal]));
    common::assert_invalid(config.validate(), "subject must be non-empty")?;
    config.server.auth =
        Some(common::bearer_auth(vec![common::principal("t1", "tenant-a", &[""])]));
    common::assert_invalid(config.validate(), "roles entries must be non-empty")
}

#[test]
fn max_body_bytes_bounds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_body_bytes = 0;
    common::assert_invalid(config.validate(), "max_body_bytes must be greater than zero")?;
    config.server.max_body_bytes = 64 * 1024 * 1024;
    common::assert_invalid(config.validate(), "max_body_bytes exceeds limit")
}

#[test]
fn local_tenant_must_be_valid() -> TestResult {
    let config = common::config_from_toml("[tenancy]\nlocal_tenant_id = \"\"\n")
        .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "tenancy.local_tenant_id invalid")
}

#[test]
fn padded_tenant_ids_rejected() -> TestResult {
    let config = common::config_from_toml("[tenancy]\nlocal_tenant_id = \" acme \"\n")
        .map_err(|err| err.to_string())?;
    common::assert_invalid(config.validate(), "tenancy.local_tenant_id invalid")?;

    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.auth =
        Some(common::bearer_auth(vec![common::principal("t1", "  tenant-a ", &[])]));
    common::assert_invalid(config.validate(), "auth.principals.tenant_id invalid")?;

    config.server.auth = Some(common::bearer_auth(vec![common::principal("t1", "tenant-a", &[])]));
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn access_log_path_must_be_non_empty() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.access_log.path = Some("  ".to_string());
    common::assert_invalid(config.validate(), "access_log.path must be non-empty")
}
