// persona-activation-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for persona-activation-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use persona_activation_config::ActivationConfig;
use persona_activation_config::ConfigError;
use persona_activation_config::PrincipalConfig;
use persona_activation_config::ServerAuthConfig;
use persona_activation_config::ServerAuthMode;
use persona_activation_core::TenantId;

pub type TestResult = Result<(), String>;

/// Parses a TOML string into an `ActivationConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<ActivationConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ActivationConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a bearer principal for the given token and tenant.
pub fn principal(token: &str, tenant: &str, roles: &[&str]) -> PrincipalConfig {
    PrincipalConfig {
        token: token.to_string(),
        subject: format!("subject-{token}"),
        tenant_id: TenantId::new(tenant),
        roles: roles.iter().map(|role| (*role).to_string()).collect(),
    }
}

/// Returns a bearer auth section with the given principals.
pub fn bearer_auth(principals: Vec<PrincipalConfig>) -> ServerAuthConfig {
    ServerAuthConfig {
        mode: ServerAuthMode::BearerToken,
        principals,
    }
}

/// Asserts that a validation result is an error containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error '{message}' did not contain '{needle}'"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
