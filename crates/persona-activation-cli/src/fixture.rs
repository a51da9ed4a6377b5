// persona-activation-cli/src/fixture.rs
// ============================================================================
// Module: Eligibility Fixtures
// Description: JSON fixture model for seeding users, bindings, and policies.
// Purpose: Load operator-supplied eligibility rows into a store.
// Dependencies: persona-activation-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A fixture is a JSON document with `users`, `bindings`, and `policies`
//! arrays using the core row shapes. Rows are validated as a whole before any
//! write, then applied in dependency order through an [`EligibilityWriter`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use persona_activation_core::EligibilityWriter;
use persona_activation_core::PersonaPolicy;
use persona_activation_core::StoreError;
use persona_activation_core::TenantId;
use persona_activation_core::UserRecord;
use persona_activation_core::WorkspaceBinding;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Eligibility rows to seed.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fixture {
    /// User rows.
    #[serde(default)]
    pub users: Vec<UserRecord>,
    /// Workspace binding rows.
    #[serde(default)]
    pub bindings: Vec<WorkspaceBinding>,
    /// Persona policy rows.
    #[serde(default)]
    pub policies: Vec<PersonaPolicy>,
}

/// Row counts written by [`Fixture::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    /// Users written.
    pub users: usize,
    /// Bindings written.
    pub bindings: usize,
    /// Policies written.
    pub policies: usize,
}

/// Fixture failures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The document is not a valid fixture.
    #[error("invalid fixture json: {0}")]
    Parse(String),
    /// A row failed validation.
    #[error("{0}")]
    Invalid(String),
    /// The store rejected a write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Loading
// ============================================================================

impl Fixture {
    /// Parses a fixture document.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Parse`] when the JSON does not match the
    /// fixture shape.
    pub fn from_json(bytes: &[u8]) -> Result<Self, FixtureError> {
        serde_json::from_slice(bytes).map_err(|err| FixtureError::Parse(err.to_string()))
    }

    /// Validates identifiers, policy versions, and the one-current-policy rule.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Invalid`] naming the first offending row.
    pub fn validate(&self) -> Result<(), FixtureError> {
        for (index, user) in self.users.iter().enumerate() {
            let row = format!("users[{index}]");
            check_id(&row, "tenant_id", user.tenant_id.as_str())?;
            check_id(&row, "user_id", user.user_id.as_str())?;
            if let Some(enterprise_id) = &user.enterprise_id {
                check_id(&row, "enterprise_id", enterprise_id.as_str())?;
            }
            if let Some(workspace_id) = &user.workspace_id {
                check_id(&row, "workspace_id", workspace_id.as_str())?;
            }
        }
        for (index, binding) in self.bindings.iter().enumerate() {
            let row = format!("bindings[{index}]");
            check_id(&row, "tenant_id", binding.tenant_id.as_str())?;
            check_id(&row, "binding_id", binding.binding_id.as_str())?;
            check_id(&row, "user_id", binding.user_id.as_str())?;
            check_id(&row, "workspace_id", binding.workspace_id.as_str())?;
            check_id(&row, "persona_id", binding.persona_id.as_str())?;
        }
        let mut current = BTreeSet::new();
        for (index, policy) in self.policies.iter().enumerate() {
            let row = format!("policies[{index}]");
            check_id(&row, "tenant_id", policy.tenant_id.as_str())?;
            check_id(&row, "persona_id", policy.persona_id.as_str())?;
            if policy.version == 0 {
                return Err(FixtureError::Invalid(format!("{row}: version must be at least 1")));
            }
            if policy.is_current
                && !current.insert((policy.tenant_id.clone(), policy.persona_id.clone()))
            {
                return Err(FixtureError::Invalid(format!(
                    "{row}: persona {} has more than one current policy",
                    policy.persona_id
                )));
            }
        }
        Ok(())
    }

    /// Validates and writes every row: users, then bindings, then policies.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when validation fails or a write is rejected.
    /// Rows written before a store failure are not rolled back.
    pub fn apply<W: EligibilityWriter + ?Sized>(
        &self,
        writer: &W,
    ) -> Result<SeedSummary, FixtureError> {
        self.validate()?;
        for user in &self.users {
            writer.upsert_user(user)?;
        }
        for binding in &self.bindings {
            writer.upsert_binding(binding)?;
        }
        for policy in &self.policies {
            writer.upsert_policy(policy)?;
        }
        Ok(SeedSummary {
            users: self.users.len(),
            bindings: self.bindings.len(),
            policies: self.policies.len(),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Re-applies boundary validation to a deserialized identifier. Every
/// identifier type shares one rule set, and stored values must already be
/// trimmed.
fn check_id(row: &str, field: &'static str, raw: &str) -> Result<(), FixtureError> {
    let parsed = TenantId::parse(field, raw)
        .map_err(|err| FixtureError::Invalid(format!("{row}: {err}")))?;
    if parsed.as_str() != raw {
        return Err(FixtureError::Invalid(format!("{row}: {field} has surrounding whitespace")));
    }
    Ok(())
}
