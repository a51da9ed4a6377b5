// persona-activation-core/src/core/policy.rs
// ============================================================================
// Module: Persona Policy Lifecycle
// Description: Versioned persona policies and their checked status transitions.
// Purpose: Reject illegal lifecycle moves instead of comparing free-form strings.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A persona policy moves forward through `DRAFT → STAGED → ACTIVE →
//! DEPRECATED`. The transition table is:
//!
//! | from      | to         | path                 |
//! |-----------|------------|----------------------|
//! | DRAFT     | STAGED     | `Stage`              |
//! | STAGED    | ACTIVE     | `PromoteStaged`      |
//! | DRAFT     | ACTIVE     | `DirectFromDraft`    |
//! | non-final | DEPRECATED | `Deprecate`          |
//!
//! `DirectFromDraft` skips staging. It stays available because simpler flows
//! rely on it, but [`TransitionRules::allow_direct_activation`] can turn it
//! off. `DEPRECATED` is terminal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::PersonaId;
use crate::core::identifiers::TenantId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of a persona policy version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    /// Being authored.
    #[serde(alias = "draft")]
    Draft,
    /// Staged for rollout.
    #[serde(alias = "staged")]
    Staged,
    /// Live.
    #[serde(alias = "active")]
    Active,
    /// Retired. Terminal.
    #[serde(alias = "deprecated")]
    Deprecated,
}

impl PolicyStatus {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Staged => "STAGED",
            Self::Active => "ACTIVE",
            Self::Deprecated => "DEPRECATED",
        }
    }

    /// Parses a label case-insensitively.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "STAGED" => Some(Self::Staged),
            "ACTIVE" => Some(Self::Active),
            "DEPRECATED" => Some(Self::Deprecated),
            _ => None,
        }
    }

    /// Returns true when no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deprecated)
    }

    /// Checks a transition against the lifecycle table.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyTransitionError`] for self-transitions, moves out of
    /// `DEPRECATED`, backward moves, and direct activation when disabled.
    pub fn transition(
        self,
        to: Self,
        rules: TransitionRules,
    ) -> Result<TransitionPath, PolicyTransitionError> {
        match (self, to) {
            (Self::Deprecated, _) => Err(PolicyTransitionError::Terminal {
                to,
            }),
            (from, target) if from == target => Err(PolicyTransitionError::Unchanged {
                status: from,
            }),
            (Self::Draft, Self::Staged) => Ok(TransitionPath::Stage),
            (Self::Staged, Self::Active) => Ok(TransitionPath::PromoteStaged),
            (Self::Draft, Self::Active) => {
                if rules.allow_direct_activation {
                    Ok(TransitionPath::DirectFromDraft)
                } else {
                    Err(PolicyTransitionError::DirectActivationDisabled)
                }
            }
            (_, Self::Deprecated) => Ok(TransitionPath::Deprecate),
            (from, to) => Err(PolicyTransitionError::Backward {
                from,
                to,
            }),
        }
    }
}

impl fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path taken by an accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPath {
    /// `DRAFT → STAGED`.
    Stage,
    /// `STAGED → ACTIVE`.
    PromoteStaged,
    /// `DRAFT → ACTIVE`, skipping staging.
    DirectFromDraft,
    /// Any non-terminal status to `DEPRECATED`.
    Deprecate,
}

/// Host-configurable lifecycle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRules {
    /// Permit `DRAFT → ACTIVE` without staging.
    pub allow_direct_activation: bool,
}

impl Default for TransitionRules {
    fn default() -> Self {
        Self {
            allow_direct_activation: true,
        }
    }
}

/// Rejected lifecycle transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyTransitionError {
    /// Source and target status are the same.
    #[error("policy is already {status}")]
    Unchanged {
        /// Current status.
        status: PolicyStatus,
    },
    /// The policy is deprecated and cannot move.
    #[error("deprecated policies cannot transition to {to}")]
    Terminal {
        /// Requested target.
        to: PolicyStatus,
    },
    /// The move goes backward in the lifecycle.
    #[error("illegal policy transition {from} -> {to}")]
    Backward {
        /// Current status.
        from: PolicyStatus,
        /// Requested target.
        to: PolicyStatus,
    },
    /// `DRAFT → ACTIVE` was requested while disabled.
    #[error("direct activation from DRAFT is disabled; stage the policy first")]
    DirectActivationDisabled,
}

// ============================================================================
// SECTION: Policy Rows
// ============================================================================

/// One version of a persona's policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaPolicy {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Persona this policy governs.
    pub persona_id: PersonaId,
    /// Policy version, starting at 1.
    pub version: u32,
    /// Lifecycle status.
    pub status: PolicyStatus,
    /// Whether this row is the persona's current version.
    pub is_current: bool,
    /// Set when the version became active.
    #[serde(default)]
    pub activated_at: Option<Timestamp>,
    /// Last status change.
    pub updated_at: Timestamp,
}

impl PersonaPolicy {
    /// Returns true when the policy is live.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, PolicyStatus::Active)
    }

    /// Applies a checked transition, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyTransitionError`] when the lifecycle table rejects
    /// the move.
    pub fn transitioned(
        &self,
        to: PolicyStatus,
        rules: TransitionRules,
        at: Timestamp,
    ) -> Result<(Self, TransitionPath), PolicyTransitionError> {
        let path = self.status.transition(to, rules)?;
        let mut next = self.clone();
        next.status = to;
        next.updated_at = at;
        if to == PolicyStatus::Active {
            next.activated_at = Some(at);
        }
        Ok((next, path))
    }
}
