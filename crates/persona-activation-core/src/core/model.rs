// persona-activation-core/src/core/model.rs
// ============================================================================
// Module: Eligibility Data Model
// Description: Users and workspace bindings read by the resolver.
// Purpose: Typed rows for the identity and provisioning collaborators.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The resolver only reads these rows. Users belong to the identity
//! subsystem; bindings are written by provisioning workflows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::BindingId;
use crate::core::identifiers::EnterpriseId;
use crate::core::identifiers::PersonaId;
use crate::core::identifiers::TenantId;
use crate::core::identifiers::UserId;
use crate::core::identifiers::WorkspaceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Users
// ============================================================================

/// Account class of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Member of an enterprise account with a shared workspace.
    Enterprise,
    /// Individual account.
    Individual,
}

impl UserType {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enterprise => "enterprise",
            Self::Individual => "individual",
        }
    }

    /// Parses a canonical label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "enterprise" => Some(Self::Enterprise),
            "individual" => Some(Self::Individual),
            _ => None,
        }
    }
}

/// User row as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// User identifier.
    pub user_id: UserId,
    /// Account class.
    pub user_type: UserType,
    /// Enterprise account, for enterprise users.
    #[serde(default)]
    pub enterprise_id: Option<EnterpriseId>,
    /// Workspace the user belongs to, when assigned.
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    /// Demo account flag.
    #[serde(default)]
    pub is_demo: bool,
}

// ============================================================================
// SECTION: Workspace Bindings
// ============================================================================

/// Readiness of the infrastructure behind a workspace binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    /// Provisioning has not started.
    Pending,
    /// Provisioning is in progress.
    Provisioning,
    /// Stack is ready for activation.
    Ready,
    /// Provisioning is blocked on unmet prerequisites.
    Blocked,
    /// Provisioning failed.
    Failed,
}

impl StackStatus {
    /// Returns true only for [`StackStatus::Ready`].
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Ready => "ready",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
        }
    }

    /// Parses a canonical label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "provisioning" => Some(Self::Provisioning),
            "ready" => Some(Self::Ready),
            "blocked" => Some(Self::Blocked),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association of a user or workspace with a persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceBinding {
    /// Binding identifier.
    pub binding_id: BindingId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// User the binding was created for.
    pub user_id: UserId,
    /// Bound workspace.
    pub workspace_id: WorkspaceId,
    /// Bound persona.
    pub persona_id: PersonaId,
    /// Provisioning status.
    pub stack_status: StackStatus,
    /// Unmet prerequisites reported by provisioning.
    #[serde(default)]
    pub blockers: Vec<String>,
    /// Last provisioning update.
    pub updated_at: Timestamp,
}

/// Which bindings belong to a user.
///
/// Enterprise users with an assigned workspace share the workspace's
/// bindings; every other user only sees bindings created for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingScope {
    /// Bindings created for a single user.
    User(UserId),
    /// Bindings attached to a shared workspace.
    Workspace(WorkspaceId),
}

impl BindingScope {
    /// Derives the binding scope for a user.
    #[must_use]
    pub fn for_user(user: &UserRecord) -> Self {
        match (user.user_type, &user.workspace_id) {
            (UserType::Enterprise, Some(workspace_id)) => Self::Workspace(workspace_id.clone()),
            _ => Self::User(user.user_id.clone()),
        }
    }

    /// Returns true when the binding falls inside this scope.
    #[must_use]
    pub fn contains(&self, binding: &WorkspaceBinding) -> bool {
        match self {
            Self::User(user_id) => binding.user_id == *user_id,
            Self::Workspace(workspace_id) => binding.workspace_id == *workspace_id,
        }
    }
}
