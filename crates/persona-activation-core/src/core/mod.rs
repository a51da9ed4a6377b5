// persona-activation-core/src/core/mod.rs
// ============================================================================
// Module: Persona Activation Core Types
// Description: Canonical data model for users, bindings, policies, and decisions.
// Purpose: Provide stable, serializable types shared by every resolver surface.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Core types are the single source of truth for the HTTP, CLI, and storage
//! representations of resolver inputs and outputs.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod context;
pub mod decision;
pub mod hashing;
pub mod identifiers;
pub mod model;
pub mod policy;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::ResolverContext;
pub use decision::AuditRecord;
pub use decision::ReasonCode;
pub use decision::ReplayedDecision;
pub use decision::ResolveRequest;
pub use decision::ResolverDecision;
pub use decision::ValidationError;
pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;
pub use identifiers::AuditId;
pub use identifiers::BindingId;
pub use identifiers::EnterpriseId;
pub use identifiers::MAX_IDENTIFIER_BYTES;
pub use identifiers::PersonaId;
pub use identifiers::TenantId;
pub use identifiers::UserId;
pub use identifiers::WorkspaceId;
pub use model::BindingScope;
pub use model::StackStatus;
pub use model::UserRecord;
pub use model::UserType;
pub use model::WorkspaceBinding;
pub use policy::PersonaPolicy;
pub use policy::PolicyStatus;
pub use policy::PolicyTransitionError;
pub use policy::TransitionPath;
pub use policy::TransitionRules;
pub use time::Timestamp;
