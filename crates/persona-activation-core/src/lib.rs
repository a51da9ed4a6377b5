// persona-activation-core/src/lib.rs
// ============================================================================
// Module: Persona Activation Core Library
// Description: Public API surface for the persona activation resolver core.
// Purpose: Expose core types, store interfaces, and resolver runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Persona activation core decides whether a user's workspace binding can be
//! promoted to an active persona runtime. The decision engine is a pure
//! function over a tenant-scoped eligibility snapshot; every resolver run is
//! recorded in an append-only audit log and can be replayed verbatim.
//!
//! The crate is storage-agnostic: hosts plug in stores through the traits in
//! [`interfaces`] and pass an explicit [`ResolverContext`] into every call.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditIdSource;
pub use interfaces::AuditStore;
pub use interfaces::EligibilityStore;
pub use interfaces::EligibilityWriter;
pub use interfaces::StoreError;
pub use runtime::ActivationResolver;
pub use runtime::AuditHistory;
pub use runtime::DEFAULT_AUDIT_HISTORY_LIMIT;
pub use runtime::Eligibility;
pub use runtime::InMemoryActivationStore;
pub use runtime::LookupError;
pub use runtime::MAX_AUDIT_HISTORY_LIMIT;
pub use runtime::PolicyAdminError;
pub use runtime::PolicyTransitionOutcome;
pub use runtime::RandomAuditIdSource;
pub use runtime::ReplayOutcome;
pub use runtime::ResolverError;
pub use runtime::SequentialAuditIdSource;
pub use runtime::SharedAuditStore;
pub use runtime::SharedEligibilityStore;
pub use runtime::SharedEligibilityWriter;
pub use runtime::Verdict;
pub use runtime::decide;
pub use runtime::lookup_eligibility;
pub use runtime::transition_current_policy;
