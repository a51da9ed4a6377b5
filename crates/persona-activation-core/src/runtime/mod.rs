// persona-activation-core/src/runtime/mod.rs
// ============================================================================
// Module: Persona Activation Runtime
// Description: Eligibility lookup, decision engine, resolver, and stores.
// Purpose: Execute resolver calls against pluggable stores.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement resolve, replay, audit history, and policy
//! administration. Every surface calls into the same resolver so decisions
//! are computed and recorded one way only.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod audit_ids;
pub mod engine;
pub mod lookup;
pub mod policy_admin;
pub mod resolver;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit_ids::RandomAuditIdSource;
pub use audit_ids::SequentialAuditIdSource;
pub use engine::Verdict;
pub use engine::decide;
pub use lookup::Eligibility;
pub use lookup::LookupError;
pub use lookup::lookup_eligibility;
pub use policy_admin::PolicyAdminError;
pub use policy_admin::PolicyTransitionOutcome;
pub use policy_admin::transition_current_policy;
pub use resolver::ActivationResolver;
pub use resolver::AuditHistory;
pub use resolver::DEFAULT_AUDIT_HISTORY_LIMIT;
pub use resolver::MAX_AUDIT_HISTORY_LIMIT;
pub use resolver::ReplayOutcome;
pub use resolver::ResolverError;
pub use store::InMemoryActivationStore;
pub use store::SharedAuditStore;
pub use store::SharedEligibilityStore;
pub use store::SharedEligibilityWriter;
