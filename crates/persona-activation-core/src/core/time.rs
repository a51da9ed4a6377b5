// persona-activation-core/src/core/time.rs
// ============================================================================
// Module: Persona Activation Time Model
// Description: Canonical timestamp representation for decisions and records.
// Purpose: Keep resolver output replayable by never reading the clock in core.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The resolver core never reads wall-clock time. Hosts stamp each request
//! through [`crate::ResolverContext::requested_at`], and the same value is
//! embedded in the decision and its audit record.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp used in decisions, bindings, and audit records.
///
/// # Invariants
/// - Values are supplied by callers; the core never reads wall-clock time.
/// - Ordering via [`Timestamp::ordering_value`] compares raw magnitudes, so
///   callers should not mix kinds within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns a sortable magnitude used to pick the most recent row.
    #[must_use]
    pub const fn ordering_value(&self) -> i128 {
        match self {
            Self::UnixMillis(value) => *value as i128,
            Self::Logical(value) => *value as i128,
        }
    }
}
