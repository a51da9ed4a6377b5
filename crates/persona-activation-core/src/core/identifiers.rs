// persona-activation-core/src/core/identifiers.rs
// ============================================================================
// Module: Persona Activation Identifiers
// Description: Opaque identifiers for tenants, users, personas, and audits.
// Purpose: Provide strongly typed, serializable IDs with boundary validation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings that serialize transparently. Construction
//! through `new` performs no checks so stored rows round-trip untouched;
//! untrusted input goes through `parse`, which enforces the boundary rules
//! (non-blank, bounded length, no control characters).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::decision::ValidationError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum identifier length in bytes accepted at request boundaries.
pub const MAX_IDENTIFIER_BYTES: usize = 256;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Declares a transparent string identifier with the shared helper surface.
macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier without validation.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Parses an untrusted identifier, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns [`ValidationError`] when the value is blank, too long, or
            /// contains control characters.
            pub fn parse(field: &'static str, raw: &str) -> Result<Self, ValidationError> {
                validate_identifier(field, raw).map(Self::new)
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier!(
    /// Tenant identifier. Always derived from verified session context.
    TenantId
);

string_identifier!(
    /// User identifier owned by the identity subsystem.
    UserId
);

string_identifier!(
    /// Persona identifier naming a configuration profile.
    PersonaId
);

string_identifier!(
    /// Workspace identifier.
    WorkspaceId
);

string_identifier!(
    /// Enterprise account identifier.
    EnterpriseId
);

string_identifier!(
    /// Workspace binding identifier.
    BindingId
);

string_identifier!(
    /// Audit record identifier returned with every resolver decision.
    AuditId
);

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates an untrusted identifier and returns its trimmed form.
fn validate_identifier(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty {
            field,
        });
    }
    if trimmed.len() > MAX_IDENTIFIER_BYTES {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_IDENTIFIER_BYTES,
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(ValidationError::ControlCharacters {
            field,
        });
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
