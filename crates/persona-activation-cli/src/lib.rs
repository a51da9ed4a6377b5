// persona-activation-cli/src/lib.rs
// ============================================================================
// Module: Persona Activation CLI Library
// Description: Shared helpers for the persona activation command-line interface.
// Purpose: Provide the message catalog and fixture seeding for the binary and tests.
// Dependencies: persona-activation-core, serde
// ============================================================================

//! ## Overview
//! The binary entry point (`src/main.rs`) imports these helpers so user-facing
//! output stays consistent and fixture loading is testable on its own.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Eligibility fixture loading and seeding.
pub mod fixture;
/// Message catalog helpers.
pub mod i18n;
