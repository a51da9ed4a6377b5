// persona-activation-config/src/lib.rs
// ============================================================================
// Module: Persona Activation Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for persona-activation.toml semantics.
// Dependencies: persona-activation-core, persona-activation-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `persona-activation-config` defines the configuration shared by the HTTP
//! server and the CLI. Validation is strict and fails closed: an unusable or
//! unsafe configuration is rejected before any store is opened.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
