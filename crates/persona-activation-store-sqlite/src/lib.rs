// persona-activation-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Activation Store
// Description: Durable eligibility and audit backend using SQLite WAL.
// Purpose: Provide production persistence for the persona activation resolver.
// Dependencies: persona-activation-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteActivationStore`], which implements the
//! eligibility reader, the eligibility writer, and the append-only audit log
//! on one `SQLite` database. Audit records are stored as canonical JSON with
//! a digest and are verified on every read.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_AUDIT_RECORD_BYTES;
pub use store::SqliteActivationStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
