//! Store config validation tests for persona-activation-config.
// persona-activation-config/tests/storage_validation.rs
// =============================================================================
// Module: Storage Config Validation Tests
// Description: Validate memory and SQLite store constraints.
// Purpose: Ensure store configuration is complete before any backend opens.
// =============================================================================

use std::path::PathBuf;

use persona_activation_config::StoreType;

mod common;

use common::TestResult;

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.path = Some(PathBuf::from("activation.db"));
    common::assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    common::assert_invalid(config.validate(), "sqlite store requires path")
}

#[test]
fn sqlite_store_path_component_limit() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(PathBuf::from(format!("{}.db", "a".repeat(300))));
    common::assert_invalid(config.validate(), "store path component too long")
}

#[test]
fn sqlite_store_rejects_zero_busy_timeout() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    config.store.path = Some(PathBuf::from("activation.db"));
    config.store.busy_timeout_ms = 0;
    common::assert_invalid(config.validate(), "busy_timeout_ms must be greater than zero")
}

#[test]
fn sqlite_store_valid_config_passes() -> TestResult {
    let config = common::config_from_toml(
        "[store]\ntype = \"sqlite\"\npath = \"activation.db\"\nsync_mode = \"normal\"\n",
    )
    .map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())
}
