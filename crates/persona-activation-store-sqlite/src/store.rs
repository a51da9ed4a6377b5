// persona-activation-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Activation Store
// Description: Durable eligibility rows and append-only audit log on SQLite.
// Purpose: Persist resolver inputs and decisions with integrity checks.
// Dependencies: persona-activation-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Users, bindings, and policies live in plain tables keyed by tenant. Audit
//! records are inserted once into `audit_records` as canonical JSON together
//! with a digest; loads recompute the digest and fail closed on mismatch.
//! A partial unique index keeps at most one current policy per persona.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use persona_activation_core::AuditId;
use persona_activation_core::AuditRecord;
use persona_activation_core::AuditStore;
use persona_activation_core::BindingId;
use persona_activation_core::BindingScope;
use persona_activation_core::EligibilityStore;
use persona_activation_core::EligibilityWriter;
use persona_activation_core::EnterpriseId;
use persona_activation_core::PersonaId;
use persona_activation_core::PersonaPolicy;
use persona_activation_core::PolicyStatus;
use persona_activation_core::StackStatus;
use persona_activation_core::StoreError;
use persona_activation_core::TenantId;
use persona_activation_core::Timestamp;
use persona_activation_core::UserId;
use persona_activation_core::UserRecord;
use persona_activation_core::UserType;
use persona_activation_core::WorkspaceBinding;
use persona_activation_core::WorkspaceId;
use persona_activation_core::hashing::DEFAULT_HASH_ALGORITHM;
use persona_activation_core::hashing::HashAlgorithm;
use persona_activation_core::hashing::canonical_json_bytes;
use persona_activation_core::hashing::hash_bytes;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum canonical audit record size accepted by the store.
pub const MAX_AUDIT_RECORD_BYTES: usize = 256 * 1024;

/// Columns selected for binding rows.
const BINDING_COLUMNS: &str = "binding_id, tenant_id, user_id, workspace_id, persona_id, \
                               stack_status, blockers_json, updated_at_json";
/// Columns selected for policy rows.
const POLICY_COLUMNS: &str =
    "tenant_id, persona_id, version, status, is_current, activated_at_json, updated_at_json";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` activation store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Returns a config with default pragmas for the given path.
    #[must_use]
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// An audit record with the same id already exists.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Audit payload exceeded the size limit.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Invalid(format!(
                "audit record exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Maps engine errors.
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed activation store with WAL support.
#[derive(Clone)]
pub struct SqliteActivationStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteActivationStore {
    /// Opens an `SQLite`-backed activation store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Eligibility Reads
// ============================================================================

impl EligibilityStore for SqliteActivationStore {
    fn load_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.read_user(tenant_id, user_id).map_err(StoreError::from)
    }

    fn load_binding(
        &self,
        tenant_id: &TenantId,
        scope: &BindingScope,
        persona_id: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, StoreError> {
        self.read_binding(tenant_id, scope, persona_id).map_err(StoreError::from)
    }

    fn load_current_policy(
        &self,
        tenant_id: &TenantId,
        persona_id: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, StoreError> {
        self.read_current_policy(tenant_id, persona_id).map_err(StoreError::from)
    }
}

/// Raw binding row columns.
type BindingRow = (String, String, String, String, String, String, String, String);
/// Raw policy row columns.
type PolicyRow = (String, String, i64, String, bool, Option<String>, String);

impl SqliteActivationStore {
    /// Reads one user row.
    fn read_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Option<UserRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT user_type, enterprise_id, workspace_id, is_demo FROM users WHERE \
                 tenant_id = ?1 AND user_id = ?2",
                params![tenant_id.as_str(), user_id.as_str()],
                |row| {
                    let user_type: String = row.get(0)?;
                    let enterprise_id: Option<String> = row.get(1)?;
                    let workspace_id: Option<String> = row.get(2)?;
                    let is_demo: bool = row.get(3)?;
                    Ok((user_type, enterprise_id, workspace_id, is_demo))
                },
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        let Some((user_type, enterprise_id, workspace_id, is_demo)) = row else {
            return Ok(None);
        };
        let user_type = UserType::parse(&user_type).ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("unknown user_type for user {user_id}: {user_type}"))
        })?;
        Ok(Some(UserRecord {
            tenant_id: tenant_id.clone(),
            user_id: user_id.clone(),
            user_type,
            enterprise_id: enterprise_id.map(EnterpriseId::new),
            workspace_id: workspace_id.map(WorkspaceId::new),
            is_demo,
        }))
    }

    /// Reads the most recent binding in scope, optionally for one persona.
    fn read_binding(
        &self,
        tenant_id: &TenantId,
        scope: &BindingScope,
        persona_id: Option<&PersonaId>,
    ) -> Result<Option<WorkspaceBinding>, SqliteStoreError> {
        let (scope_column, scope_value) = match scope {
            BindingScope::User(user_id) => ("user_id", user_id.as_str()),
            BindingScope::Workspace(workspace_id) => ("workspace_id", workspace_id.as_str()),
        };
        let sql = format!(
            "SELECT {BINDING_COLUMNS} FROM bindings WHERE tenant_id = ?1 AND {scope_column} = ?2 \
             AND (?3 IS NULL OR persona_id = ?3) ORDER BY updated_order DESC, binding_id DESC \
             LIMIT 1"
        );
        let guard = self.lock()?;
        let row = guard
            .query_row(
                &sql,
                params![tenant_id.as_str(), scope_value, persona_id.map(PersonaId::as_str)],
                binding_row,
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        row.map(decode_binding).transpose()
    }

    /// Reads the current policy row for a persona.
    fn read_current_policy(
        &self,
        tenant_id: &TenantId,
        persona_id: &PersonaId,
    ) -> Result<Option<PersonaPolicy>, SqliteStoreError> {
        let sql = format!(
            "SELECT {POLICY_COLUMNS} FROM policies WHERE tenant_id = ?1 AND persona_id = ?2 AND \
             is_current = 1 LIMIT 2"
        );
        let rows = {
            let guard = self.lock()?;
            let mut statement = guard.prepare(&sql).map_err(db_error)?;
            let rows = statement
                .query_map(params![tenant_id.as_str(), persona_id.as_str()], policy_row)
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)?;
            drop(statement);
            drop(guard);
            rows
        };
        if rows.len() > 1 {
            return Err(SqliteStoreError::Corrupt(format!(
                "persona {persona_id} has more than one current policy"
            )));
        }
        rows.into_iter().next().map(decode_policy).transpose()
    }
}

// ============================================================================
// SECTION: Eligibility Writes
// ============================================================================

impl EligibilityWriter for SqliteActivationStore {
    fn upsert_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO users (tenant_id, user_id, user_type, enterprise_id, workspace_id, \
                 is_demo) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(tenant_id, user_id) DO \
                 UPDATE SET user_type = excluded.user_type, enterprise_id = \
                 excluded.enterprise_id, workspace_id = excluded.workspace_id, is_demo = \
                 excluded.is_demo",
                params![
                    user.tenant_id.as_str(),
                    user.user_id.as_str(),
                    user.user_type.as_str(),
                    user.enterprise_id.as_ref().map(EnterpriseId::as_str),
                    user.workspace_id.as_ref().map(WorkspaceId::as_str),
                    user.is_demo,
                ],
            )
            .map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    fn upsert_binding(&self, binding: &WorkspaceBinding) -> Result<(), StoreError> {
        let blockers = serde_json::to_string(&binding.blockers)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let updated_at = encode_timestamp(&binding.updated_at)?;
        let updated_order = ordering_key(&binding.updated_at)?;
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO bindings (tenant_id, binding_id, user_id, workspace_id, persona_id, \
                 stack_status, blockers_json, updated_at_json, updated_order) VALUES (?1, ?2, \
                 ?3, ?4, ?5, ?6, ?7, ?8, ?9) ON CONFLICT(tenant_id, binding_id) DO UPDATE SET \
                 user_id = excluded.user_id, workspace_id = excluded.workspace_id, persona_id = \
                 excluded.persona_id, stack_status = excluded.stack_status, blockers_json = \
                 excluded.blockers_json, updated_at_json = excluded.updated_at_json, \
                 updated_order = excluded.updated_order",
                params![
                    binding.tenant_id.as_str(),
                    binding.binding_id.as_str(),
                    binding.user_id.as_str(),
                    binding.workspace_id.as_str(),
                    binding.persona_id.as_str(),
                    binding.stack_status.as_str(),
                    blockers,
                    updated_at,
                    updated_order,
                ],
            )
            .map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    fn upsert_policy(&self, policy: &PersonaPolicy) -> Result<(), StoreError> {
        self.write_policy(policy).map_err(StoreError::from)
    }
}

impl SqliteActivationStore {
    /// Writes a policy row, demoting other current rows first.
    fn write_policy(&self, policy: &PersonaPolicy) -> Result<(), SqliteStoreError> {
        if policy.version == 0 {
            return Err(SqliteStoreError::Invalid("policy version must be at least 1".to_string()));
        }
        let activated_at = policy.activated_at.as_ref().map(encode_timestamp).transpose()?;
        let updated_at = encode_timestamp(&policy.updated_at)?;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        if policy.is_current {
            tx.execute(
                "UPDATE policies SET is_current = 0 WHERE tenant_id = ?1 AND persona_id = ?2 AND \
                 version != ?3",
                params![
                    policy.tenant_id.as_str(),
                    policy.persona_id.as_str(),
                    i64::from(policy.version)
                ],
            )
            .map_err(db_error)?;
        }
        tx.execute(
            "INSERT INTO policies (tenant_id, persona_id, version, status, is_current, \
             activated_at_json, updated_at_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON \
             CONFLICT(tenant_id, persona_id, version) DO UPDATE SET status = excluded.status, \
             is_current = excluded.is_current, activated_at_json = excluded.activated_at_json, \
             updated_at_json = excluded.updated_at_json",
            params![
                policy.tenant_id.as_str(),
                policy.persona_id.as_str(),
                i64::from(policy.version),
                policy.status.as_str(),
                policy.is_current,
                activated_at,
                updated_at,
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit Log
// ============================================================================

impl AuditStore for SqliteActivationStore {
    fn append(&self, record: &AuditRecord) -> Result<(), StoreError> {
        self.append_record(record).map_err(StoreError::from)
    }

    fn load(
        &self,
        tenant_id: &TenantId,
        audit_id: &AuditId,
    ) -> Result<Option<AuditRecord>, StoreError> {
        self.load_record(tenant_id, audit_id).map_err(StoreError::from)
    }

    fn list_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        self.list_records(tenant_id, user_id, limit).map_err(StoreError::from)
    }
}

impl SqliteActivationStore {
    /// Inserts one audit record in its own transaction.
    fn append_record(&self, record: &AuditRecord) -> Result<(), SqliteStoreError> {
        let canonical_json = canonical_json_bytes(record)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        if canonical_json.len() > MAX_AUDIT_RECORD_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_AUDIT_RECORD_BYTES,
                actual_bytes: canonical_json.len(),
            });
        }
        let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &canonical_json);
        let stored_at = unix_millis();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM audit_records WHERE audit_id = ?1",
                params![record.audit_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        if exists.is_some() {
            return Err(SqliteStoreError::Conflict(format!(
                "audit record {} already exists",
                record.audit_id
            )));
        }
        tx.execute(
            "INSERT INTO audit_records (audit_id, tenant_id, user_id, record_json, record_hash, \
             hash_algorithm, stored_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.audit_id.as_str(),
                record.tenant_id.as_str(),
                record.input.user_id.as_str(),
                canonical_json,
                digest.value,
                digest.algorithm.label(),
                stored_at,
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Loads one audit record by id within a tenant.
    fn load_record(
        &self,
        tenant_id: &TenantId,
        audit_id: &AuditId,
    ) -> Result<Option<AuditRecord>, SqliteStoreError> {
        let guard = self.lock()?;
        let row = guard
            .query_row(
                "SELECT record_json, record_hash, hash_algorithm FROM audit_records WHERE \
                 tenant_id = ?1 AND audit_id = ?2",
                params![tenant_id.as_str(), audit_id.as_str()],
                audit_row,
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        let Some(row) = row else {
            return Ok(None);
        };
        let record = decode_audit(row)?;
        if record.audit_id != *audit_id || record.tenant_id != *tenant_id {
            return Err(SqliteStoreError::Invalid(
                "audit key mismatch between row and payload".to_string(),
            ));
        }
        Ok(Some(record))
    }

    /// Lists a user's audit records, newest first.
    fn list_records(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, SqliteStoreError> {
        let limit = i64::try_from(limit)
            .map_err(|_| SqliteStoreError::Invalid("audit list limit too large".to_string()))?;
        let rows = {
            let guard = self.lock()?;
            let mut statement = guard
                .prepare(
                    "SELECT record_json, record_hash, hash_algorithm FROM audit_records WHERE \
                     tenant_id = ?1 AND user_id = ?2 ORDER BY seq DESC LIMIT ?3",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![tenant_id.as_str(), user_id.as_str(), limit], audit_row)
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)?;
            drop(statement);
            drop(guard);
            rows
        };
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let record = decode_audit(row)?;
            if record.tenant_id != *tenant_id || record.input.user_id != *user_id {
                return Err(SqliteStoreError::Invalid(
                    "audit key mismatch between row and payload".to_string(),
                ));
            }
            records.push(record);
        }
        Ok(records)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Extracts raw binding columns.
fn binding_row(row: &Row<'_>) -> rusqlite::Result<BindingRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// Converts raw binding columns into a typed row.
fn decode_binding(row: BindingRow) -> Result<WorkspaceBinding, SqliteStoreError> {
    let (binding_id, tenant_id, user_id, workspace_id, persona_id, status, blockers, updated_at) =
        row;
    let stack_status = StackStatus::parse(&status).ok_or_else(|| {
        SqliteStoreError::Corrupt(format!("unknown stack_status for binding {binding_id}"))
    })?;
    let blockers: Vec<String> = serde_json::from_str(&blockers)
        .map_err(|err| SqliteStoreError::Corrupt(format!("binding {binding_id} blockers: {err}")))?;
    Ok(WorkspaceBinding {
        binding_id: BindingId::new(binding_id),
        tenant_id: TenantId::new(tenant_id),
        user_id: UserId::new(user_id),
        workspace_id: WorkspaceId::new(workspace_id),
        persona_id: PersonaId::new(persona_id),
        stack_status,
        blockers,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

/// Extracts raw policy columns.
fn policy_row(row: &Row<'_>) -> rusqlite::Result<PolicyRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?))
}

/// Converts raw policy columns into a typed row.
fn decode_policy(row: PolicyRow) -> Result<PersonaPolicy, SqliteStoreError> {
    let (tenant_id, persona_id, version, status, is_current, activated_at, updated_at) = row;
    let version = u32::try_from(version)
        .ok()
        .filter(|version| *version >= 1)
        .ok_or_else(|| SqliteStoreError::Corrupt(format!("invalid policy version {version}")))?;
    let status = PolicyStatus::parse(&status).ok_or_else(|| {
        SqliteStoreError::Corrupt(format!("unknown policy status for persona {persona_id}"))
    })?;
    Ok(PersonaPolicy {
        tenant_id: TenantId::new(tenant_id),
        persona_id: PersonaId::new(persona_id),
        version,
        status,
        is_current,
        activated_at: activated_at.as_deref().map(decode_timestamp).transpose()?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

/// Extracts raw audit columns.
fn audit_row(row: &Row<'_>) -> rusqlite::Result<(Vec<u8>, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Verifies and decodes a stored audit record.
fn decode_audit(row: (Vec<u8>, String, String)) -> Result<AuditRecord, SqliteStoreError> {
    let (bytes, hash_value, hash_algorithm) = row;
    if bytes.len() > MAX_AUDIT_RECORD_BYTES {
        return Err(SqliteStoreError::TooLarge {
            max_bytes: MAX_AUDIT_RECORD_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    let algorithm = parse_hash_algorithm(&hash_algorithm)?;
    let expected = hash_bytes(algorithm, &bytes);
    if expected.value != hash_value {
        return Err(SqliteStoreError::Corrupt("audit record hash mismatch".to_string()));
    }
    serde_json::from_slice(&bytes).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Serializes a timestamp column.
fn encode_timestamp(timestamp: &Timestamp) -> Result<String, SqliteStoreError> {
    serde_json::to_string(timestamp).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a timestamp column.
fn decode_timestamp(raw: &str) -> Result<Timestamp, SqliteStoreError> {
    serde_json::from_str(raw)
        .map_err(|err| SqliteStoreError::Corrupt(format!("invalid timestamp column: {err}")))
}

/// Returns the sortable integer stored alongside a timestamp.
fn ordering_key(timestamp: &Timestamp) -> Result<i64, SqliteStoreError> {
    i64::try_from(timestamp.ordering_value())
        .map_err(|_| SqliteStoreError::Invalid("timestamp out of range".to_string()))
}

/// Parses a hash algorithm label.
fn parse_hash_algorithm(label: &str) -> Result<HashAlgorithm, SqliteStoreError> {
    HashAlgorithm::from_label(label)
        .ok_or_else(|| SqliteStoreError::Invalid(format!("unsupported hash algorithm: {label}")))
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => create_tables(&tx)?,
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Creates the version 1 schema.
fn create_tables(tx: &Transaction<'_>) -> Result<(), SqliteStoreError> {
    tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
        .map_err(db_error)?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            tenant_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            user_type TEXT NOT NULL,
            enterprise_id TEXT,
            workspace_id TEXT,
            is_demo INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (tenant_id, user_id)
        );
        CREATE TABLE IF NOT EXISTS bindings (
            tenant_id TEXT NOT NULL,
            binding_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            workspace_id TEXT NOT NULL,
            persona_id TEXT NOT NULL,
            stack_status TEXT NOT NULL,
            blockers_json TEXT NOT NULL,
            updated_at_json TEXT NOT NULL,
            updated_order INTEGER NOT NULL,
            PRIMARY KEY (tenant_id, binding_id)
        );
        CREATE INDEX IF NOT EXISTS idx_bindings_user
            ON bindings (tenant_id, user_id, updated_order);
        CREATE INDEX IF NOT EXISTS idx_bindings_workspace
            ON bindings (tenant_id, workspace_id, updated_order);
        CREATE TABLE IF NOT EXISTS policies (
            tenant_id TEXT NOT NULL,
            persona_id TEXT NOT NULL,
            version INTEGER NOT NULL CHECK (version >= 1),
            status TEXT NOT NULL,
            is_current INTEGER NOT NULL,
            activated_at_json TEXT,
            updated_at_json TEXT NOT NULL,
            PRIMARY KEY (tenant_id, persona_id, version)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_policies_current
            ON policies (tenant_id, persona_id) WHERE is_current = 1;
        CREATE TABLE IF NOT EXISTS audit_records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            audit_id TEXT NOT NULL UNIQUE,
            tenant_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            record_json BLOB NOT NULL,
            record_hash TEXT NOT NULL,
            hash_algorithm TEXT NOT NULL,
            stored_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_records_user
            ON audit_records (tenant_id, user_id, seq);",
    )
    .map_err(db_error)?;
    Ok(())
}

/// Returns the current unix epoch in milliseconds.
fn unix_millis() -> i64 {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    i64::try_from(now.as_millis()).unwrap_or(i64::MAX)
}
