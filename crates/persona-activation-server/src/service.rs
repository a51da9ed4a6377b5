// persona-activation-server/src/service.rs
// ============================================================================
// Module: Activation Service
// Description: Boundary validation and error mapping over the resolver.
// Purpose: Share one request path between the HTTP handlers and the CLI.
// Dependencies: persona-activation-config, persona-activation-core, persona-activation-store-sqlite
// ============================================================================

//! ## Overview
//! [`ActivationService`] takes raw request fields, validates them, and calls
//! the resolver with a caller-supplied [`ResolverContext`]. Validation
//! failures never reach the resolver and are never audited. Every failure
//! maps to a stable error code and HTTP status through [`ServiceError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use persona_activation_config::StoreConfig;
use persona_activation_config::StoreType;
use persona_activation_core::ActivationResolver;
use persona_activation_core::AuditHistory;
use persona_activation_core::AuditId;
use persona_activation_core::AuditIdSource;
use persona_activation_core::DEFAULT_AUDIT_HISTORY_LIMIT;
use persona_activation_core::InMemoryActivationStore;
use persona_activation_core::MAX_AUDIT_HISTORY_LIMIT;
use persona_activation_core::PersonaId;
use persona_activation_core::PolicyAdminError;
use persona_activation_core::PolicyStatus;
use persona_activation_core::PolicyTransitionOutcome;
use persona_activation_core::RandomAuditIdSource;
use persona_activation_core::ReplayOutcome;
use persona_activation_core::ReplayedDecision;
use persona_activation_core::ResolveRequest;
use persona_activation_core::ResolverContext;
use persona_activation_core::ResolverDecision;
use persona_activation_core::ResolverError;
use persona_activation_core::SharedAuditStore;
use persona_activation_core::SharedEligibilityStore;
use persona_activation_core::SharedEligibilityWriter;
use persona_activation_core::StoreError;
use persona_activation_core::TransitionRules;
use persona_activation_core::UserId;
use persona_activation_core::ValidationError;
use persona_activation_core::transition_current_policy;
use persona_activation_store_sqlite::SqliteActivationStore;
use persona_activation_store_sqlite::SqliteStoreError;

// ============================================================================
// SECTION: Store Wiring
// ============================================================================

/// Shared handles onto one backing store.
#[derive(Clone)]
pub struct StoreHandles {
    /// Eligibility reads.
    pub eligibility: SharedEligibilityStore,
    /// Audit log.
    pub audit: SharedAuditStore,
    /// Eligibility writes (policy transitions, seeding).
    pub writer: SharedEligibilityWriter,
}

impl StoreHandles {
    /// Opens the backend selected by configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the `SQLite` database cannot be opened.
    pub fn from_config(config: &StoreConfig) -> Result<Self, SqliteStoreError> {
        match (config.store_type, config.sqlite_config()) {
            (StoreType::Sqlite, Some(sqlite)) => {
                Ok(Self::from_sqlite(&SqliteActivationStore::new(&sqlite)?))
            }
            (StoreType::Sqlite, None) => {
                Err(SqliteStoreError::Invalid("sqlite store requires path".to_string()))
            }
            (StoreType::Memory, _) => Ok(Self::from_memory(&InMemoryActivationStore::new())),
        }
    }

    /// Wraps an in-memory store; clones share its state.
    #[must_use]
    pub fn from_memory(store: &InMemoryActivationStore) -> Self {
        Self {
            eligibility: SharedEligibilityStore::from_store(store.clone()),
            audit: SharedAuditStore::from_store(store.clone()),
            writer: SharedEligibilityWriter::from_store(store.clone()),
        }
    }

    /// Wraps a `SQLite` store; clones share its connection.
    #[must_use]
    pub fn from_sqlite(store: &SqliteActivationStore) -> Self {
        Self {
            eligibility: SharedEligibilityStore::from_store(store.clone()),
            audit: SharedAuditStore::from_store(store.clone()),
            writer: SharedEligibilityWriter::from_store(store.clone()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Service failures with their HTTP mapping.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A request field failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),
    /// The request was structurally invalid.
    #[error("{message}")]
    BadRequest {
        /// Error code.
        code: &'static str,
        /// Error message.
        message: String,
    },
    /// No audit record exists for the id in the caller's tenant.
    #[error("audit record {0} not found")]
    AuditNotFound(AuditId),
    /// The persona has no current policy.
    #[error("persona {0} has no current policy")]
    PolicyNotFound(PersonaId),
    /// The lifecycle table rejected a policy move.
    #[error("{0}")]
    IllegalTransition(String),
    /// A resolver hard failure.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// A store failure outside the resolver.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    /// Returns the machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.code(),
            Self::BadRequest {
                code,
                ..
            } => *code,
            Self::AuditNotFound(_) => "AUDIT_NOT_FOUND",
            Self::PolicyNotFound(_) => "POLICY_NOT_FOUND",
            Self::IllegalTransition(_) => "ILLEGAL_TRANSITION",
            Self::Resolver(ResolverError::AuditWrite(_) | ResolverError::AuditRead(_))
            | Self::Store(_) => "STORE_UNAVAILABLE",
            Self::Resolver(ResolverError::Integrity(_)) => "AUDIT_INTEGRITY",
            Self::Resolver(ResolverError::Hash(_)) => "INTERNAL",
        }
    }

    /// Returns the HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation(_)
            | Self::BadRequest {
                ..
            } => 400,
            Self::AuditNotFound(_) | Self::PolicyNotFound(_) => 404,
            Self::IllegalTransition(_) => 409,
            Self::Resolver(ResolverError::AuditWrite(_) | ResolverError::AuditRead(_))
            | Self::Store(_) => 503,
            Self::Resolver(ResolverError::Integrity(_) | ResolverError::Hash(_)) => 500,
        }
    }

    /// Returns a message safe to show callers; infrastructure details are
    /// withheld.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.status() {
            503 => "store unavailable".to_string(),
            500 => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<PolicyAdminError> for ServiceError {
    fn from(err: PolicyAdminError) -> Self {
        match err {
            PolicyAdminError::NotFound(persona_id) => Self::PolicyNotFound(persona_id),
            PolicyAdminError::Transition(err) => Self::IllegalTransition(err.to_string()),
            PolicyAdminError::Store(err) => Self::Store(err),
        }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Request-level operations over one resolver and writer.
pub struct ActivationService {
    /// Resolver over the shared stores.
    resolver: ActivationResolver<SharedEligibilityStore, SharedAuditStore>,
    /// Eligibility writer used for policy transitions.
    writer: SharedEligibilityWriter,
    /// Lifecycle rules.
    rules: TransitionRules,
}

impl ActivationService {
    /// Builds a service with random audit ids.
    #[must_use]
    pub fn new(stores: StoreHandles, rules: TransitionRules) -> Self {
        Self::with_audit_ids(stores, rules, Arc::new(RandomAuditIdSource))
    }

    /// Builds a service with an explicit audit id source.
    #[must_use]
    pub fn with_audit_ids(
        stores: StoreHandles,
        rules: TransitionRules,
        audit_ids: Arc<dyn AuditIdSource + Send + Sync>,
    ) -> Self {
        Self {
            resolver: ActivationResolver::new(stores.eligibility, stores.audit, audit_ids),
            writer: stores.writer,
            rules,
        }
    }

    /// Validates raw fields and resolves activation.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on validation failure or a resolver hard
    /// failure.
    pub fn resolve(
        &self,
        context: &ResolverContext,
        user_id: Option<&str>,
        persona_id: Option<&str>,
    ) -> Result<ResolverDecision, ServiceError> {
        let request = ResolveRequest::parse(user_id, persona_id)?;
        Ok(self.resolver.resolve_activation(context, &request)?)
    }

    /// Replays a recorded decision.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::AuditNotFound`] when no record exists, or
    /// another [`ServiceError`] on validation or store failure.
    pub fn replay(
        &self,
        context: &ResolverContext,
        audit_id: Option<&str>,
    ) -> Result<ReplayedDecision, ServiceError> {
        let audit_id = match audit_id.map(str::trim) {
            None | Some("") => return Err(ValidationError::MissingAuditId.into()),
            Some(raw) => AuditId::parse("audit_id", raw)?,
        };
        match self.resolver.replay_resolver_decision(context, &audit_id)? {
            ReplayOutcome::Found(decision) => Ok(decision),
            ReplayOutcome::NotFound => Err(ServiceError::AuditNotFound(audit_id)),
        }
    }

    /// Lists a user's recorded decisions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on validation or store failure.
    pub fn audit_history(
        &self,
        context: &ResolverContext,
        user_id: Option<&str>,
        limit: Option<&str>,
    ) -> Result<AuditHistory, ServiceError> {
        let user_id = match user_id.map(str::trim) {
            None | Some("") => return Err(ValidationError::MissingUserId.into()),
            Some(raw) => UserId::parse("user_id", raw)?,
        };
        let limit = parse_limit(limit)?;
        Ok(self.resolver.audit_history(context, &user_id, limit)?)
    }

    /// Applies a checked lifecycle transition to a persona's current policy.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the input is invalid, the policy is
    /// missing, the move is illegal, or the store fails.
    pub fn transition_policy(
        &self,
        context: &ResolverContext,
        persona_id: &str,
        to: Option<&str>,
    ) -> Result<PolicyTransitionOutcome, ServiceError> {
        let persona_id = PersonaId::parse("persona_id", persona_id)?;
        let raw_status = to.map(str::trim).unwrap_or_default();
        let to = PolicyStatus::parse(raw_status).ok_or_else(|| ServiceError::BadRequest {
            code: "INVALID_POLICY_STATUS",
            message: format!("unknown policy status: {raw_status}"),
        })?;
        Ok(transition_current_policy(
            self.resolver.eligibility(),
            &self.writer,
            context,
            &persona_id,
            to,
            self.rules,
        )?)
    }
}

/// Parses the history limit; absent means the default.
fn parse_limit(raw: Option<&str>) -> Result<usize, ServiceError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(DEFAULT_AUDIT_HISTORY_LIMIT);
    };
    let invalid = || ServiceError::BadRequest {
        code: "INVALID_LIMIT",
        message: format!("limit must be between 1 and {MAX_AUDIT_HISTORY_LIMIT}"),
    };
    let limit: usize = raw.parse().map_err(|_| invalid())?;
    if limit == 0 || limit > MAX_AUDIT_HISTORY_LIMIT {
        return Err(invalid());
    }
    Ok(limit)
}
