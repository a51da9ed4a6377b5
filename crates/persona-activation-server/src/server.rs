// persona-activation-server/src/server.rs
// ============================================================================
// Module: HTTP Server
// Description: axum routes for resolve, replay, audit history, and policy admin.
// Purpose: Expose the activation service over HTTP with fail-closed auth.
// Dependencies: axum, tokio, persona-activation-config, persona-activation-core
// ============================================================================

//! ## Overview
//! Every route authorizes first, derives a [`ResolverContext`] from the
//! authenticated caller, then runs the blocking service call off the async
//! executor. Error bodies have the shape `{"error": CODE, "message": ...}`.
//!
//! | Route | Method |
//! |-------|--------|
//! | `/v1/activation/resolve` | POST |
//! | `/v1/activation/replay?audit_id=` | GET |
//! | `/v1/activation/audit?user_id=&limit=` | GET |
//! | `/v1/personas/{persona_id}/policy/transition` | POST |
//! | `/healthz` | GET |

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::extract::rejection::QueryRejection;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use persona_activation_config::ActivationConfig;
use persona_activation_config::MAX_BODY_BYTES_LIMIT;
use persona_activation_core::ResolverContext;
use persona_activation_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;

use crate::access_log::AccessLogSink;
use crate::access_log::AuthzEvent;
use crate::access_log::RequestEvent;
use crate::access_log::RequestEventParams;
use crate::access_log::access_log_from_config;
use crate::auth::AuthAction;
use crate::auth::AuthContext;
use crate::auth::AuthError;
use crate::auth::DefaultRequestAuthz;
use crate::auth::RequestAuthz;
use crate::auth::RequestContext;
use crate::service::ActivationService;
use crate::service::ServiceError;
use crate::service::StoreHandles;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header carrying a caller-supplied request identifier.
const REQUEST_ID_HEADER: &str = "x-request-id";
/// Maximum accepted request identifier length.
const MAX_REQUEST_ID_BYTES: usize = 128;

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server instance.
pub struct ActivationServer {
    /// Validated configuration.
    config: ActivationConfig,
    /// Shared handler state.
    state: Arc<ServerState>,
}

impl ActivationServer {
    /// Builds a server and opens the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the store or
    /// access log cannot be opened.
    pub fn from_config(config: ActivationConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let stores = StoreHandles::from_config(&config.store)
            .map_err(|err| ServerError::Init(err.to_string()))?;
        Self::with_stores(config, stores)
    }

    /// Builds a server over existing store handles.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid or the access
    /// log cannot be opened.
    pub fn with_stores(config: ActivationConfig, stores: StoreHandles) -> Result<Self, ServerError> {
        let service = ActivationService::new(stores, config.transition_rules());
        let access_log = access_log_from_config(&config.server.access_log)
            .map_err(|err| ServerError::Init(format!("access log: {err}")))?;
        Self::with_service(config, service, access_log)
    }

    /// Builds a server from a prepared service and access log sink.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration is invalid.
    pub fn with_service(
        config: ActivationConfig,
        service: ActivationService,
        access_log: Arc<dyn AccessLogSink>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let authz = DefaultRequestAuthz::from_config(
            config.server.auth.as_ref(),
            config.tenancy.local_tenant_id.clone(),
        );
        let state = Arc::new(ServerState {
            service,
            authz: Arc::new(authz),
            access_log,
            max_body_bytes: config.server.max_body_bytes,
        });
        Ok(Self {
            config,
            state,
        })
    }

    /// Returns the route table bound to this server's state.
    ///
    /// The transport cap sits at the validation ceiling; the configured
    /// `max_body_bytes` is enforced per handler so rejections keep the JSON
    /// error shape.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(handle_health))
            .route("/v1/activation/resolve", post(handle_resolve))
            .route("/v1/activation/replay", get(handle_replay))
            .route("/v1/activation/audit", get(handle_audit))
            .route("/v1/personas/{persona_id}/policy/transition", post(handle_transition))
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES_LIMIT))
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves requests.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self.config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_listener(listener).await
    }

    /// Serves requests on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server fails.
    pub async fn serve_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

/// Shared state for HTTP handlers.
struct ServerState {
    /// Request-level operations.
    service: ActivationService,
    /// Request authorizer.
    authz: Arc<dyn RequestAuthz>,
    /// Access log sink.
    access_log: Arc<dyn AccessLogSink>,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

impl ServerState {
    /// Authorizes a request and records the authz decision.
    fn authorize(&self, ctx: &RequestContext, action: AuthAction) -> Result<AuthContext, AuthError> {
        match self.authz.authorize(ctx, action) {
            Ok(auth) => {
                self.access_log.record_authz(&AuthzEvent::allowed(ctx, action, &auth));
                Ok(auth)
            }
            Err(err) => {
                self.access_log.record_authz(&AuthzEvent::denied(ctx, action, &err));
                Err(err)
            }
        }
    }

    /// Logs the exchange and renders the reply.
    fn finish(&self, exchange: &Exchange, auth: Option<&AuthContext>, reply: Reply) -> Response {
        self.access_log.record_request(&RequestEvent::new(RequestEventParams {
            request_id: exchange.ctx.request_id.clone(),
            route: exchange.action.label(),
            status: reply.status.as_u16(),
            peer_ip: exchange.ctx.peer_ip.map(|ip| ip.to_string()),
            subject: auth.map(|auth| auth.subject.clone()),
            tenant_id: auth.map(|auth| auth.tenant_id.to_string()),
            audit_id: reply.audit_id,
            reason_code: reply.reason_code,
            error_code: reply.error_code,
            request_bytes: exchange.request_bytes,
        }));
        (reply.status, Json(reply.body)).into_response()
    }

    /// Runs the authorize → parse → service → log sequence shared by all
    /// routes. Inputs are only parsed for authorized callers.
    fn handle<I, T, P, F>(&self, exchange: &Exchange, parse: P, call: F) -> Response
    where
        T: Serialize,
        P: FnOnce() -> Result<I, Reply>,
        F: FnOnce(&ActivationService, &ResolverContext, I) -> Result<(T, ReplyTags), ServiceError>,
    {
        let auth = match self.authorize(&exchange.ctx, exchange.action) {
            Ok(auth) => auth,
            Err(err) => return self.finish(exchange, None, Reply::from_auth(&err)),
        };
        let input = match parse() {
            Ok(input) => input,
            Err(reply) => return self.finish(exchange, Some(&auth), reply),
        };
        let context = resolver_context(&auth, &exchange.ctx);
        let reply = match run_blocking(|| call(&self.service, &context, input)) {
            Ok((body, tags)) => Reply::ok(&body, tags),
            Err(err) => Reply::from_service(&err),
        };
        self.finish(exchange, Some(&auth), reply)
    }
}

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// Resolve request body. The tenant is never accepted from the body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResolveBody {
    /// User to resolve.
    #[serde(default)]
    user_id: Option<String>,
    /// Optional persona.
    #[serde(default)]
    persona_id: Option<String>,
}

/// Policy transition request body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TransitionBody {
    /// Target status label.
    #[serde(default)]
    to: Option<String>,
}

/// Replay query parameters.
#[derive(Debug, Deserialize)]
struct ReplayQuery {
    /// Audit id to replay.
    #[serde(default)]
    audit_id: Option<String>,
}

/// Audit history query parameters.
#[derive(Debug, Deserialize)]
struct AuditQuery {
    /// User whose history is listed.
    #[serde(default)]
    user_id: Option<String>,
    /// Maximum records to return.
    #[serde(default)]
    limit: Option<String>,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness probe.
async fn handle_health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Resolves activation for the body's user.
async fn handle_resolve(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let exchange = Exchange::new(AuthAction::Resolve, peer, &headers, bytes.len());
    state.handle(
        &exchange,
        || parse_body::<ResolveBody>(state.max_body_bytes, &bytes),
        |service, context, body| {
            let decision =
                service.resolve(context, body.user_id.as_deref(), body.persona_id.as_deref())?;
            let tags =
                ReplyTags::decision(decision.audit_id.as_str(), decision.reason_code.as_str());
            Ok((decision, tags))
        },
    )
}

/// Replays a recorded decision.
async fn handle_replay(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<ReplayQuery>, QueryRejection>,
) -> Response {
    let exchange = Exchange::new(AuthAction::Replay, peer, &headers, 0);
    state.handle(
        &exchange,
        || parse_query(query),
        |service, context, query| {
            let replayed = service.replay(context, query.audit_id.as_deref())?;
            let tags = ReplyTags::decision(
                replayed.decision.audit_id.as_str(),
                replayed.decision.reason_code.as_str(),
            );
            Ok((replayed, tags))
        },
    )
}

/// Lists a user's recorded decisions.
async fn handle_audit(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Response {
    let exchange = Exchange::new(AuthAction::AuditHistory, peer, &headers, 0);
    state.handle(
        &exchange,
        || parse_query(query),
        |service, context, query| {
            let history = service.audit_history(
                context,
                query.user_id.as_deref(),
                query.limit.as_deref(),
            )?;
            Ok((history, ReplyTags::default()))
        },
    )
}

/// Applies a lifecycle transition to a persona's current policy.
async fn handle_transition(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(persona_id): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Response {
    let exchange = Exchange::new(AuthAction::PolicyTransition, peer, &headers, bytes.len());
    state.handle(
        &exchange,
        || parse_body::<TransitionBody>(state.max_body_bytes, &bytes),
        |service, context, body| {
            let outcome = service.transition_policy(context, &persona_id, body.to.as_deref())?;
            Ok((outcome, ReplyTags::default()))
        },
    )
}

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Transport facts for one request.
struct Exchange {
    /// Action being performed.
    action: AuthAction,
    /// Auth-relevant request context.
    ctx: RequestContext,
    /// Request body size.
    request_bytes: usize,
}

impl Exchange {
    /// Captures the transport facts of a request.
    fn new(action: AuthAction, peer: SocketAddr, headers: &HeaderMap, request_bytes: usize) -> Self {
        let auth_header =
            headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()).map(str::to_string);
        let mut ctx = RequestContext::http(Some(peer.ip()), auth_header);
        if let Some(request_id) = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= MAX_REQUEST_ID_BYTES)
        {
            ctx = ctx.with_request_id(request_id);
        }
        Self {
            action,
            ctx,
            request_bytes,
        }
    }
}

/// Decision fields copied into the access log.
#[derive(Debug, Default)]
struct ReplyTags {
    /// Audit id of the decision.
    audit_id: Option<String>,
    /// Reason code of the decision.
    reason_code: Option<&'static str>,
}

impl ReplyTags {
    /// Tags for a decision payload.
    fn decision(audit_id: &str, reason_code: &'static str) -> Self {
        Self {
            audit_id: Some(audit_id.to_string()),
            reason_code: Some(reason_code),
        }
    }
}

/// Rendered response plus log fields.
struct Reply {
    /// HTTP status.
    status: StatusCode,
    /// JSON body.
    body: Value,
    /// Audit id for the access log.
    audit_id: Option<String>,
    /// Reason code for the access log.
    reason_code: Option<&'static str>,
    /// Error code for the access log.
    error_code: Option<&'static str>,
}

impl Reply {
    /// Successful JSON reply.
    fn ok<T: Serialize>(body: &T, tags: ReplyTags) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self {
                status: StatusCode::OK,
                body,
                audit_id: tags.audit_id,
                reason_code: tags.reason_code,
                error_code: None,
            },
            Err(_) => {
                let mut reply = Self::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "serialization failed".to_string(),
                );
                reply.audit_id = tags.audit_id;
                reply
            }
        }
    }

    /// Error reply with a stable code.
    fn error(status: StatusCode, code: &'static str, message: String) -> Self {
        Self {
            status,
            body: json!({ "error": code, "message": message }),
            audit_id: None,
            reason_code: None,
            error_code: Some(code),
        }
    }

    /// Maps a service failure.
    fn from_service(err: &ServiceError) -> Self {
        let status =
            StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::error(status, err.code(), err.public_message())
    }

    /// Maps an auth failure.
    fn from_auth(err: &AuthError) -> Self {
        match err {
            AuthError::Unauthenticated(_) => {
                Self::error(StatusCode::UNAUTHORIZED, "UNAUTHENTICATED", err.to_string())
            }
            AuthError::Unauthorized(_) => {
                Self::error(StatusCode::FORBIDDEN, "UNAUTHORIZED", err.to_string())
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a JSON body with the configured size limit.
fn parse_body<T: serde::de::DeserializeOwned>(
    max_body_bytes: usize,
    bytes: &Bytes,
) -> Result<T, Reply> {
    if bytes.len() > max_body_bytes {
        return Err(Reply::error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "PAYLOAD_TOO_LARGE",
            "request body too large".to_string(),
        ));
    }
    serde_json::from_slice(bytes).map_err(|err| {
        Reply::error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", format!("invalid body: {err}"))
    })
}

/// Maps a query-string rejection onto the JSON error shape.
fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Reply> {
    query.map(|Query(query)| query).map_err(|err| {
        Reply::error(
            StatusCode::BAD_REQUEST,
            "INVALID_REQUEST",
            format!("invalid query: {}", err.body_text()),
        )
    })
}

/// Builds the resolver context from the authenticated caller.
fn resolver_context(auth: &AuthContext, ctx: &RequestContext) -> ResolverContext {
    let context = ResolverContext::new(auth.tenant_id.clone(), now_timestamp())
        .with_actor(auth.subject.clone());
    match &ctx.request_id {
        Some(request_id) => context.with_request_id(request_id.clone()),
        None => context,
    }
}

/// Current wall-clock time as a timestamp.
fn now_timestamp() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::UnixMillis(i64::try_from(millis).unwrap_or(i64::MAX))
}

/// Runs a blocking call, shifting off the executor when possible.
fn run_blocking<T>(call: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(call)
        }
        _ => call(),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}
