// persona-activation-server/src/access_log.rs
// ============================================================================
// Module: Access Logging
// Description: Structured JSON-lines events for HTTP requests and authz.
// Purpose: Emit redacted request logs without a logging framework dependency.
// Dependencies: persona-activation-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Access log events are separate from the resolver audit log: they describe
//! transport activity (route, status, caller) and never carry request bodies
//! or raw tokens. Sinks write one JSON object per line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use persona_activation_config::AccessLogConfig;
use serde::Serialize;

use crate::auth::AuthAction;
use crate::auth::AuthContext;
use crate::auth::AuthError;
use crate::auth::RequestContext;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Request outcome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    /// Request completed with a 2xx status.
    Ok,
    /// Request was rejected before the resolver ran, or was not found.
    Rejected,
    /// Request failed on infrastructure.
    Error,
}

/// HTTP request event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Route label.
    pub route: &'static str,
    /// HTTP status code.
    pub status: u16,
    /// Outcome classification.
    pub outcome: RequestOutcome,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Authenticated subject.
    pub subject: Option<String>,
    /// Tenant the request ran in.
    pub tenant_id: Option<String>,
    /// Audit id of the decision, when one was produced or replayed.
    pub audit_id: Option<String>,
    /// Decision reason code, when a decision was produced.
    pub reason_code: Option<&'static str>,
    /// Error code for non-2xx responses.
    pub error_code: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
}

/// Inputs required to construct a request event.
#[derive(Debug, Default)]
pub struct RequestEventParams {
    /// Request identifier when provided.
    pub request_id: Option<String>,
    /// Route label.
    pub route: &'static str,
    /// HTTP status code.
    pub status: u16,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Authenticated subject.
    pub subject: Option<String>,
    /// Tenant the request ran in.
    pub tenant_id: Option<String>,
    /// Audit id of the decision.
    pub audit_id: Option<String>,
    /// Decision reason code.
    pub reason_code: Option<&'static str>,
    /// Error code for non-2xx responses.
    pub error_code: Option<&'static str>,
    /// Request body size in bytes.
    pub request_bytes: usize,
}

impl RequestEvent {
    /// Creates a request event stamped with the current time.
    #[must_use]
    pub fn new(params: RequestEventParams) -> Self {
        let outcome = match params.status {
            200..=299 => RequestOutcome::Ok,
            500..=599 => RequestOutcome::Error,
            _ => RequestOutcome::Rejected,
        };
        Self {
            event: "http_request",
            timestamp_ms: now_millis(),
            request_id: params.request_id,
            route: params.route,
            status: params.status,
            outcome,
            peer_ip: params.peer_ip,
            subject: params.subject,
            tenant_id: params.tenant_id,
            audit_id: params.audit_id,
            reason_code: params.reason_code,
            error_code: params.error_code,
            request_bytes: params.request_bytes,
        }
    }
}

/// Authorization decision event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthzEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision outcome.
    pub decision: &'static str,
    /// Action label.
    pub action: &'static str,
    /// Peer IP address when available.
    pub peer_ip: Option<String>,
    /// Auth method label.
    pub auth_method: Option<&'static str>,
    /// Caller subject.
    pub subject: Option<String>,
    /// Tenant bound to the caller.
    pub tenant_id: Option<String>,
    /// Bearer token fingerprint (sha256).
    pub token_fingerprint: Option<String>,
    /// Failure reason for deny events.
    pub reason: Option<String>,
    /// Request identifier when provided.
    pub request_id: Option<String>,
}

impl AuthzEvent {
    /// Builds an allow event.
    #[must_use]
    pub fn allowed(ctx: &RequestContext, action: AuthAction, auth: &AuthContext) -> Self {
        Self {
            event: "authz",
            timestamp_ms: now_millis(),
            decision: "allow",
            action: action.label(),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: Some(auth.method_label()),
            subject: Some(auth.subject.clone()),
            tenant_id: Some(auth.tenant_id.to_string()),
            token_fingerprint: auth.token_fingerprint.clone(),
            reason: None,
            request_id: ctx.request_id.clone(),
        }
    }

    /// Builds a deny event.
    #[must_use]
    pub fn denied(ctx: &RequestContext, action: AuthAction, error: &AuthError) -> Self {
        Self {
            event: "authz",
            timestamp_ms: now_millis(),
            decision: "deny",
            action: action.label(),
            peer_ip: ctx.peer_ip.map(|ip| ip.to_string()),
            auth_method: None,
            subject: None,
            tenant_id: None,
            token_fingerprint: None,
            reason: Some(error.to_string()),
            request_id: ctx.request_id.clone(),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Destination for access log events.
pub trait AccessLogSink: Send + Sync {
    /// Records an HTTP request event.
    fn record_request(&self, event: &RequestEvent);

    /// Records an authorization decision.
    fn record_authz(&self, event: &AuthzEvent);
}

/// Sink that logs JSON lines to stderr.
pub struct StderrAccessLog;

impl AccessLogSink for StderrAccessLog {
    fn record_request(&self, event: &RequestEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }

    fn record_authz(&self, event: &AuthzEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileAccessLog {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAccessLog {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one serialized line.
    fn write_line(&self, payload: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AccessLogSink for FileAccessLog {
    fn record_request(&self, event: &RequestEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.write_line(&payload);
        }
    }

    fn record_authz(&self, event: &AuthzEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.write_line(&payload);
        }
    }
}

/// No-op sink.
pub struct NoopAccessLog;

impl AccessLogSink for NoopAccessLog {
    fn record_request(&self, _event: &RequestEvent) {}

    fn record_authz(&self, _event: &AuthzEvent) {}
}

/// Builds the sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the configured log file cannot be opened.
pub fn access_log_from_config(config: &AccessLogConfig) -> io::Result<Arc<dyn AccessLogSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAccessLog));
    }
    match &config.path {
        Some(path) => Ok(Arc::new(FileAccessLog::new(Path::new(path.trim()))?)),
        None => Ok(Arc::new(StderrAccessLog)),
    }
}

/// Current wall-clock time in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}
