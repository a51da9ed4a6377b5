// persona-activation-server/src/lib.rs
// ============================================================================
// Module: Persona Activation Server
// Description: HTTP surface for the persona activation resolver.
// Purpose: Authenticate callers, scope requests to their tenant, and serve the resolver.
// Dependencies: persona-activation-core, persona-activation-config, axum, tokio
// ============================================================================

//! ## Overview
//! The server wraps [`persona_activation_core::ActivationResolver`] in an
//! [`ActivationService`] and exposes it over HTTP. The tenant and actor of
//! every call come from [`auth`], never from request payloads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod access_log;
pub mod auth;
pub mod server;
pub mod service;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use access_log::AccessLogSink;
pub use access_log::AuthzEvent;
pub use access_log::FileAccessLog;
pub use access_log::NoopAccessLog;
pub use access_log::RequestEvent;
pub use access_log::StderrAccessLog;
pub use access_log::access_log_from_config;
pub use auth::AuthAction;
pub use auth::AuthContext;
pub use auth::AuthError;
pub use auth::DefaultRequestAuthz;
pub use auth::RequestAuthz;
pub use auth::RequestContext;
pub use server::ActivationServer;
pub use server::ServerError;
pub use service::ActivationService;
pub use service::ServiceError;
pub use service::StoreHandles;
