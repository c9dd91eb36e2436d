//! HTTP surface of the gateway.
//!
//! Three route groups share one [`AppState`]:
//!
//! - `/health`: liveness probe, no auth.
//! - `/proxy` and `/proxy/{*path}`: the forwarding endpoint, any method.
//! - `/admin/tenant-admins`: privileged provisioning.
//!
//! The proxy handler is a straight pipeline: extract secret, resolve the
//! destination, evaluate policy, rewrite headers, dispatch, translate. Policy
//! evaluation happens before any outbound work, so a denied request costs no
//! backend traffic.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, Method, Response, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::{any, get, post},
};
use bytes::Bytes;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::forward::{BackendForwarder, TranslatedBody, outbound_body, translate};
use crate::headers::{self, X_REQUEST_ID};
use crate::policy::{Decision, PolicyEngine};
use crate::provision::{self, CreateTenantAdminRequest};
use crate::resolve::{self, CanonicalDestination};

/// Header naming the backend destination explicitly.
pub const X_DEST_PATH: &str = "x-dest-path";

/// Shared, immutable per-process state.
#[derive(Clone)]
pub struct AppState {
    /// Startup configuration.
    pub config: Arc<GatewayConfig>,
    /// Policy engine built from the configuration.
    pub engine: Arc<PolicyEngine>,
    /// Outbound backend client (or a mock in tests).
    pub backend: Arc<dyn BackendForwarder>,
    /// Best-effort audit writer.
    pub audit: AuditSink,
}

impl AppState {
    /// Assemble state from its parts; the audit sink reuses the same backend
    /// client as the proxy path.
    pub fn new(config: Arc<GatewayConfig>, backend: Arc<dyn BackendForwarder>) -> Self {
        let engine = Arc::new(PolicyEngine::new(
            config.proxy_secret.clone(),
            &config.policy,
        ));
        let audit = AuditSink::new(config.clone(), backend.clone());
        Self {
            config,
            engine,
            backend,
            audit,
        }
    }
}

/// Build the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/proxy", any(proxy_root_handler))
        .route("/proxy/{*path}", any(proxy_path_handler))
        .route("/admin/tenant-admins", post(create_tenant_admin_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `/proxy` with the destination named only by header.
async fn proxy_root_handler(
    State(state): State<AppState>,
    method: Method,
    caller_headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response<Body>, GatewayError> {
    handle_proxy(state, method, caller_headers, None, raw_query, body).await
}

/// `/proxy/{*path}` with the destination in the route.
async fn proxy_path_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    method: Method,
    caller_headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    body: Bytes,
) -> Result<Response<Body>, GatewayError> {
    handle_proxy(state, method, caller_headers, Some(path), raw_query, body).await
}

/// The forwarding pipeline shared by both proxy routes.
async fn handle_proxy(
    state: AppState,
    method: Method,
    caller_headers: HeaderMap,
    route_path: Option<String>,
    raw_query: Option<String>,
    body: Bytes,
) -> Result<Response<Body>, GatewayError> {
    let secret = headers::extract_secret(&caller_headers, &state.config);
    let header_path = caller_headers
        .get(X_DEST_PATH)
        .and_then(|v| v.to_str().ok());

    // Resolution failure is deferred: the policy engine sees an empty target
    // and reports the invalid secret first when both problems are present.
    let destination: Option<CanonicalDestination> =
        resolve::resolve(header_path, route_path.as_deref(), raw_query.as_deref()).ok();
    let target = destination
        .as_ref()
        .map(CanonicalDestination::target)
        .unwrap_or_default();

    if let Decision::Deny(reason) = state.engine.decide(secret, &method, &target) {
        info!(method = %method, target = %target, reason = reason.message(), "Request denied");
        return Err(reason.into());
    }

    // Allow implies a non-empty target, so the destination resolved.
    let destination = destination.ok_or(GatewayError::MissingDestination)?;

    let mut outbound = headers::rewrite(&caller_headers, &state.config)?;
    ensure_request_id(&mut outbound);

    let url = destination.url(&state.config.backend_url);
    let payload = outbound_body(&method, &body);
    let backend = state
        .backend
        .dispatch(method.clone(), &url, outbound, payload)
        .await?;

    info!(
        method = %method,
        target = %target,
        status = %backend.status,
        "Request forwarded"
    );

    relay_response(backend.status, backend.body)
}

/// Attach a correlation id when the caller did not send one.
fn ensure_request_id(outbound: &mut HeaderMap) {
    if !outbound.contains_key(X_REQUEST_ID) {
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            outbound.insert(X_REQUEST_ID, value);
        }
    }
}

/// Re-emit the backend response with its status untouched; the body is
/// promoted to JSON only when it parses as JSON.
fn relay_response(status: StatusCode, body: Bytes) -> Result<Response<Body>, GatewayError> {
    let builder = Response::builder().status(status);
    let builder = match translate(body.clone()) {
        TranslatedBody::Json(_) => {
            builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        }
        TranslatedBody::Text(_) => builder,
    };
    builder
        .body(Body::from(body))
        .map_err(|_| GatewayError::Internal {
            detail: "failed to build response".to_string(),
        })
}

/// Privileged tenant-admin provisioning endpoint.
///
/// The body is taken as raw bytes and only deserialized after the secret
/// check, so an unauthenticated caller always sees 401 regardless of what it
/// sent.
async fn create_tenant_admin_handler(
    State(state): State<AppState>,
    caller_headers: HeaderMap,
    body: Bytes,
) -> GatewayResult<impl IntoResponse> {
    match headers::extract_secret(&caller_headers, &state.config) {
        Some(secret) if secret == state.config.proxy_secret => {}
        _ => return Err(GatewayError::AuthDenied),
    }

    let request: CreateTenantAdminRequest =
        serde_json::from_slice(&body).map_err(|_| GatewayError::BadRequest {
            detail: "invalid request body".to_string(),
        })?;

    let response =
        provision::create_tenant_admin(&state.config, &state.backend, &state.audit, request)
            .await?;
    Ok(Json(response))
}
