//! Outbound backend client.
//!
//! A single pooled `reqwest` client carries every forwarded request. One
//! attempt per request (the gateway never retries, so backend side effects
//! cannot be duplicated) and the backend's HTTP status is surfaced verbatim.
//! Connection-level failures are classified into the gateway error taxonomy;
//! the raw error text (which embeds the backend URL) never reaches callers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Request timeout (connection + response).
    pub timeout: Duration,
    /// Connection timeout (TCP + TLS handshake).
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

/// A fully buffered backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// Backend status code, propagated to the caller unchanged.
    pub status: StatusCode,
    /// Raw response body.
    pub body: Bytes,
}

/// Abstraction over the outbound dispatch (enables mocking in tests).
#[async_trait]
pub trait BackendForwarder: Send + Sync {
    /// Issue one request to the backend and buffer the response.
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> GatewayResult<BackendResponse>;
}

/// Pooled HTTP client for the backend data API.
///
/// `Clone`-cheap; the underlying reqwest client handles connection pooling
/// internally and is shared across tasks.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
}

impl BackendClient {
    /// Build a client from the given configuration.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Internal`] if the underlying client cannot be built.
    pub fn new(config: BackendConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| GatewayError::Internal {
                detail: format!("failed to build backend client: {e}"),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl BackendForwarder for BackendClient {
    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> GatewayResult<BackendResponse> {
        debug!(method = %method, "Dispatching backend request");

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        let response = request.send().await.map_err(classify_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, "Failed to read backend response body");
            GatewayError::UpstreamUnreachable
        })?;

        debug!(status = %status, bytes = body.len(), "Backend responded");

        Ok(BackendResponse { status, body })
    }
}

/// Classify a transport error without leaking the backend URL.
fn classify_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        warn!("Backend request timed out");
        GatewayError::UpstreamTimeout
    } else if error.is_connect() {
        warn!(error = %error, "Failed to connect to backend");
        GatewayError::UpstreamUnreachable
    } else {
        warn!(error = %error, "Backend request failed");
        GatewayError::Internal {
            detail: "backend request failed".to_string(),
        }
    }
}

/// Select the body for an outbound request.
///
/// GET, HEAD and DELETE never carry a body. For write methods the caller's
/// body is forwarded as-is, or an empty JSON object when the caller sent
/// nothing; the backend rejects bodyless writes otherwise.
pub fn outbound_body(method: &Method, caller_body: &Bytes) -> Option<Bytes> {
    match *method {
        Method::GET | Method::HEAD | Method::DELETE => None,
        _ if caller_body.is_empty() => Some(Bytes::from_static(b"{}")),
        _ => Some(caller_body.clone()),
    }
}

/// Translated response body: JSON when the backend bytes parse as JSON, raw
/// text otherwise. The status code is decided by the backend in both cases.
#[derive(Debug, PartialEq, Eq)]
pub enum TranslatedBody {
    /// Body re-emitted with an `application/json` content type.
    Json(Bytes),
    /// Body re-emitted as plain text with the original bytes.
    Text(Bytes),
}

/// Content-type-aware response translation.
///
/// The body is treated as text first and only promoted to JSON when it
/// parses; a parse failure never changes the status code.
pub fn translate(body: Bytes) -> TranslatedBody {
    if serde_json::from_slice::<serde_json::Value>(&body).is_ok() {
        TranslatedBody::Json(body)
    } else {
        TranslatedBody::Text(body)
    }
}
