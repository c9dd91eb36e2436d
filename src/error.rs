//! Error handling for tenantgate.
//!
//! Every failure the gateway can produce on its own behalf maps to a fixed
//! HTTP status and a small JSON body. Backend non-2xx responses are *not*
//! errors; they are passed through verbatim by the forwarder.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Convenience alias for gateway results.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// All error conditions the gateway reports to callers.
///
/// The taxonomy is deliberately small: the gateway either refuses a request
/// before any outbound call (auth/policy/bad request), fails to reach the
/// backend at all, or hits an unexpected internal failure. Anything the
/// backend answers, including 4xx/5xx, is relayed as-is and never becomes
/// a `GatewayError`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Caller secret absent or not equal to the configured shared secret.
    #[error("invalid proxy secret")]
    AuthDenied,

    /// No destination could be resolved from header or route segments.
    #[error("missing destination path")]
    MissingDestination,

    /// Malformed or incomplete caller input outside the proxy path (e.g. a
    /// provisioning request with missing fields).
    #[error("{detail}")]
    BadRequest {
        /// Description of what is missing or malformed.
        detail: String,
    },

    /// The path/method combination is not permitted by the route policy.
    #[error("{reason}")]
    PolicyDenied {
        /// Stable denial message, one of the fixed policy reasons.
        reason: &'static str,
    },

    /// The backend could not be reached (connection-level failure).
    #[error("backend unreachable")]
    UpstreamUnreachable,

    /// The backend did not respond within the configured timeout.
    #[error("backend request timed out")]
    UpstreamTimeout,

    /// Unexpected internal failure. `detail` must never contain the backend
    /// URL or any credential material.
    #[error("internal gateway error")]
    Internal {
        /// Sanitized description for the error payload.
        detail: String,
    },
}

impl GatewayError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthDenied => StatusCode::UNAUTHORIZED,
            Self::MissingDestination => StatusCode::BAD_REQUEST,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::PolicyDenied { .. } => StatusCode::FORBIDDEN,
            Self::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error type name for logging.
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::AuthDenied => "auth_denied",
            Self::MissingDestination => "missing_destination",
            Self::BadRequest { .. } => "bad_request",
            Self::PolicyDenied { .. } => "policy_denied",
            Self::UpstreamUnreachable => "upstream_unreachable",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Internal failures carry a sanitized detail field; everything
            // else is just the fixed error message.
            GatewayError::Internal { detail } => serde_json::json!({
                "error": self.to_string(),
                "detail": detail,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
