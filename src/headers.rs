//! Credential rewriting for outbound requests.
//!
//! The outbound header set is built from scratch rather than by filtering the
//! caller's headers: nothing is forwarded unless it is on the explicit
//! passthrough list, so caller-supplied credentials (the proxy secret, any
//! `authorization`/`apikey`/cookie header) can never leak to the backend, and
//! a caller-supplied header with a privileged name can never override the
//! injected credentials, since injection happens last.

use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};

/// Backend API key header.
pub const APIKEY: &str = "apikey";
/// Response-shaping header understood by the backend (e.g. `return=representation`).
pub const PREFER: &str = "prefer";
/// Request correlation identifier, forwarded for tracing.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Caller headers copied through to the backend. Everything else is dropped.
const PASSTHROUGH: &[&str] = &[PREFER, X_REQUEST_ID];

/// Build the outbound header map for a forwarded request.
///
/// Passes through `content-type`, `prefer` and `x-request-id` when the caller
/// supplied them, then unconditionally injects the privileged `apikey` and
/// bearer token from the gateway configuration.
///
/// # Errors
///
/// [`GatewayError::Internal`] if a configured credential is not a valid
/// header value. This indicates broken configuration, not caller input.
pub fn rewrite(caller: &HeaderMap, config: &GatewayConfig) -> GatewayResult<HeaderMap> {
    let mut outbound = HeaderMap::new();

    if let Some(ct) = caller.get(CONTENT_TYPE) {
        outbound.insert(CONTENT_TYPE, ct.clone());
    }
    for &name in PASSTHROUGH {
        let header = HeaderName::from_static(name);
        if let Some(value) = caller.get(&header) {
            outbound.insert(header, value.clone());
        }
    }

    // Privileged credentials go in last so nothing above can shadow them.
    outbound.insert(
        HeaderName::from_static(APIKEY),
        header_value(&config.service_key)?,
    );
    outbound.insert(
        AUTHORIZATION,
        header_value(&format!("Bearer {}", config.service_bearer))?,
    );

    Ok(outbound)
}

/// Extract the shared secret from the caller's headers, trying the configured
/// header names in priority order.
pub fn extract_secret<'a>(caller: &'a HeaderMap, config: &GatewayConfig) -> Option<&'a str> {
    config
        .secret_headers
        .iter()
        .filter_map(|name| HeaderName::try_from(name.as_str()).ok())
        .find_map(|name| caller.get(&name))
        .and_then(|v| v.to_str().ok())
}

fn header_value(value: &str) -> GatewayResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|_| GatewayError::Internal {
        detail: "configured credential is not a valid header value".to_string(),
    })
}
