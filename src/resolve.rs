//! Destination path resolution.
//!
//! A caller can name the backend destination two ways: an explicit
//! `x-dest-path` header, or the wildcard route segments of `/proxy/{...}`.
//! Both collapse into one [`CanonicalDestination`] that is used verbatim for
//! policy evaluation *and* outbound URL construction, so the string the
//! policy engine sees is always the string that gets dispatched.

use crate::error::{GatewayError, GatewayResult};

/// The single, policy-and-dispatch-shared representation of where a request
/// is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDestination {
    /// Backend path with no leading slash.
    pub path: String,
    /// Query string, without the leading `?`, if any.
    pub query: Option<String>,
}

impl CanonicalDestination {
    /// The full target string (`path` or `path?query`) evaluated by the
    /// policy engine.
    pub fn target(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }

    /// Build the outbound URL against the backend base.
    pub fn url(&self, backend_base: &str) -> String {
        format!("{}/{}", backend_base.trim_end_matches('/'), self.target())
    }
}

/// Resolve a destination from the available input sources.
///
/// Precedence: a non-empty (after trimming) explicit header path wins
/// outright over the route-derived path. A query string embedded in the
/// chosen source takes precedence over the request's own query string;
/// otherwise the request query is preserved verbatim.
///
/// Leading slashes are stripped from the result so a caller cannot smuggle an
/// absolute or protocol-relative URL past the backend-base join.
///
/// # Errors
///
/// [`GatewayError::MissingDestination`] when nothing resolves to a non-empty
/// path.
pub fn resolve(
    header_path: Option<&str>,
    route_path: Option<&str>,
    raw_query: Option<&str>,
) -> GatewayResult<CanonicalDestination> {
    let source = match header_path.map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => explicit,
        None => route_path.map(str::trim).unwrap_or(""),
    };

    let (path_part, embedded_query) = match source.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (source, None),
    };

    let path = path_part.trim_start_matches('/').to_string();
    if path.is_empty() {
        return Err(GatewayError::MissingDestination);
    }

    let query = embedded_query
        .or(raw_query)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    Ok(CanonicalDestination { path, query })
}
