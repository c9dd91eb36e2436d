//! Route policy engine.
//!
//! One reconciled, configuration-driven decision function replaces the
//! divergent per-handler checks of the original system. Rule sets are ordered
//! data with fixed precedence:
//!
//! 1. **Sensitive entities**: never writable by callers, no matter what the
//!    allow-list says.
//! 2. **Write allow-list**: explicit prefixes permitted for write methods.
//! 3. **Read scope**: prefixes permitted for read methods.
//!
//! The engine is a pure function over the request fields and startup
//! configuration: no I/O, no clock, no shared mutable state.

use http::Method;

use crate::config::PolicyTables;
use crate::error::GatewayError;

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed to the backend.
    Allow,
    /// The request is refused, with a stable reason.
    Deny(DenyReason),
}

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Secret absent or not exactly equal to the configured value.
    InvalidSecret,
    /// No destination path after resolution.
    MissingDestination,
    /// Write against a sensitive entity.
    Protected,
    /// Write outside the allow-list.
    WriteNotAllowed,
    /// Read outside the read scope.
    ReadNotAllowed,
}

impl DenyReason {
    /// The fixed message reported to callers.
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidSecret => "invalid proxy secret",
            Self::MissingDestination => "missing destination path",
            Self::Protected => "destination is protected",
            Self::WriteNotAllowed => "write to destination not allowed",
            Self::ReadNotAllowed => "destination not allowed",
        }
    }
}

impl From<DenyReason> for GatewayError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::InvalidSecret => GatewayError::AuthDenied,
            DenyReason::MissingDestination => GatewayError::MissingDestination,
            other => GatewayError::PolicyDenied {
                reason: other.message(),
            },
        }
    }
}

/// Policy engine over the startup-loaded rule tables.
///
/// Sensitive entities are matched structurally, not by namespace prefix: a
/// write is protected when any path segment of the target equals a sensitive
/// entity, or when the query string names one (`users_meta?`), since the
/// backend accepts resource identification in either position. The check is
/// independent of the allow-list, so it holds for allow-list prefixes outside
/// the default namespaces too.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    shared_secret: String,
    sensitive_entities: Vec<String>,
    sensitive_query_forms: Vec<String>,
    write_allow: Vec<String>,
    read_scope: Vec<String>,
}

impl PolicyEngine {
    /// Build an engine from the shared secret and rule tables.
    pub fn new(shared_secret: impl Into<String>, tables: &PolicyTables) -> Self {
        let sensitive_query_forms = tables
            .sensitive_entities
            .iter()
            .map(|entity| format!("{entity}?"))
            .collect();

        Self {
            shared_secret: shared_secret.into(),
            sensitive_entities: tables.sensitive_entities.clone(),
            sensitive_query_forms,
            write_allow: tables.write_allow.clone(),
            read_scope: tables.read_scope.clone(),
        }
    }

    /// Evaluate a request.
    ///
    /// `target` is the canonical destination *including* its query string,
    /// the exact string the forwarder will dispatch, so the evaluated path
    /// and the dispatched path can never diverge.
    ///
    /// Check order is fixed: secret, then destination presence, then the
    /// method-class rules with sensitive-entity precedence.
    pub fn decide(&self, secret: Option<&str>, method: &Method, target: &str) -> Decision {
        // Exact equality only; a prefix or substring of the secret never
        // authenticates.
        match secret {
            Some(s) if s == self.shared_secret => {}
            _ => return Decision::Deny(DenyReason::InvalidSecret),
        }

        if target.is_empty() {
            return Decision::Deny(DenyReason::MissingDestination);
        }

        if is_read_method(method) {
            if self.read_scope.iter().any(|p| target.starts_with(p.as_str())) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::ReadNotAllowed)
            }
        } else {
            // Sensitive entities override the allow-list unconditionally.
            if self.matches_sensitive(target) {
                return Decision::Deny(DenyReason::Protected);
            }
            if self.write_allow.iter().any(|p| target.starts_with(p.as_str())) {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::WriteNotAllowed)
            }
        }
    }

    fn matches_sensitive(&self, target: &str) -> bool {
        let path = target.split('?').next().unwrap_or(target);
        path.split('/')
            .any(|segment| self.sensitive_entities.iter().any(|e| e == segment))
            || self
                .sensitive_query_forms
                .iter()
                .any(|q| target.contains(q.as_str()))
    }
}

/// GET and HEAD are reads; everything else is treated as a write and must
/// clear the write allow-list.
fn is_read_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}
