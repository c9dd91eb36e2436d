//! Startup configuration.
//!
//! Everything the gateway needs is loaded once from the environment at
//! process start and then shared immutably. A missing required value is a
//! startup failure: the gateway refuses to run rather than silently proxy
//! unauthenticated.
//!
//! # Environment Variables
//!
//! Required:
//! - `TENANTGATE_BACKEND_URL`: base URL of the backend data API
//! - `TENANTGATE_SERVICE_KEY`: privileged backend API key
//! - `TENANTGATE_PROXY_SECRET`: shared secret callers must present
//!
//! Optional:
//! - `TENANTGATE_SERVICE_BEARER` (default: service key): privileged bearer token
//! - `TENANTGATE_SECRET_HEADERS` (default: `x-proxy-secret,x-api-key,x-internal-token`)
//! - `TENANTGATE_REQUEST_TIMEOUT_SECS` (default: 30)
//! - `TENANTGATE_CONNECT_TIMEOUT_SECS` (default: 5)
//! - `TENANTGATE_POOL_MAX_IDLE_PER_HOST` (default: 32)
//! - `TENANTGATE_AUDIT_PATH` (default: `rest/v1/audit_logs_v2`)
//! - `TENANTGATE_SENSITIVE_ENTITIES`, `TENANTGATE_WRITE_ALLOW`,
//!   `TENANTGATE_READ_SCOPE`: comma-separated route policy overrides

use std::time::Duration;

use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    #[error("required environment variable {name} is not set")]
    MissingVar {
        /// Name of the missing variable.
        name: &'static str,
    },
}

/// The three route policy rule sets, in evaluation precedence order.
///
/// These are data, not code: a policy change is an environment edit, never a
/// new match arm. See [`crate::policy::PolicyEngine`] for evaluation rules.
#[derive(Debug, Clone)]
pub struct PolicyTables {
    /// Backend entities that never accept a client-originated write.
    pub sensitive_entities: Vec<String>,
    /// Path prefixes permitted for write methods.
    pub write_allow: Vec<String>,
    /// Path prefixes permitted for read methods (may be broader than writes).
    pub read_scope: Vec<String>,
}

impl Default for PolicyTables {
    fn default() -> Self {
        Self {
            sensitive_entities: to_strings(&[
                "users_meta",
                "tenants",
                "tenant_members",
                "audit_logs_v2",
                "payments",
            ]),
            write_allow: to_strings(&[
                "rest/v1/leads",
                "rest/v1/contacts",
                "rest/v1/deals",
                "rest/v1/activities",
                "rest/v1/notes",
            ]),
            read_scope: to_strings(&["rest/v1/", "auth/v1/"]),
        }
    }
}

impl PolicyTables {
    /// Load the rule tables, applying comma-separated env overrides on top of
    /// the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sensitive_entities: list_var("TENANTGATE_SENSITIVE_ENTITIES")
                .unwrap_or(defaults.sensitive_entities),
            write_allow: list_var("TENANTGATE_WRITE_ALLOW").unwrap_or(defaults.write_allow),
            read_scope: list_var("TENANTGATE_READ_SCOPE").unwrap_or(defaults.read_scope),
        }
    }
}

/// Process-wide gateway configuration.
///
/// Constructed once in `main`, wrapped in an `Arc`, and injected everywhere;
/// there are no module-level singletons.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Backend base URL, stored without a trailing slash.
    pub backend_url: String,
    /// Privileged backend API key (sent as `apikey`).
    pub service_key: String,
    /// Privileged bearer token (sent as `authorization: Bearer …`).
    pub service_bearer: String,
    /// Shared secret callers must present exactly.
    pub proxy_secret: String,
    /// Header names accepted as carriers of the shared secret, in priority
    /// order. The first present header wins.
    pub secret_headers: Vec<String>,
    /// Outbound request timeout (connect + response).
    pub request_timeout: Duration,
    /// Outbound connection timeout.
    pub connect_timeout: Duration,
    /// Maximum idle pooled connections per backend host.
    pub pool_max_idle_per_host: usize,
    /// Backend path the audit sink posts records to.
    pub audit_path: String,
    /// Route policy rule tables.
    pub policy: PolicyTables,
}

impl GatewayConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] if any of the required variables
    /// (`TENANTGATE_BACKEND_URL`, `TENANTGATE_SERVICE_KEY`,
    /// `TENANTGATE_PROXY_SECRET`) is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend_url = required_var("TENANTGATE_BACKEND_URL")?
            .trim_end_matches('/')
            .to_string();
        let service_key = required_var("TENANTGATE_SERVICE_KEY")?;
        let proxy_secret = required_var("TENANTGATE_PROXY_SECRET")?;

        let service_bearer = std::env::var("TENANTGATE_SERVICE_BEARER")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| service_key.clone());

        let secret_headers = list_var("TENANTGATE_SECRET_HEADERS").unwrap_or_else(|| {
            to_strings(&["x-proxy-secret", "x-api-key", "x-internal-token"])
        });

        Ok(Self {
            backend_url,
            service_key,
            service_bearer,
            proxy_secret,
            secret_headers,
            request_timeout: Duration::from_secs(u64_var("TENANTGATE_REQUEST_TIMEOUT_SECS", 30)),
            connect_timeout: Duration::from_secs(u64_var("TENANTGATE_CONNECT_TIMEOUT_SECS", 5)),
            pool_max_idle_per_host: u64_var("TENANTGATE_POOL_MAX_IDLE_PER_HOST", 32) as usize,
            audit_path: std::env::var("TENANTGATE_AUDIT_PATH")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "rest/v1/audit_logs_v2".to_string()),
            policy: PolicyTables::from_env(),
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingVar { name })
}

fn u64_var(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a comma-separated env var into a list, dropping empty entries.
/// Returns `None` when the variable is unset or yields nothing.
fn list_var(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() { None } else { Some(items) }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
