//! Best-effort audit sink.
//!
//! Privileged provisioning actions are recorded to the backend audit table.
//! The write is dispatched as a detached task after the primary outcome is
//! already decided: a failed or slow audit write is a `warn!` line, never a
//! changed response.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::forward::BackendForwarder;
use crate::headers;

/// One audit record, serialized as the backend audit table row.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Tenant the action applied to.
    pub tenant_id: String,
    /// Acting identity, if known.
    pub actor_id: Option<String>,
    /// Role the action was performed under.
    pub actor_role: String,
    /// Action name, e.g. `create_tenant_admin`.
    pub action: String,
    /// Kind of object affected.
    pub object_type: String,
    /// Identifier of the affected object.
    pub object_id: String,
    /// Free-form action details.
    pub details: Value,
    /// Record timestamp.
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build a record stamped with the current time.
    pub fn new(
        tenant_id: impl Into<String>,
        actor_id: Option<String>,
        action: impl Into<String>,
        object_type: impl Into<String>,
        object_id: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            actor_id,
            actor_role: "super_admin".to_string(),
            action: action.into(),
            object_type: object_type.into(),
            object_id: object_id.into(),
            details,
            created_at: Utc::now(),
        }
    }
}

/// Fire-and-forget audit writer.
#[derive(Clone)]
pub struct AuditSink {
    config: Arc<GatewayConfig>,
    backend: Arc<dyn BackendForwarder>,
}

impl AuditSink {
    /// Create a sink posting to the configured audit path with privileged
    /// credentials.
    pub fn new(config: Arc<GatewayConfig>, backend: Arc<dyn BackendForwarder>) -> Self {
        Self { config, backend }
    }

    /// Record an audit entry off the critical path.
    ///
    /// Spawns a detached task; the caller's response is never delayed or
    /// failed by the audit write.
    pub fn record(&self, record: AuditRecord) {
        let sink = self.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.write(&record).await {
                warn!(
                    action = %record.action,
                    object_id = %record.object_id,
                    error = %e,
                    "Audit write failed"
                );
            }
        });
    }

    /// Issue the audit POST. Exposed for tests that need to await the write.
    pub async fn write(&self, record: &AuditRecord) -> Result<(), String> {
        let url = format!(
            "{}/{}",
            self.config.backend_url,
            self.config.audit_path.trim_start_matches('/')
        );

        let mut content = HeaderMap::new();
        content.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let outbound =
            headers::rewrite(&content, &self.config).map_err(|e| e.to_string())?;

        let body = serde_json::to_vec(record).map_err(|e| e.to_string())?;

        let response = self
            .backend
            .dispatch(Method::POST, &url, outbound, Some(body.into()))
            .await
            .map_err(|e| e.to_string())?;

        if !response.status.is_success() {
            return Err(format!("audit endpoint returned {}", response.status));
        }

        debug!(action = %record.action, "Audit record written");
        Ok(())
    }
}
