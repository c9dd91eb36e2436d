//! Tenant-admin provisioning.
//!
//! A privileged flow behind the same shared secret as the proxy: create a
//! backend auth user, insert the matching identity row, then record an audit
//! entry. The audit write is best-effort; see [`crate::audit`].

use std::sync::Arc;

use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::audit::{AuditRecord, AuditSink};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::forward::BackendForwarder;
use crate::headers;

/// Request body for `POST /admin/tenant-admins`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTenantAdminRequest {
    /// Email for the new admin user.
    #[serde(default)]
    pub email: String,
    /// Initial password; the user is forced to change it.
    #[serde(default)]
    pub password: String,
    /// Optional display name.
    #[serde(default)]
    pub display_name: String,
    /// Tenant the admin belongs to.
    #[serde(default)]
    pub tenant_id: String,
    /// Identity of the provisioning actor, if known.
    #[serde(default)]
    pub created_by: Option<String>,
}

/// Successful provisioning response.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTenantAdminResponse {
    /// Always true on success.
    pub ok: bool,
    /// Backend identifier of the created user.
    pub user_id: String,
}

/// Create a tenant admin: auth user, identity row, audit record.
///
/// # Errors
///
/// - [`GatewayError::BadRequest`] when `email`, `password` or `tenant_id` is
///   missing.
/// - [`GatewayError::Internal`] when either backend write fails. Details are
///   logged; the caller sees a generic message.
pub async fn create_tenant_admin(
    config: &Arc<GatewayConfig>,
    backend: &Arc<dyn BackendForwarder>,
    audit: &AuditSink,
    request: CreateTenantAdminRequest,
) -> GatewayResult<CreateTenantAdminResponse> {
    if request.email.is_empty() || request.password.is_empty() || request.tenant_id.is_empty() {
        return Err(GatewayError::BadRequest {
            detail: "missing fields".to_string(),
        });
    }

    let outbound = privileged_json_headers(config)?;

    // Step 1: create the auth user.
    let auth_url = format!("{}/auth/v1/admin/users", config.backend_url);
    let auth_body = serde_json::json!({
        "email": request.email,
        "password": request.password,
        "email_confirm": true,
    });
    let response = backend
        .dispatch(
            Method::POST,
            &auth_url,
            outbound.clone(),
            Some(serde_json::to_vec(&auth_body).map_err(internal)?.into()),
        )
        .await?;

    if !response.status.is_success() {
        error!(status = %response.status, "Auth user creation failed");
        return Err(GatewayError::Internal {
            detail: "user creation failed".to_string(),
        });
    }

    let user: Value = serde_json::from_slice(&response.body).map_err(internal)?;
    let user_id = user
        .get("id")
        .or_else(|| user.pointer("/user/id"))
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Internal {
            detail: "user creation returned no id".to_string(),
        })?
        .to_string();

    // Step 2: insert the identity row.
    let meta_url = format!("{}/rest/v1/users_meta", config.backend_url);
    let meta_body = serde_json::json!({
        "id": user_id,
        "tenant_id": request.tenant_id,
        "role": "tenant_admin",
        "display_name": request.display_name,
        "must_change_password": true,
        "is_active": true,
        "created_at": chrono::Utc::now(),
    });
    let response = backend
        .dispatch(
            Method::POST,
            &meta_url,
            outbound,
            Some(serde_json::to_vec(&meta_body).map_err(internal)?.into()),
        )
        .await?;

    if !response.status.is_success() {
        error!(status = %response.status, user_id = %user_id, "Identity row insert failed");
        return Err(GatewayError::Internal {
            detail: "identity record creation failed".to_string(),
        });
    }

    info!(user_id = %user_id, tenant_id = %request.tenant_id, "Tenant admin provisioned");

    // Step 3: audit, off the critical path.
    audit.record(AuditRecord::new(
        request.tenant_id.clone(),
        request.created_by.clone(),
        "create_tenant_admin",
        "users_meta",
        user_id.clone(),
        serde_json::json!({
            "id": user_id,
            "email": request.email,
            "tenant_id": request.tenant_id,
        }),
    ));

    Ok(CreateTenantAdminResponse { ok: true, user_id })
}

fn privileged_json_headers(config: &GatewayConfig) -> GatewayResult<HeaderMap> {
    let mut content = HeaderMap::new();
    content.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers::rewrite(&content, config)
}

fn internal(e: serde_json::Error) -> GatewayError {
    GatewayError::Internal {
        detail: format!("serialization failure: {e}"),
    }
}
