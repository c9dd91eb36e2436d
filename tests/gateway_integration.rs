//! End-to-end tests: real router, real backend client, wiremock backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::matchers::{body_json_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tenantgate::config::{GatewayConfig, PolicyTables};
use tenantgate::forward::{BackendClient, BackendConfig, BackendForwarder};
use tenantgate::server::{router, AppState};

const SECRET: &str = "test-proxy-secret";

/// Router wired to a live wiremock backend through the real HTTP client.
fn gateway_for(backend: &MockServer) -> axum::Router {
    let config = Arc::new(GatewayConfig {
        backend_url: backend.uri(),
        service_key: "svc-key".to_string(),
        service_bearer: "svc-bearer".to_string(),
        proxy_secret: SECRET.to_string(),
        secret_headers: vec![
            "x-proxy-secret".to_string(),
            "x-api-key".to_string(),
            "x-internal-token".to_string(),
        ],
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        pool_max_idle_per_host: 4,
        audit_path: "rest/v1/audit_logs_v2".to_string(),
        policy: PolicyTables::default(),
    });

    let client = BackendClient::new(BackendConfig {
        timeout: config.request_timeout,
        connect_timeout: config.connect_timeout,
        ..BackendConfig::default()
    })
    .expect("client builds");
    let backend: Arc<dyn BackendForwarder> = Arc::new(client);

    router(AppState::new(config, backend))
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unauthenticated_request_never_reaches_the_backend() {
    let backend = MockServer::start().await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::get("/proxy/rest/v1/leads")
                .header("x-proxy-secret", "wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid proxy secret");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn allowed_write_is_forwarded_with_rewritten_credentials() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/leads"))
        .and(header("apikey", "svc-key"))
        .and(header("authorization", "Bearer svc-bearer"))
        .and(body_json_string(r#"{"name":"acme"}"#))
        .respond_with(
            ResponseTemplate::new(201).set_body_raw(r#"[{"id":7,"name":"acme"}]"#, "application/json"),
        )
        .mount(&backend)
        .await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/proxy/rest/v1/leads")
                .header("x-proxy-secret", SECRET)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"acme"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json[0]["id"], 7);

    // The caller's secret must not travel upstream.
    let requests = backend.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("x-proxy-secret").is_none());
}

#[tokio::test]
async fn header_and_route_destinations_behave_identically() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/leads"))
        .and(query_param("select", "id"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
        .expect(2)
        .mount(&backend)
        .await;

    let via_route = gateway_for(&backend)
        .oneshot(
            Request::get("/proxy/rest/v1/leads?select=id")
                .header("x-proxy-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let via_header = gateway_for(&backend)
        .oneshot(
            Request::get("/proxy?select=id")
                .header("x-proxy-secret", SECRET)
                .header("x-dest-path", "rest/v1/leads")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(via_route.status(), StatusCode::OK);
    assert_eq!(via_header.status(), StatusCode::OK);
}

#[tokio::test]
async fn write_to_protected_entity_is_blocked() {
    let backend = MockServer::start().await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/proxy/rest/v1/users_meta")
                .header("x-proxy-secret", SECRET)
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "destination is protected");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn write_outside_allowlist_is_blocked() {
    let backend = MockServer::start().await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/proxy/rest/v1/internal_settings")
                .header("x-proxy-secret", SECRET)
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "write to destination not allowed");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn read_outside_scope_is_blocked() {
    let backend = MockServer::start().await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::get("/proxy/storage/v1/buckets")
                .header("x-proxy-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "destination not allowed");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_destination_is_rejected_with_400() {
    let backend = MockServer::start().await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::get("/proxy")
                .header("x-proxy-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "missing destination path");
}

#[tokio::test]
async fn backend_errors_pass_through_verbatim() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/leads"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_raw(r#"{"message":"duplicate key value"}"#, "application/json"),
        )
        .mount(&backend)
        .await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/proxy/rest/v1/leads")
                .header("x-proxy-secret", SECRET)
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["message"], "duplicate key value");
}

#[tokio::test]
async fn non_json_backend_body_is_relayed_as_text() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/export"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("id,name\n1,acme\n", "text/csv"))
        .mount(&backend)
        .await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::get("/proxy/rest/v1/export")
                .header("x-proxy-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"id,name\n1,acme\n");
}

#[tokio::test]
async fn identical_reads_are_idempotent() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/leads"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"[{"id":1}]"#, "application/json"))
        .expect(2)
        .mount(&backend)
        .await;

    for _ in 0..2 {
        let response = gateway_for(&backend)
            .oneshot(
                Request::get("/proxy/rest/v1/leads")
                    .header("x-proxy-secret", SECRET)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["id"], 1);
    }
}

#[tokio::test]
async fn provisioning_creates_user_meta_and_audit_record() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .and(header("apikey", "svc-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"id":"user-42","email":"admin@example.com"}"#, "application/json"),
        )
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users_meta"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs_v2"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&backend)
        .await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/admin/tenant-admins")
                .header("x-internal-token", SECRET)
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"email":"admin@example.com","password":"initial-pw","tenant_id":"tenant-1"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["user_id"], "user-42");

    // The audit write is detached; give it a beat to land.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let audited = backend
        .received_requests()
        .await
        .unwrap()
        .iter()
        .any(|r| r.url.path() == "/rest/v1/audit_logs_v2");
    assert!(audited, "audit record should be written");
}

#[tokio::test]
async fn audit_failure_does_not_fail_provisioning() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/admin/users"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"id":"user-9"}"#, "application/json"),
        )
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users_meta"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_logs_v2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend)
        .await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/admin/tenant-admins")
                .header("x-internal-token", SECRET)
                .header("content-type", "application/json")
                .body(Body::from(
                    r#"{"email":"a@b.c","password":"pw","tenant_id":"t1"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn provisioning_with_missing_fields_is_400() {
    let backend = MockServer::start().await;

    let response = gateway_for(&backend)
        .oneshot(
            Request::post("/admin/tenant-admins")
                .header("x-internal-token", SECRET)
                .header("content-type", "application/json")
                .body(Body::from(r#"{"email":"a@b.c"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "missing fields");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_backend_maps_to_502() {
    // A router pointed at a closed port; no MockServer involved.
    let config = Arc::new(GatewayConfig {
        backend_url: "http://127.0.0.1:1".to_string(),
        service_key: "svc-key".to_string(),
        service_bearer: "svc-bearer".to_string(),
        proxy_secret: SECRET.to_string(),
        secret_headers: vec!["x-proxy-secret".to_string()],
        request_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_millis(500),
        pool_max_idle_per_host: 1,
        audit_path: "rest/v1/audit_logs_v2".to_string(),
        policy: PolicyTables::default(),
    });
    let client = BackendClient::new(BackendConfig {
        timeout: config.request_timeout,
        connect_timeout: config.connect_timeout,
        ..BackendConfig::default()
    })
    .unwrap();
    let backend: Arc<dyn BackendForwarder> = Arc::new(client);
    let app = router(AppState::new(config, backend));

    let response = app
        .oneshot(
            Request::get("/proxy/rest/v1/leads")
                .header("x-proxy-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::BAD_GATEWAY
            || response.status() == StatusCode::GATEWAY_TIMEOUT
    );
}
