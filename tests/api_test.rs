use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use incident_bridge::{
    api::{build_router, AppState},
    catalog::CatalogService,
    incidents::{GrafanaIrmClient, IncidentService},
    state::{BridgeStore, InMemoryStore},
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Router over an in-memory store; the gateway has no token, so incident
/// creation fails without touching the network
fn test_app() -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let gateway =
        GrafanaIrmClient::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();

    let catalog = Arc::new(CatalogService::new(store.clone()));
    let incidents = Arc::new(IncidentService::new(store.clone(), Arc::new(gateway)));
    let state = AppState::new(catalog, incidents).with_app_name("Test Bridge");

    (build_router(state), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = test_app();

    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["app"], "Test Bridge");
}

#[tokio::test]
async fn test_admin_application_lifecycle() {
    let (app, _) = test_app();

    let (status, created) = send(
        &app,
        "POST",
        "/api/admin/apps",
        Some(json!({"name": "Payments", "tags": ["team:pay", " Team:PAY ", ""]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["tags"], json!(["team:pay"]));
    let app_id = created["id"].as_u64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/admin/apps",
        Some(json!({"name": "Payments"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, cap) = send(
        &app,
        "POST",
        "/api/admin/capabilities",
        Some(json!({"application_id": app_id, "name": "Checkout", "tags": ["oncall"]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let cap_id = cap["id"].as_u64().unwrap();

    let (status, detail) = send(&app, "GET", &format!("/api/admin/apps/{}", app_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Payments");
    assert_eq!(detail["capabilities"][0]["name"], "Checkout");

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("/api/admin/capabilities/{}", cap_id),
        Some(json!({"name": "Refunds"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Refunds");
    assert_eq!(updated["tags"], json!(["oncall"]));

    let (status, _) = send(&app, "DELETE", &format!("/api/admin/apps/{}", app_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", &format!("/api/admin/capabilities/{}", cap_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_tree_is_sorted() {
    let (app, _) = test_app();

    for name in ["Search", "Billing"] {
        send(&app, "POST", "/api/admin/apps", Some(json!({"name": name}))).await;
    }

    let (status, tree) = send(&app, "GET", "/api/tree", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = tree
        .as_array()
        .unwrap()
        .iter()
        .map(|node| node["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Billing", "Search"]);
    assert_eq!(tree[0]["capabilities"], json!([]));
}

#[tokio::test]
async fn test_incident_request_validation() {
    let (app, _) = test_app();

    let (_, created) = send(&app, "POST", "/api/admin/apps", Some(json!({"name": "A"}))).await;
    let app_id = created["id"].as_u64().unwrap();

    let cases = vec![
        json!({"title": "", "severity": "P1", "application_ids": [app_id]}),
        json!({"title": "   ", "severity": "P1", "application_ids": [app_id]}),
        json!({"title": "x".repeat(501), "severity": "P1", "application_ids": [app_id]}),
        json!({"title": "No selection", "severity": "P1"}),
    ];

    for body in cases {
        let (status, response) = send(&app, "POST", "/api/incidents", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
    }

    let (status, _) = send(
        &app,
        "POST",
        "/api/incidents",
        Some(json!({"title": "Bad severity", "severity": "P9", "application_ids": [app_id]})),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_gateway_failure_is_reported_in_body() {
    let (app, store) = test_app();

    let (_, created) = send(&app, "POST", "/api/admin/apps", Some(json!({"name": "A"}))).await;
    let app_id = created["id"].as_u64().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        "/api/incidents",
        Some(json!({"title": "DB outage", "severity": "P1", "application_ids": [app_id]})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Grafana IRM API token is not configured");
    assert!(body.get("grafana_incident_id").is_none());
    assert_eq!(store.count_incident_logs().await.unwrap(), 0);

    let (status, log) = send(&app, "GET", "/api/incidents/log?page=0&page_size=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["total"], 0);
    assert_eq!(log["entries"], json!([]));
}

#[tokio::test]
async fn test_tags_endpoint() {
    let (app, _) = test_app();

    send(
        &app,
        "POST",
        "/api/admin/apps",
        Some(json!({"name": "A", "tags": ["zeta", "Alpha"]})),
    )
    .await;

    let (status, tags) = send(&app, "GET", "/api/admin/tags", None).await;

    assert_eq!(status, StatusCode::OK);
    let values: Vec<&str> = tags
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["value"].as_str().unwrap())
        .collect();
    assert_eq!(values, vec!["Alpha", "zeta"]);
}
